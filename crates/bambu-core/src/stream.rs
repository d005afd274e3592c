// ── Reactive state stream ──
//
// Latest-value subscription to the StateStore for async consumers.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::PrinterState;

/// A subscription to the printer state.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed()`](Self::changed) or by converting to a `Stream`.
/// Intermediate values may be skipped if the consumer falls behind; the
/// latest value is always observed.
pub struct StateStream {
    current: Arc<PrinterState>,
    receiver: watch::Receiver<Arc<PrinterState>>,
}

impl StateStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<PrinterState>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &Arc<PrinterState> {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<PrinterState> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<PrinterState>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Wait until the state satisfies `predicate`, checking the current
    /// value first.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&PrinterState) -> bool,
    ) -> Option<Arc<PrinterState>> {
        let snap = self
            .receiver
            .wait_for(|state| predicate(&**state))
            .await
            .ok()?
            .clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The first item is the value current at conversion time.
    pub fn into_stream(self) -> StateWatchStream {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct StateWatchStream {
    inner: WatchStream<Arc<PrinterState>>,
}

impl Stream for StateWatchStream {
    type Item = Arc<PrinterState>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
