// ── Observable printer state ──
//
// Single source of truth for the current PrinterState. Constructed once
// and handed to every consumer; only the session worker writes to it.
// Async readers use `watch()`; synchronous observers register callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::PrinterState;
use crate::stream::StateStream;

type Observer = Arc<dyn Fn(&PrinterState) + Send + Sync>;

// ── NotificationHook ─────────────────────────────────────────────────

/// Side effect run after every replace (e.g. refreshing an OS
/// notification). Any `Fn(&PrinterState) + Send + Sync` qualifies.
pub trait NotificationHook: Send + Sync + 'static {
    fn on_state(&self, state: &PrinterState);
}

impl<F> NotificationHook for F
where
    F: Fn(&PrinterState) + Send + Sync + 'static,
{
    fn on_state(&self, state: &PrinterState) {
        self(state);
    }
}

// ── StateStore ───────────────────────────────────────────────────────

/// Observable holder of the current [`PrinterState`].
///
/// Cheaply cloneable; clones share the same state. Observer callbacks run
/// on the writer's thread, in registration-independent order, and must
/// not write back into the store.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: watch::Sender<Arc<PrinterState>>,
    observers: DashMap<u64, Observer>,
    next_id: AtomicU64,
    /// Serializes publish-and-notify against subscribe so every observer
    /// sees each value exactly once.
    notify_lock: Mutex<()>,
    hook: Option<Box<dyn NotificationHook>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::build(PrinterState::default(), None)
    }

    /// Store seeded with a specific state (e.g. restored from disk).
    pub fn with_initial(state: PrinterState) -> Self {
        Self::build(state, None)
    }

    /// Store that invokes `hook` after every replace.
    pub fn with_hook(hook: impl NotificationHook) -> Self {
        Self::build(PrinterState::default(), Some(Box::new(hook)))
    }

    fn build(initial: PrinterState, hook: Option<Box<dyn NotificationHook>>) -> Self {
        let (state, _) = watch::channel(Arc::new(initial));
        Self {
            inner: Arc::new(StoreInner {
                state,
                observers: DashMap::new(),
                next_id: AtomicU64::new(0),
                notify_lock: Mutex::new(()),
                hook,
            }),
        }
    }

    /// Current snapshot.
    pub fn get(&self) -> Arc<PrinterState> {
        self.inner.state.borrow().clone()
    }

    /// Publish `state` and notify every observer and the hook.
    pub fn replace(&self, state: PrinterState) {
        let state = Arc::new(state);
        let _guard = self
            .inner
            .notify_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.inner.state.send_replace(Arc::clone(&state));

        let observers: Vec<Observer> = self
            .inner
            .observers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for observer in observers {
            observer(&state);
        }

        if let Some(hook) = &self.inner.hook {
            hook.on_state(&state);
        }
    }

    /// Derive the next state from the current one and publish it only if
    /// it differs. Returns whether anything was published.
    pub fn update(&self, f: impl FnOnce(&PrinterState) -> PrinterState) -> bool {
        let current = self.get();
        let next = f(&current);
        if next == *current {
            return false;
        }
        self.replace(next);
        true
    }

    /// Register `callback`. It is called immediately with the current
    /// value and then after every replace until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PrinterState) + Send + Sync + 'static,
    {
        let callback: Observer = Arc::new(callback);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let _guard = self
            .inner
            .notify_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        callback(&self.get());
        self.inner.observers.insert(id, callback);

        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Async latest-value subscription.
    pub fn watch(&self) -> StateStream {
        StateStream::new(self.inner.state.subscribe())
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Guard for a registered observer. Dropping it unregisters the callback.
#[must_use = "dropping a Subscription immediately unregisters its callback"]
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Subscription {
    /// Keep the callback registered for the life of the store.
    pub fn detach(mut self) {
        self.store = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.observers.remove(&self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::model::status;

    #[test]
    fn subscriber_receives_initial_value() {
        let store = StateStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |s| sink.lock().unwrap().push(s.status_text.clone()));

        assert_eq!(*seen.lock().unwrap(), vec![status::CONNECTING.to_string()]);
    }

    #[test]
    fn subscriber_sees_every_replace_once() {
        let store = StateStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |s| sink.lock().unwrap().push(s.status_text.clone()));

        store.replace(store.get().with_status(status::CONNECTED));
        store.replace(store.get().with_status("Running"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Connecting...", "Connected", "Running"]
        );
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let store = StateStore::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(store.observer_count(), 1);

        drop(sub);
        store.replace(store.get().with_status(status::CONNECTED));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.observer_count(), 0);
    }

    #[test]
    fn update_skips_identical_state() {
        let store = StateStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!store.update(|s| s.clone()));
        assert!(store.update(|s| s.with_status(status::ERROR)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn hook_runs_after_every_replace() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let store = StateStore::with_hook(move |_: &PrinterState| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.replace(store.get().with_status(status::CONNECTED));
        store.replace(store.get().with_status(status::DISCONNECTED));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clones_share_state() {
        let store = StateStore::new();
        let other = store.clone();
        store.replace(store.get().with_status(status::CONNECTED));
        assert_eq!(other.get().status_text, status::CONNECTED);
    }

    #[tokio::test]
    async fn watch_observes_latest_value() {
        let store = StateStore::new();
        let mut stream = store.watch();
        assert_eq!(stream.current().status_text, status::CONNECTING);

        store.replace(store.get().with_status(status::CONNECTED));
        let next = stream.changed().await.unwrap();
        assert_eq!(next.status_text, status::CONNECTED);
    }
}
