// Client TLS configuration for the printer's local broker.
//
// Printers present a self-signed certificate whose subject is the
// serial number, so hostname verification against an IP never passes.
// The default mode therefore trusts any certificate; a pinned CA file
// can be supplied instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Accept any server certificate (`insecure_trust_all_certificates`).
    #[default]
    DangerAcceptInvalid,
    /// Verify against the CA certificates in the given PEM file.
    CustomCa(PathBuf),
}

impl TlsMode {
    /// Build a rustls client configuration for this mode.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(format!("unsupported protocol versions: {e}")))?;

        let config = match self {
            Self::DangerAcceptInvalid => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
                .with_no_client_auth(),
            Self::CustomCa(path) => builder
                .with_root_certificates(load_roots(path)?)
                .with_no_client_auth(),
        };

        Ok(Arc::new(config))
    }
}

fn load_roots(path: &Path) -> Result<RootCertStore, Error> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| Error::Tls(format!("failed to read CA cert {}: {e}", path.display())))?;

    let mut roots = RootCertStore::empty();
    for cert in certs {
        let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
        roots
            .add(cert)
            .map_err(|e| Error::Tls(format!("rejected CA cert: {e}")))?;
    }

    if roots.is_empty() {
        return Err(Error::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(roots)
}

// ── Trust-all verifier ───────────────────────────────────────────────

/// Skips chain and hostname validation but still checks handshake
/// signatures, so the peer must hold the key for the cert it presents.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_trusts_all() {
        assert_eq!(TlsMode::default(), TlsMode::DangerAcceptInvalid);
        assert!(TlsMode::default().client_config().is_ok());
    }

    #[test]
    fn missing_ca_file_is_tls_error() {
        let mode = TlsMode::CustomCa(PathBuf::from("/nonexistent/printer-ca.pem"));
        let err = mode.client_config().unwrap_err();
        assert!(matches!(err, Error::Tls(_)), "got {err:?}");
    }

    #[test]
    fn empty_ca_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "").unwrap();

        let err = TlsMode::CustomCa(path).client_config().unwrap_err();
        assert!(err.to_string().contains("no certificates"), "got {err}");
    }
}
