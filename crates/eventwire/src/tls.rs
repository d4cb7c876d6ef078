//! TLS settings for `wss://` endpoints.
//!
//! Without a [`TlsConfig`] the WebSocket transport trusts the platform's
//! native roots. With one, the trust store is the bundled web PKI roots plus
//! any private CAs added here.
//!
//! ```ignore
//! use eventwire::tls::TlsConfig;
//! use eventwire::transport::TransportOptions;
//!
//! let tls = TlsConfig::new().add_root_pem_file("/etc/eventwire/ca.crt")?;
//! let options = TransportOptions::new().tls_config(tls);
//! ```

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::ring;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::CertificateDer;

use crate::error::{EventwireError, Result};

/// Trust and protocol settings for the event endpoint.
#[derive(Clone, Debug)]
pub struct TlsConfig {
    roots: Vec<CertificateDer<'static>>,
    web_roots: bool,
    tls13_only: bool,
    accept_invalid_certs: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            web_roots: true,
            tls13_only: false,
            accept_invalid_certs: false,
        }
    }
}

impl TlsConfig {
    /// Trust the web PKI roots, TLS 1.2 and newer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust every certificate in a PEM bundle.
    pub fn add_root_pem(mut self, pem: impl AsRef<[u8]>) -> Result<Self> {
        let mut reader = pem.as_ref();
        let certs = rustls_pemfile::certs(&mut reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EventwireError::Tls(format!("invalid PEM: {e}")))?;
        if certs.is_empty() {
            return Err(EventwireError::Tls("no certificate in PEM data".into()));
        }
        self.roots.extend(certs);
        Ok(self)
    }

    /// Trust every certificate in a PEM file.
    pub fn add_root_pem_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path)
            .map_err(|e| EventwireError::Tls(format!("cannot read {}: {e}", path.display())))?;
        self.add_root_pem(pem)
    }

    /// Trust one DER-encoded certificate.
    pub fn add_root_der(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.roots.push(CertificateDer::from(der.into()));
        self
    }

    /// Trust only the certificates added to this config.
    pub fn without_web_roots(mut self) -> Self {
        self.web_roots = false;
        self
    }

    /// Refuse TLS 1.2.
    pub fn tls13_only(mut self) -> Self {
        self.tls13_only = true;
        self
    }

    /// Skip certificate verification entirely. Local testing only.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.accept_invalid_certs = true;
        self
    }

    /// Number of certificates added to this config.
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Build the rustls configuration handed to the WebSocket connector.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>> {
        let versions: &[&rustls::SupportedProtocolVersion] = if self.tls13_only {
            &[&rustls::version::TLS13]
        } else {
            &[&rustls::version::TLS13, &rustls::version::TLS12]
        };
        let builder = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_protocol_versions(versions)
            .map_err(|e| EventwireError::Tls(e.to_string()))?;

        let config = if self.accept_invalid_certs {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(danger::NoVerification))
                .with_no_client_auth()
        } else {
            builder
                .with_root_certificates(self.root_store()?)
                .with_no_client_auth()
        };
        Ok(Arc::new(config))
    }

    fn root_store(&self) -> Result<RootCertStore> {
        let mut store = RootCertStore::empty();
        if self.web_roots {
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        for cert in &self.roots {
            store
                .add(cert.clone())
                .map_err(|e| EventwireError::Tls(format!("unusable root certificate: {e}")))?;
        }
        if store.is_empty() {
            return Err(EventwireError::Tls(
                "empty trust store: add a root certificate or keep the web roots".into(),
            ));
        }
        Ok(store)
    }
}

mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::crypto::ring;
    use rustls::{DigitallySignedStruct, Error, SignatureScheme};
    use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

    #[derive(Debug)]
    pub(super) struct NoVerification;

    impl ServerCertVerifier for NoVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Parse-only fixture; never used for a handshake.
    const CA_PEM: &str = r#"-----BEGIN CERTIFICATE-----
MIIBkTCB+wIJAKHBfpegE3jEMA0GCSqGSIb3DQEBCwUAMBExDzANBgNVBAMMBnRl
c3RjYTAeFw0yMzAxMDEwMDAwMDBaFw0yNDAxMDEwMDAwMDBaMBExDzANBgNVBAMM
BnRlc3RjYTBcMA0GCSqGSIb3DQEBAQUAA0sAMEgCQQC7o96HtiK7onnPevKSE2LL
oSXwnmfYwZPV2bvfGS18lK8F+DL+42IjT3ucMXnLBhzNCLNKE8yCVK6LPlsvpNlX
AgMBAAGjUzBRMB0GA1UdDgQWBBQgHGHqPcVi1N4CG7IxDJaFMvP6XTAfBgNVHSME
GDAWgBQgHGHqPcVi1N4CG7IxDJaFMvP6XTAPBgNVHRMBAf8EBTADAQH/MA0GCSqG
SIb3DQEBCwUAA0EAGLJHfg9dS/T39L6VQLJeZcpH7mY8vKaM9dM/Zn3HMhfc0Yjv
3hxMPmPGjjpQ9JKaLI0Rq7n5oEUP+xluoAAfrQ==
-----END CERTIFICATE-----"#;

    #[test]
    fn test_add_root_pem() {
        let tls = TlsConfig::new().add_root_pem(CA_PEM).unwrap();
        assert_eq!(tls.root_count(), 1);
        assert!(TlsConfig::new().add_root_pem("").is_err());
    }

    #[test]
    fn test_add_root_pem_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.crt");
        std::fs::write(&path, CA_PEM).unwrap();

        let tls = TlsConfig::new().add_root_pem_file(&path).unwrap();
        assert_eq!(tls.root_count(), 1);

        let missing = TlsConfig::new().add_root_pem_file(dir.path().join("missing.crt"));
        assert!(matches!(missing, Err(EventwireError::Tls(_))));
    }

    #[test]
    fn test_client_config_with_web_roots() {
        assert!(TlsConfig::new().client_config().is_ok());
        assert!(TlsConfig::new().tls13_only().client_config().is_ok());
    }

    #[test]
    fn test_empty_trust_store_is_rejected() {
        let result = TlsConfig::new().without_web_roots().client_config();
        assert!(matches!(result, Err(EventwireError::Tls(_))));
    }

    #[test]
    fn test_accept_invalid_certs_needs_no_roots() {
        let tls = TlsConfig::new()
            .without_web_roots()
            .danger_accept_invalid_certs();
        assert!(tls.client_config().is_ok());
    }
}
