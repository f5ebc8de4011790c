//! TLS credentials built from [`TlsOptions`] with rustls.
use super::DialError;
use crate::config::TlsOptions;
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime, pem::PemObject},
};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The part a file plays in the TLS setup, reported alongside read and parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    CaCertificate,
    ClientCertificate,
    ClientKey,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileRole::CaCertificate => "CA certificate",
            FileRole::ClientCertificate => "client certificate",
            FileRole::ClientKey => "client key",
        })
    }
}

/// A ready rustls client configuration and the name the server must present.
#[derive(Clone)]
pub struct TlsCredentials {
    pub config: Arc<ClientConfig>,
    pub server_name: ServerName<'static>,
}

impl fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCredentials")
            .field("server_name", &self.server_name)
            .field("alpn_protocols", &self.config.alpn_protocols)
            .field("client_auth", &self.config.client_auth_cert_resolver.has_certs())
            .finish()
    }
}

impl TlsCredentials {
    pub fn new(options: &TlsOptions, server_addr: &str) -> Result<Self, DialError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let roots = match &options.ca_cert_file {
            Some(path) => load_roots(path)?,
            None => RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
        };

        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()?;

        let builder = if options.insecure_skip_verify {
            tracing::warn!("TLS server certificate verification is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
        } else {
            builder.with_root_certificates(roots)
        };

        let mut config = match (&options.cert_file, &options.key_file) {
            (Some(cert), Some(key)) => {
                let chain = load_certs(cert, FileRole::ClientCertificate)?;
                let key = load_key(key)?;
                builder.with_client_auth_cert(chain, key)?
            }
            (Some(_), None) => return Err(DialError::MissingKeyFile),
            _ => builder.with_no_client_auth(),
        };
        config.alpn_protocols = vec![b"h2".to_vec()];

        let name = match &options.server_name {
            Some(name) => name.clone(),
            None => split_host(server_addr)
                .ok_or_else(|| DialError::ServerName {
                    addr: server_addr.to_string(),
                })?
                .to_string(),
        };
        let server_name =
            ServerName::try_from(name.clone()).map_err(|source| DialError::InvalidServerName {
                name,
                source,
            })?;

        Ok(Self {
            config: Arc::new(config),
            server_name,
        })
    }
}

/// The host portion of `host:port`, with IPv6 brackets removed.
pub(crate) fn split_host(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, port) = rest.split_once("]:")?;
        return (!port.contains(':')).then_some(host);
    }

    let (host, _port) = addr.rsplit_once(':')?;
    (!host.contains(':')).then_some(host)
}

fn read(path: &Path, role: FileRole) -> Result<Vec<u8>, DialError> {
    std::fs::read(path).map_err(|source| DialError::ReadFile {
        role,
        path: path.to_path_buf(),
        source,
    })
}

fn invalid_pem(path: &Path, role: FileRole, reason: impl ToString) -> DialError {
    DialError::InvalidPem {
        role,
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn load_certs(path: &Path, role: FileRole) -> Result<Vec<CertificateDer<'static>>, DialError> {
    let pem = read(path, role)?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid_pem(path, role, e))?;

    if certs.is_empty() {
        return Err(invalid_pem(path, role, "no certificates found"));
    }
    Ok(certs)
}

fn load_roots(path: &Path) -> Result<RootCertStore, DialError> {
    let certs = load_certs(path, FileRole::CaCertificate)?;
    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    tracing::debug!(added, ignored, path = %path.display(), "loaded CA certificates");

    if added == 0 {
        return Err(invalid_pem(
            path,
            FileRole::CaCertificate,
            "no usable trust anchors",
        ));
    }
    Ok(roots)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, DialError> {
    let pem = read(path, FileRole::ClientKey)?;
    PrivateKeyDer::from_pem_slice(&pem).map_err(|e| invalid_pem(path, FileRole::ClientKey, e))
}

/// Accepts any server certificate while still checking handshake signatures.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
