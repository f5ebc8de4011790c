//! # Transport Builder
//!
//! Turns a [`Config`] into a ready [`Connection`].
//!
//! ## How it works
//!
//! 1. [`dial_options`] selects the transport credentials: plaintext when TLS is disabled,
//!    otherwise a rustls client configuration assembled from the configured CA file, client
//!    identity and server-name override (see [`TlsCredentials`]).
//! 2. Every registered [`PreDialer`] runs in registration order and may amend the options
//!    (typically by appending metadata such as an `authorization` header) or fail the dial.
//! 3. [`dial`] opens an HTTP/2 channel to the server address and wraps it with a
//!    [`MetadataInjector`] carrying the accumulated headers.
//!
//! Any failure aborts before a connection attempt is made; nothing is retried here.
pub mod metadata;
pub mod tls;

use crate::{BoxError, config::Config, context::Context};
use http::Uri;
use hyper_util::rt::TokioIo;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tonic::{
    codegen::InterceptedService,
    transport::{Channel, Endpoint},
};
use tracing::debug;

pub use metadata::{MetadataError, MetadataInjector};
pub use tls::{FileRole, TlsCredentials};

/// An open channel to the remote service, with the dial-time metadata attached to every call.
pub type Connection = InterceptedService<Channel, MetadataInjector>;

#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("Failed to read {role} file '{}': '{source}'", .path.display())]
    ReadFile {
        role: FileRole,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {role} file '{}': {reason}", .path.display())]
    InvalidPem {
        role: FileRole,
        path: PathBuf,
        reason: String,
    },
    #[error("A client certificate file was given without a client key file")]
    MissingKeyFile,
    #[error("Failed to set up TLS: '{0}'")]
    Tls(#[from] rustls::Error),
    #[error("Cannot derive a TLS server name from '{addr}', set a server name override")]
    ServerName { addr: String },
    #[error("Invalid TLS server name '{name}': '{source}'")]
    InvalidServerName {
        name: String,
        #[source]
        source: rustls::pki_types::InvalidDnsNameError,
    },
    #[error("Invalid server address '{addr}': '{source}'")]
    InvalidAddress {
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("Failed to connect to '{addr}': '{source}'")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Pre-dial hook failed: '{0}'")]
    PreDialer(#[source] BoxError),
    #[error("Connection supplier failed: '{0}'")]
    Supplier(#[source] BoxError),
}

#[derive(Debug, Clone)]
pub enum TransportCredentials {
    /// Plaintext HTTP/2.
    Insecure,
    Tls(TlsCredentials),
}

/// Everything needed to open a connection, as seen and amended by pre-dial hooks.
#[derive(Debug, Clone)]
pub struct DialOptions {
    pub credentials: TransportCredentials,
    /// Bound on connection establishment, taken from the context deadline.
    pub connect_timeout: Option<Duration>,
    pub user_agent: Option<String>,
    /// Headers sent with every call on the connection.
    pub metadata: Vec<(String, String)>,
}

impl DialOptions {
    pub fn new(credentials: TransportCredentials) -> Self {
        Self {
            credentials,
            connect_timeout: None,
            user_agent: None,
            metadata: Vec::new(),
        }
    }

    pub fn append_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.push((key.into(), value.into()));
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.credentials, TransportCredentials::Tls(_))
    }
}

/// A hook run after credentials are selected and before the connection is opened.
#[async_trait::async_trait]
pub trait PreDialer: Send + Sync {
    async fn pre_dial(&self, ctx: &Context, options: &mut DialOptions) -> Result<(), BoxError>;
}

#[async_trait::async_trait]
impl<F> PreDialer for F
where
    F: Fn(&Context, &mut DialOptions) -> Result<(), BoxError> + Send + Sync,
{
    async fn pre_dial(&self, ctx: &Context, options: &mut DialOptions) -> Result<(), BoxError> {
        self(ctx, options)
    }
}

/// Builds the dial options for `config` and runs its pre-dial hooks.
pub async fn dial_options(config: &Config, ctx: &Context) -> Result<DialOptions, DialError> {
    let credentials = if config.tls().enabled {
        TransportCredentials::Tls(TlsCredentials::new(config.tls(), config.server_addr())?)
    } else {
        TransportCredentials::Insecure
    };

    let mut options = DialOptions::new(credentials);
    options.connect_timeout = ctx.remaining();

    for dialer in config.pre_dialers() {
        dialer
            .pre_dial(ctx, &mut options)
            .await
            .map_err(DialError::PreDialer)?;
    }

    debug!(
        tls = options.is_tls(),
        connect_timeout = ?options.connect_timeout,
        metadata = options.metadata.len(),
        "dial options ready"
    );
    Ok(options)
}

/// Opens a connection to `addr` (`host:port`).
pub async fn dial(addr: &str, options: DialOptions) -> Result<Connection, DialError> {
    let injector = MetadataInjector::new(&options.metadata)?;
    let invalid_address = |source| DialError::InvalidAddress {
        addr: addr.to_string(),
        source,
    };

    let mut endpoint = Endpoint::from_shared(format!("http://{addr}")).map_err(invalid_address)?;
    if let Some(timeout) = options.connect_timeout {
        endpoint = endpoint.connect_timeout(timeout);
    }
    if let Some(user_agent) = options.user_agent {
        endpoint = endpoint.user_agent(user_agent).map_err(invalid_address)?;
    }

    let channel = match options.credentials {
        TransportCredentials::Insecure => endpoint.connect().await,
        TransportCredentials::Tls(credentials) => {
            let connector = TlsConnector::from(credentials.config);
            let server_name = credentials.server_name;

            endpoint
                .connect_with_connector(tower::service_fn(move |uri: Uri| {
                    let connector = connector.clone();
                    let server_name = server_name.clone();
                    async move {
                        let host = uri.host().ok_or("server address has no host")?;
                        let host = host.trim_start_matches('[').trim_end_matches(']');
                        let port = uri.port_u16().unwrap_or(443);

                        let tcp = TcpStream::connect((host, port)).await?;
                        tcp.set_nodelay(true)?;
                        let stream = connector.connect(server_name, tcp).await?;
                        Ok::<_, BoxError>(TokioIo::new(stream))
                    }
                }))
                .await
        }
    }
    .map_err(|source| DialError::ConnectionFailed {
        addr: addr.to_string(),
        source,
    })?;

    debug!(addr, headers = injector.len(), "connection established");
    Ok(InterceptedService::new(channel, injector))
}

/// Obtains the connection for one round trip: the injected supplier's when configured,
/// otherwise a fresh dial.
pub async fn connect(config: &Config, ctx: &Context) -> Result<Connection, DialError> {
    if let Some(supplier) = config.connection_supplier() {
        debug!("using injected connection supplier");
        let channel = supplier().map_err(DialError::Supplier)?;
        return Ok(InterceptedService::new(channel, MetadataInjector::default()));
    }

    let options = dial_options(config, ctx).await?;
    dial(config.server_addr(), options).await
}
