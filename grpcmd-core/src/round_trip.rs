//! # Round-Trip Executor
//!
//! Runs exactly one request/response cycle for a generated command:
//!
//! 1. Resolve the request [`Decoder`]: the injected pre-decoder when no request source is
//!    configured, otherwise by format from the request file or stdin.
//! 2. Resolve the response [`Encoder`] (stdout).
//! 3. Obtain a [`Connection`], from the injected supplier or by dialing.
//! 4. Hand all three to the caller's closure, which decodes the request, invokes the
//!    remote method and encodes the response.
//!
//! The connection is moved into the closure and is therefore released exactly once,
//! whether the call succeeds, fails, or is cut short by the context deadline. Failures in
//! steps 1 to 3 happen before any connection exists. The first error wins; nothing is
//! retried.
use crate::{
    BoxError,
    codec::{CodecError, Decoder, Encoder, Input},
    config::{Config, RequestSource},
    context::Context,
    grpc::client::GrpcRequestError,
    transport::{self, Connection, DialError},
};
use std::fs::File;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Unknown request format '{0}'")]
    UnknownRequestFormat(String),
    #[error("Unknown response format '{0}'")]
    UnknownResponseFormat(String),
    #[error("Failed to open request file '{}': '{source}'", .path.display())]
    OpenRequestFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures reported by the round-trip closure.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Server returned '{:?}': '{}'", .0.code(), .0.message())]
    Status(#[from] tonic::Status),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Request(#[from] GrpcRequestError),
    #[error("{0}")]
    Other(BoxError),
}

impl CallError {
    pub fn other(err: impl Into<BoxError>) -> Self {
        CallError::Other(err.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoundTripError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Dial(#[from] DialError),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

/// Executes one round trip of `call` under `ctx`.
pub async fn round_trip<F, Fut>(ctx: &Context, config: &Config, call: F) -> Result<(), RoundTripError>
where
    F: FnOnce(Connection, Decoder, Encoder) -> Fut,
    Fut: Future<Output = Result<(), CallError>>,
{
    let started = Instant::now();

    let decoder = resolve_decoder(ctx, config)?;
    let encoder = resolve_encoder(config)?;
    execute(ctx, decoder, encoder, transport::connect(config, ctx), call).await?;

    info!(
        server = config.server_addr(),
        elapsed = ?started.elapsed(),
        "round trip completed"
    );
    Ok(())
}

async fn execute<C, A, F, Fut>(
    ctx: &Context,
    decoder: Decoder,
    encoder: Encoder,
    acquire: A,
    call: F,
) -> Result<(), RoundTripError>
where
    A: Future<Output = Result<C, DialError>>,
    F: FnOnce(C, Decoder, Encoder) -> Fut,
    Fut: Future<Output = Result<(), CallError>>,
{
    let connection = bounded(ctx, acquire).await?;
    debug!("connection acquired");

    let result = bounded(ctx, call(connection, decoder, encoder)).await;
    debug!(ok = result.is_ok(), "connection released");
    result
}

async fn bounded<T, E>(
    ctx: &Context,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, RoundTripError>
where
    RoundTripError: From<E>,
{
    let result = match ctx.deadline() {
        Some(deadline) => tokio::time::timeout_at(deadline, future)
            .await
            .map_err(|_| RoundTripError::DeadlineExceeded)?,
        None => future.await,
    };
    Ok(result?)
}

/// Resolves the request decoder for `config`.
pub fn resolve_decoder(ctx: &Context, config: &Config) -> Result<Decoder, ResolveError> {
    match config.request_source() {
        RequestSource::None => match config.pre_decoder() {
            Some(pre_decoder) => {
                debug!("using injected pre-decoder");
                Ok(pre_decoder(ctx))
            }
            None => Ok(Decoder::noop()),
        },
        RequestSource::File(path) => {
            let file = File::open(path).map_err(|source| ResolveError::OpenRequestFile {
                path: path.clone(),
                source,
            })?;
            let format = file_format(config, path);
            decoder_for(config, &format, Box::new(file))
        }
        RequestSource::Stdin => match config.request_format() {
            Some(format) => decoder_for(config, format, Box::new(std::io::stdin())),
            None => Ok(Decoder::noop()),
        },
    }
}

/// The file extension when a decoder is registered for it, otherwise the configured format.
fn file_format(config: &Config, path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| config.decoders().contains(ext))
        .or(config.request_format())
        .unwrap_or_default()
        .to_string()
}

fn decoder_for(config: &Config, format: &str, input: Input) -> Result<Decoder, ResolveError> {
    let maker = config
        .decoders()
        .get(format)
        .ok_or_else(|| ResolveError::UnknownRequestFormat(format.to_string()))?;

    debug!(format, "request decoder selected");
    Ok(maker.make_decoder(input))
}

/// Resolves the response encoder for `config`, bound to stdout.
pub fn resolve_encoder(config: &Config) -> Result<Encoder, ResolveError> {
    let Some(format) = config.response_format() else {
        return Ok(Encoder::noop());
    };

    let maker = config
        .encoders()
        .get(format)
        .ok_or_else(|| ResolveError::UnknownResponseFormat(format.to_string()))?;

    debug!(format, "response encoder selected");
    Ok(maker.make_encoder(Box::new(std::io::stdout())))
}
