//! # Grpcmd Core
//!
//! `grpcmd-core` is the runtime every generated `grpcmd` command delegates to. A generated
//! command is a thin shell around one remote method: it composes a [`Config`], binds its
//! flags, and hands a closure performing the actual call to [`round_trip`].
//!
//! ## Key Components
//!
//! * **[`Config`]:** Connection and I/O settings, assembled from the process-wide defaults
//!   (see [`registry`]) plus an ordered list of [`Opt`] steps, and optionally overridden by
//!   command-line flags or environment variables.
//! * **[`transport`]:** Turns a [`Config`] into dial options (plaintext or TLS, with custom
//!   roots, client identity and server-name override), runs pre-dial hooks, and opens a
//!   [`Connection`].
//! * **[`codec`]:** A format-keyed registry of decoder and encoder makers. Requests are read
//!   from a file or stdin, responses written to stdout, in any registered format.
//! * **[`round_trip`]:** Executes exactly one request/response cycle and guarantees the
//!   connection is released on every exit path.
//!
//! ## Dynamic calls
//!
//! Commands that carry their schema as a descriptor set rather than generated stubs can use
//! [`DynamicClient`](grpc::client::DynamicClient) to perform the unary call with
//! `prost_reflect::DynamicMessage` values.
//!
//! ## Example
//!
//! ```rust,no_run
//! use grpcmd_core::config::{Config, options};
//! use grpcmd_core::round_trip;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::build([
//!     options::with_server_addr("localhost:50051"),
//!     options::with_response_format("prettyjson"),
//! ]);
//! let ctx = config.context()?;
//!
//! round_trip(&ctx, &config, |_conn, _decoder, _encoder| async move {
//!     // decode the request, invoke the method on `_conn`, encode the response
//!     Ok(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that generated code
//! uses compatible versions of these underlying dependencies.
pub mod codec;
pub mod config;
pub mod context;
pub mod grpc;
pub mod naming;
pub mod registry;
pub mod round_trip;
pub mod transport;

pub use config::{Config, ConfigBuilder, Opt};
pub use context::Context;
pub use round_trip::{CallError, RoundTripError, round_trip};
pub use transport::Connection;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used by user-supplied hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
