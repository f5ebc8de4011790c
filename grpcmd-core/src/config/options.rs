//! # Configuration Options
//!
//! Each function returns an [`Opt`], a reusable step for [`Config::build`](super::Config::build).
//! The `*_flag` options register the corresponding built-in [`Flag`] so the setting can be
//! overridden from the command line (and the environment, see [`with_env_vars`]).
use super::{ConnectionSupplier, ContextFn, Opt, PreDecoder, RequestSource};
use crate::{
    codec::{DecoderMaker, EncoderMaker},
    config::flags::{Flag, FlagBinder},
    naming::Namer,
    transport::PreDialer,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn with_flag(flag: Flag) -> Opt {
    Opt::new(move |builder| builder.flag_binder(Arc::new(flag)))
}

pub fn with_server_addr_flag() -> Opt {
    with_flag(Flag::ServerAddr)
}

pub fn with_request_file_flag() -> Opt {
    with_flag(Flag::RequestFile)
}

pub fn with_request_format_flag() -> Opt {
    with_flag(Flag::RequestFormat)
}

pub fn with_response_format_flag() -> Opt {
    with_flag(Flag::ResponseFormat)
}

pub fn with_timeout_flag() -> Opt {
    with_flag(Flag::Timeout)
}

pub fn with_tls_flag() -> Opt {
    with_flag(Flag::Tls)
}

pub fn with_server_name_flag() -> Opt {
    with_flag(Flag::TlsServerName)
}

pub fn with_insecure_skip_verify_flag() -> Opt {
    with_flag(Flag::TlsInsecureSkipVerify)
}

pub fn with_ca_cert_file_flag() -> Opt {
    with_flag(Flag::TlsCaCertFile)
}

pub fn with_cert_file_flag() -> Opt {
    with_flag(Flag::TlsCertFile)
}

pub fn with_key_file_flag() -> Opt {
    with_flag(Flag::TlsKeyFile)
}

/// Every built-in flag, in the order they appear in help output.
pub fn with_default_flags() -> Vec<Opt> {
    Flag::ALL.into_iter().map(with_flag).collect()
}

pub fn with_server_addr(addr: impl Into<String>) -> Opt {
    let addr = addr.into();
    Opt::new(move |builder| builder.server_addr(addr.clone()))
}

/// Reads the request from `path`; `-` reads stdin.
pub fn with_request_file(path: impl Into<String>) -> Opt {
    let source = RequestSource::parse(&path.into());
    Opt::new(move |builder| builder.request_source(source.clone()))
}

pub fn with_request_format(format: impl Into<String>) -> Opt {
    let format = format.into();
    Opt::new(move |builder| builder.request_format(format.clone()))
}

pub fn with_response_format(format: impl Into<String>) -> Opt {
    let format = format.into();
    Opt::new(move |builder| builder.response_format(format.clone()))
}

pub fn with_timeout(timeout: Duration) -> Opt {
    Opt::new(move |builder| builder.timeout(timeout))
}

pub fn with_env_vars(prefix: impl Into<String>) -> Opt {
    let prefix = prefix.into();
    Opt::new(move |builder| builder.env_vars(prefix.clone()))
}

pub fn with_command_namer(namer: Namer) -> Opt {
    Opt::new(move |builder| builder.command_namer(namer))
}

pub fn with_flag_namer(namer: Namer) -> Opt {
    Opt::new(move |builder| builder.flag_namer(namer))
}

pub fn with_env_var_namer(namer: Namer) -> Opt {
    Opt::new(move |builder| builder.env_var_namer(namer))
}

pub fn with_tls() -> Opt {
    Opt::new(|builder| builder.tls(true))
}

pub fn with_tls_ca_cert_file(path: impl Into<PathBuf>) -> Opt {
    let path = path.into();
    Opt::new(move |builder| builder.tls_ca_cert_file(path.clone()))
}

pub fn with_tls_cert_file(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Opt {
    let (cert, key) = (cert.into(), key.into());
    Opt::new(move |builder| builder.tls_cert_file(cert.clone(), key.clone()))
}

pub fn with_tls_server_name(server_name: impl Into<String>) -> Opt {
    let server_name = server_name.into();
    Opt::new(move |builder| builder.tls_server_name(server_name.clone()))
}

/// INSECURE: accept any server certificate.
pub fn with_insecure_skip_verify() -> Opt {
    Opt::new(|builder| builder.insecure_skip_verify(true))
}

pub fn with_flag_binder(binder: impl FlagBinder + 'static) -> Opt {
    let binder: Arc<dyn FlagBinder> = Arc::new(binder);
    Opt::new(move |builder| builder.flag_binder(Arc::clone(&binder)))
}

pub fn with_pre_dialer(dialer: impl PreDialer + 'static) -> Opt {
    let dialer: Arc<dyn PreDialer> = Arc::new(dialer);
    Opt::new(move |builder| builder.pre_dialer(Arc::clone(&dialer)))
}

/// Adds a request format to the configuration being built, without touching the defaults
/// or any other configuration.
pub fn with_input_decoder(format: impl Into<String>, maker: impl DecoderMaker + 'static) -> Opt {
    let format = format.into();
    let maker: Arc<dyn DecoderMaker> = Arc::new(maker);
    Opt::new(move |builder| builder.input_decoder(format.clone(), Arc::clone(&maker)))
}

/// Adds a response format to the configuration being built, without touching the defaults
/// or any other configuration.
pub fn with_output_encoder(format: impl Into<String>, maker: impl EncoderMaker + 'static) -> Opt {
    let format = format.into();
    let maker: Arc<dyn EncoderMaker> = Arc::new(maker);
    Opt::new(move |builder| builder.output_encoder(format.clone(), Arc::clone(&maker)))
}

pub fn with_connection_supplier(supplier: ConnectionSupplier) -> Opt {
    Opt::new(move |builder| builder.connection_supplier(Arc::clone(&supplier)))
}

pub fn with_pre_decoder(pre_decoder: PreDecoder) -> Opt {
    Opt::new(move |builder| builder.pre_decoder(Arc::clone(&pre_decoder)))
}

/// Lets the command derive its call context, for example to attach a tighter deadline.
pub fn with_context_fn(context_fn: ContextFn) -> Opt {
    Opt::new(move |builder| builder.context_fn(Arc::clone(&context_fn)))
}
