//! # Configuration Model
//!
//! A [`Config`] holds everything one command invocation needs: where the server is, where
//! the request comes from, which formats to speak, how to secure the transport, and which
//! hooks to run.
//!
//! ## Building a configuration
//!
//! Configurations start from a snapshot of the process-wide defaults (see
//! [`crate::registry`]) and apply an ordered list of [`Opt`] steps. Each step is a pure
//! `ConfigBuilder -> ConfigBuilder` transformation, so the same options can be composed into
//! any number of independent configurations:
//!
//! ```rust
//! use grpcmd_core::config::{Config, options};
//!
//! let common = vec![options::with_server_addr("example.com:443"), options::with_tls()];
//!
//! let config = Config::build(common.iter().cloned().chain([
//!     options::with_response_format("prettyjson"),
//! ]));
//!
//! assert!(config.tls().enabled);
//! assert_eq!(config.response_format(), Some("prettyjson"));
//! ```
//!
//! Once built, a configuration is only mutated by [`Config::apply_flags`], before the round
//! trip starts.
pub mod flags;
pub mod options;

use crate::{
    BoxError,
    codec::{self, Decoder, DecoderMaker, EncoderMaker, Formats},
    context::Context,
    naming::{self, Namer},
    registry,
    transport::PreDialer,
};
use clap::{ArgMatches, Command};
use flags::{FlagBinder, FlagError};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Channel;

/// Supplies an already established channel, bypassing the transport builder.
pub type ConnectionSupplier = Arc<dyn Fn() -> Result<Channel, BoxError> + Send + Sync>;

/// Supplies the request decoder when no request source is configured.
pub type PreDecoder = Arc<dyn Fn(&Context) -> Decoder + Send + Sync>;

/// Derives the context a round trip runs under from the one built from the timeout.
pub type ContextFn = Arc<dyn Fn(Context) -> Result<Context, BoxError> + Send + Sync>;

const STDIN_MARKER: &str = "-";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} naming strategy not specified")]
    MissingNamer(&'static str),
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to prepare the call context: '{0}'")]
pub struct ContextError(#[source] pub BoxError);

/// Where the request payload is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestSource {
    /// No payload: the request is left as constructed by the command.
    #[default]
    None,
    /// Standard input.
    Stdin,
    /// A file; its extension may select the format.
    File(PathBuf),
}

impl RequestSource {
    /// Parses the flag spelling: `-` is stdin, the empty string is no source.
    pub fn parse(value: &str) -> Self {
        match value {
            "" => RequestSource::None,
            STDIN_MARKER => RequestSource::Stdin,
            path => RequestSource::File(PathBuf::from(path)),
        }
    }

    fn as_flag_value(&self) -> String {
        match self {
            RequestSource::None => String::new(),
            RequestSource::Stdin => STDIN_MARKER.to_string(),
            RequestSource::File(path) => path.display().to_string(),
        }
    }
}

/// Transport security settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    pub enabled: bool,
    /// Overrides the peer name otherwise taken from the server address.
    pub server_name: Option<String>,
    /// INSECURE: accept any server certificate.
    pub insecure_skip_verify: bool,
    pub ca_cert_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

#[derive(Clone)]
pub(crate) struct Settings {
    pub(crate) server_addr: String,
    pub(crate) request_source: RequestSource,
    pub(crate) request_format: Option<String>,
    pub(crate) response_format: Option<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) env_var_prefix: Option<String>,
    pub(crate) tls: TlsOptions,
    pub(crate) decoders: Formats<dyn DecoderMaker>,
    pub(crate) encoders: Formats<dyn EncoderMaker>,
    pub(crate) flag_binders: Vec<Arc<dyn FlagBinder>>,
    pub(crate) pre_dialers: Vec<Arc<dyn PreDialer>>,
    pub(crate) connection_supplier: Option<ConnectionSupplier>,
    pub(crate) pre_decoder: Option<PreDecoder>,
    pub(crate) context_fn: Option<ContextFn>,
}

impl Settings {
    fn empty() -> Self {
        Self {
            server_addr: String::new(),
            request_source: RequestSource::None,
            request_format: None,
            response_format: None,
            timeout: None,
            env_var_prefix: None,
            tls: TlsOptions::default(),
            decoders: Formats::new(),
            encoders: Formats::new(),
            flag_binders: Vec::new(),
            pre_dialers: Vec::new(),
            connection_supplier: None,
            pre_decoder: None,
            context_fn: None,
        }
    }
}

/// A reusable configuration step.
#[derive(Clone)]
pub struct Opt(Arc<dyn Fn(ConfigBuilder) -> ConfigBuilder + Send + Sync>);

impl Opt {
    pub fn new<F>(step: F) -> Self
    where
        F: Fn(ConfigBuilder) -> ConfigBuilder + Send + Sync + 'static,
    {
        Self(Arc::new(step))
    }

    pub fn apply(&self, builder: ConfigBuilder) -> ConfigBuilder {
        (self.0)(builder)
    }
}

impl Debug for Opt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Opt")
    }
}

/// Accumulates settings until [`ConfigBuilder::build`] checks the naming strategies.
#[derive(Clone)]
pub struct ConfigBuilder {
    command_namer: Option<Namer>,
    flag_namer: Option<Namer>,
    env_var_namer: Option<Namer>,
    settings: Settings,
}

impl ConfigBuilder {
    /// A builder with no naming strategies, formats or hooks.
    pub fn empty() -> Self {
        Self {
            command_namer: None,
            flag_namer: None,
            env_var_namer: None,
            settings: Settings::empty(),
        }
    }

    /// The library's own defaults, before any process-wide registration.
    pub(crate) fn builtin() -> Self {
        Self::empty()
            .server_addr("localhost:8080")
            .request_format("json")
            .response_format("json")
            .command_namer(naming::lower_kebab)
            .flag_namer(naming::lower_kebab)
            .env_var_namer(naming::upper_snake)
            .decoders(codec::builtin_decoders())
            .encoders(codec::builtin_encoders())
    }

    /// A snapshot of the process-wide defaults.
    pub fn from_defaults() -> Self {
        registry::snapshot()
    }

    pub fn apply(self, opt: &Opt) -> Self {
        opt.apply(self)
    }

    pub fn apply_all<I>(self, opts: I) -> Self
    where
        I: IntoIterator<Item = Opt>,
    {
        opts.into_iter().fold(self, |builder, opt| opt.apply(builder))
    }

    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.settings.server_addr = addr.into();
        self
    }

    pub fn request_source(mut self, source: RequestSource) -> Self {
        self.settings.request_source = source;
        self
    }

    /// Sets the request file; `-` reads stdin.
    pub fn request_file(self, path: impl AsRef<str>) -> Self {
        self.request_source(RequestSource::parse(path.as_ref()))
    }

    /// Sets the request format; an empty name clears it.
    pub fn request_format(mut self, format: impl Into<String>) -> Self {
        self.settings.request_format = non_empty(format.into());
        self
    }

    /// Sets the response format; an empty name clears it.
    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.settings.response_format = non_empty(format.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Lets every flag fall back to an environment variable named after it, prefixed.
    pub fn env_vars(mut self, prefix: impl Into<String>) -> Self {
        self.settings.env_var_prefix = Some(prefix.into());
        self
    }

    pub fn command_namer(mut self, namer: Namer) -> Self {
        self.command_namer = Some(namer);
        self
    }

    pub fn flag_namer(mut self, namer: Namer) -> Self {
        self.flag_namer = Some(namer);
        self
    }

    pub fn env_var_namer(mut self, namer: Namer) -> Self {
        self.env_var_namer = Some(namer);
        self
    }

    pub fn tls(mut self, enabled: bool) -> Self {
        self.settings.tls.enabled = enabled;
        self
    }

    pub fn tls_ca_cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.tls.enabled = true;
        self.settings.tls.ca_cert_file = Some(path.into());
        self
    }

    pub fn tls_cert_file(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.settings.tls.enabled = true;
        self.settings.tls.cert_file = Some(cert.into());
        self.settings.tls.key_file = Some(key.into());
        self
    }

    pub fn tls_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.settings.tls.enabled = true;
        self.settings.tls.server_name = Some(server_name.into());
        self
    }

    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.settings.tls.insecure_skip_verify = skip;
        self
    }

    pub fn flag_binder(mut self, binder: Arc<dyn FlagBinder>) -> Self {
        self.settings.flag_binders.push(binder);
        self
    }

    pub fn pre_dialer(mut self, dialer: Arc<dyn PreDialer>) -> Self {
        self.settings.pre_dialers.push(dialer);
        self
    }

    /// Adds or replaces a request format for this configuration only.
    pub fn input_decoder(mut self, format: impl Into<String>, maker: Arc<dyn DecoderMaker>) -> Self {
        self.settings.decoders = self.settings.decoders.with(format, maker);
        self
    }

    /// Adds or replaces a response format for this configuration only.
    pub fn output_encoder(
        mut self,
        format: impl Into<String>,
        maker: Arc<dyn EncoderMaker>,
    ) -> Self {
        self.settings.encoders = self.settings.encoders.with(format, maker);
        self
    }

    pub fn decoders(mut self, decoders: Formats<dyn DecoderMaker>) -> Self {
        self.settings.decoders = decoders;
        self
    }

    pub fn encoders(mut self, encoders: Formats<dyn EncoderMaker>) -> Self {
        self.settings.encoders = encoders;
        self
    }

    pub fn connection_supplier(mut self, supplier: ConnectionSupplier) -> Self {
        self.settings.connection_supplier = Some(supplier);
        self
    }

    pub fn pre_decoder(mut self, pre_decoder: PreDecoder) -> Self {
        self.settings.pre_decoder = Some(pre_decoder);
        self
    }

    pub fn context_fn(mut self, context_fn: ContextFn) -> Self {
        self.settings.context_fn = Some(context_fn);
        self
    }

    pub(crate) fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn try_build(self) -> Result<Config, ConfigError> {
        Ok(Config {
            command_namer: self.command_namer.ok_or(ConfigError::MissingNamer("command"))?,
            flag_namer: self.flag_namer.ok_or(ConfigError::MissingNamer("flag"))?,
            env_var_namer: self
                .env_var_namer
                .ok_or(ConfigError::MissingNamer("environment variable"))?,
            settings: self.settings,
        })
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// If the command, flag or environment variable naming strategy is unset. That is a
    /// defect in the generated command, not a runtime condition.
    pub fn build(self) -> Config {
        match self.try_build() {
            Ok(config) => config,
            Err(err) => panic!("{err}"),
        }
    }
}

/// Connection and I/O settings for one command invocation.
#[derive(Clone)]
pub struct Config {
    command_namer: Namer,
    flag_namer: Namer,
    env_var_namer: Namer,
    pub(crate) settings: Settings,
}

impl Config {
    /// Applies `opts` in order on top of the process-wide defaults.
    ///
    /// # Panics
    ///
    /// See [`ConfigBuilder::build`].
    pub fn build<I>(opts: I) -> Self
    where
        I: IntoIterator<Item = Opt>,
    {
        ConfigBuilder::from_defaults().apply_all(opts).build()
    }

    /// Like [`Config::build`], but reports a missing naming strategy instead of panicking.
    pub fn try_build<I>(opts: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Opt>,
    {
        ConfigBuilder::from_defaults().apply_all(opts).try_build()
    }

    /// Registers every flag binder's flags on `command`, in registration order.
    pub fn bind_flags(&self, command: Command) -> Command {
        self.settings
            .flag_binders
            .iter()
            .fold(command, |command, binder| binder.bind(command, self))
    }

    /// Writes the values parsed for the bound flags back into this configuration.
    pub fn apply_flags(&mut self, matches: &ArgMatches) -> Result<(), FlagError> {
        let binders = self.settings.flag_binders.clone();
        for binder in binders {
            binder.apply(matches, self)?;
        }
        Ok(())
    }

    /// The context a round trip should run under: bounded by the configured timeout, then
    /// passed through the context function if one is set.
    pub fn context(&self) -> Result<Context, ContextError> {
        let ctx = match self.settings.timeout {
            Some(timeout) => Context::background().with_timeout(timeout),
            None => Context::background(),
        };

        match &self.settings.context_fn {
            Some(context_fn) => context_fn(ctx).map_err(ContextError),
            None => Ok(ctx),
        }
    }

    pub fn server_addr(&self) -> &str {
        &self.settings.server_addr
    }

    pub fn request_source(&self) -> &RequestSource {
        &self.settings.request_source
    }

    pub fn request_format(&self) -> Option<&str> {
        self.settings.request_format.as_deref()
    }

    pub fn response_format(&self) -> Option<&str> {
        self.settings.response_format.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.settings.timeout
    }

    pub fn tls(&self) -> &TlsOptions {
        &self.settings.tls
    }

    pub fn env_var_prefix(&self) -> Option<&str> {
        self.settings.env_var_prefix.as_deref()
    }

    pub fn decoders(&self) -> &Formats<dyn DecoderMaker> {
        &self.settings.decoders
    }

    pub fn encoders(&self) -> &Formats<dyn EncoderMaker> {
        &self.settings.encoders
    }

    pub fn pre_dialers(&self) -> &[Arc<dyn PreDialer>] {
        &self.settings.pre_dialers
    }

    pub fn connection_supplier(&self) -> Option<&ConnectionSupplier> {
        self.settings.connection_supplier.as_ref()
    }

    pub fn pre_decoder(&self) -> Option<&PreDecoder> {
        self.settings.pre_decoder.as_ref()
    }

    /// Request format names, sorted.
    pub fn decoder_formats(&self) -> Vec<&str> {
        self.settings.decoders.names()
    }

    /// Response format names, sorted.
    pub fn encoder_formats(&self) -> Vec<&str> {
        self.settings.encoders.names()
    }

    pub fn command_name(&self, logical: &str) -> String {
        (self.command_namer)(logical)
    }

    pub fn flag_name(&self, logical: &str) -> String {
        (self.flag_namer)(logical)
    }

    /// The environment variable backing the flag for `logical`, if env vars are enabled.
    pub fn env_var_name(&self, logical: &str) -> Option<String> {
        self.settings.env_var_prefix.as_deref().map(|prefix| {
            if prefix.is_empty() {
                (self.env_var_namer)(logical)
            } else {
                (self.env_var_namer)(&format!("{prefix} {logical}"))
            }
        })
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_addr", &self.settings.server_addr)
            .field("request_source", &self.settings.request_source)
            .field("request_format", &self.settings.request_format)
            .field("response_format", &self.settings.response_format)
            .field("timeout", &self.settings.timeout)
            .field("env_var_prefix", &self.settings.env_var_prefix)
            .field("tls", &self.settings.tls)
            .field("decoders", &self.settings.decoders)
            .field("encoders", &self.settings.encoders)
            .field("flag_binders", &self.settings.flag_binders.len())
            .field("pre_dialers", &self.settings.pre_dialers.len())
            .field("context_fn", &self.settings.context_fn.is_some())
            .finish_non_exhaustive()
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
