//! # Flag Binding
//!
//! Generated commands expose configuration settings as `clap` flags. A [`FlagBinder`] adds
//! its flags to a [`Command`] and, once the command line has been parsed, writes the parsed
//! values back into the [`Config`].
//!
//! Flag names come from the configuration's flag naming strategy. When environment
//! variables are enabled every flag also reads one (named by the environment variable
//! naming strategy, with the configured prefix). Precedence is command line, then
//! environment, then the value already in the configuration.
use super::{Config, RequestSource};
use clap::{
    Arg, ArgAction, ArgMatches, Command,
    builder::BoolishValueParser,
    parser::{MatchesError, ValueSource},
    value_parser,
};
use std::any::Any;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("Failed to read flag '--{flag}': '{source}'")]
    Matches {
        flag: String,
        #[source]
        source: MatchesError,
    },
}

/// Registers flags on a command and applies their parsed values to a configuration.
pub trait FlagBinder: Send + Sync {
    fn bind(&self, command: Command, config: &Config) -> Command;

    fn apply(&self, matches: &ArgMatches, config: &mut Config) -> Result<(), FlagError>;
}

/// The built-in configuration flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    ServerAddr,
    RequestFile,
    RequestFormat,
    ResponseFormat,
    Timeout,
    Tls,
    TlsServerName,
    TlsInsecureSkipVerify,
    TlsCaCertFile,
    TlsCertFile,
    TlsKeyFile,
}

impl Flag {
    pub const ALL: [Flag; 11] = [
        Flag::ServerAddr,
        Flag::RequestFile,
        Flag::RequestFormat,
        Flag::ResponseFormat,
        Flag::Timeout,
        Flag::Tls,
        Flag::TlsServerName,
        Flag::TlsInsecureSkipVerify,
        Flag::TlsCaCertFile,
        Flag::TlsCertFile,
        Flag::TlsKeyFile,
    ];

    /// The logical setting name fed to the naming strategies.
    pub fn logical_name(&self) -> &'static str {
        match self {
            Flag::ServerAddr => "ServerAddr",
            Flag::RequestFile => "RequestFile",
            Flag::RequestFormat => "RequestFormat",
            Flag::ResponseFormat => "ResponseFormat",
            Flag::Timeout => "Timeout",
            Flag::Tls => "TLS",
            Flag::TlsServerName => "TLS ServerName",
            Flag::TlsInsecureSkipVerify => "TLS InsecureSkipVerify",
            Flag::TlsCaCertFile => "TLS CACertFile",
            Flag::TlsCertFile => "TLS CertFile",
            Flag::TlsKeyFile => "TLS KeyFile",
        }
    }

    fn short(&self) -> Option<char> {
        match self {
            Flag::ServerAddr => Some('s'),
            Flag::RequestFile => Some('f'),
            Flag::RequestFormat => Some('i'),
            Flag::ResponseFormat => Some('o'),
            _ => None,
        }
    }

    fn help(&self, config: &Config) -> String {
        match self {
            Flag::ServerAddr => "server address in the form host:port".to_string(),
            Flag::RequestFile => "client request file; use \"-\" for stdin".to_string(),
            Flag::RequestFormat => {
                format!("request format ({})", config.decoder_formats().join(", "))
            }
            Flag::ResponseFormat => {
                format!("response format ({})", config.encoder_formats().join(", "))
            }
            Flag::Timeout => "RPC timeout (e.g. 500ms, 10s, 1m30s)".to_string(),
            Flag::Tls => "enable TLS".to_string(),
            Flag::TlsServerName => "TLS server name override".to_string(),
            Flag::TlsInsecureSkipVerify => "INSECURE: skip TLS checks".to_string(),
            Flag::TlsCaCertFile => "CA certificate file".to_string(),
            Flag::TlsCertFile => "client certificate file".to_string(),
            Flag::TlsKeyFile => "client key file".to_string(),
        }
    }

    /// The current configuration value, shown as the flag default.
    fn current(&self, config: &Config) -> String {
        let settings = &config.settings;
        let tls = &settings.tls;
        match self {
            Flag::ServerAddr => settings.server_addr.clone(),
            Flag::RequestFile => settings.request_source.as_flag_value(),
            Flag::RequestFormat => settings.request_format.clone().unwrap_or_default(),
            Flag::ResponseFormat => settings.response_format.clone().unwrap_or_default(),
            Flag::Timeout => settings
                .timeout
                .map(|timeout| humantime::format_duration(timeout).to_string())
                .unwrap_or_else(|| "0s".to_string()),
            Flag::Tls => tls.enabled.to_string(),
            Flag::TlsInsecureSkipVerify => tls.insecure_skip_verify.to_string(),
            Flag::TlsServerName => tls.server_name.clone().unwrap_or_default(),
            Flag::TlsCaCertFile => path_value(&tls.ca_cert_file),
            Flag::TlsCertFile => path_value(&tls.cert_file),
            Flag::TlsKeyFile => path_value(&tls.key_file),
        }
    }
}

impl FlagBinder for Flag {
    fn bind(&self, command: Command, config: &Config) -> Command {
        let name = config.flag_name(self.logical_name());
        let mut arg = Arg::new(name.clone())
            .long(name)
            .help(self.help(config));

        if let Some(short) = self.short() {
            arg = arg.short(short);
        }

        arg = match self {
            Flag::Tls | Flag::TlsInsecureSkipVerify => arg
                .action(ArgAction::Set)
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true")
                .value_parser(BoolishValueParser::new()),
            Flag::Timeout => arg.value_parser(parse_duration),
            _ => arg.value_parser(value_parser!(String)),
        };

        let current = self.current(config);
        if !current.is_empty() {
            arg = arg.default_value(current);
        }

        if let Some(env) = config.env_var_name(self.logical_name()) {
            arg = arg.env(env);
        }

        command.arg(arg)
    }

    fn apply(&self, matches: &ArgMatches, config: &mut Config) -> Result<(), FlagError> {
        let name = config.flag_name(self.logical_name());
        let settings = &mut config.settings;

        match self {
            Flag::ServerAddr => {
                if let Some(value) = explicit::<String>(matches, &name)? {
                    settings.server_addr = value;
                }
            }
            Flag::RequestFile => {
                if let Some(value) = explicit::<String>(matches, &name)? {
                    settings.request_source = RequestSource::parse(&value);
                }
            }
            Flag::RequestFormat => {
                if let Some(value) = explicit::<String>(matches, &name)? {
                    settings.request_format = super::non_empty(value);
                }
            }
            Flag::ResponseFormat => {
                if let Some(value) = explicit::<String>(matches, &name)? {
                    settings.response_format = super::non_empty(value);
                }
            }
            Flag::Timeout => {
                if let Some(value) = explicit::<Duration>(matches, &name)? {
                    settings.timeout = (!value.is_zero()).then_some(value);
                }
            }
            Flag::Tls => {
                if let Some(value) = explicit::<bool>(matches, &name)? {
                    settings.tls.enabled = value;
                }
            }
            Flag::TlsInsecureSkipVerify => {
                if let Some(value) = explicit::<bool>(matches, &name)? {
                    settings.tls.insecure_skip_verify = value;
                }
            }
            Flag::TlsServerName => {
                if let Some(value) = explicit::<String>(matches, &name)? {
                    settings.tls.server_name = super::non_empty(value);
                }
            }
            Flag::TlsCaCertFile => {
                if let Some(value) = explicit::<String>(matches, &name)? {
                    settings.tls.ca_cert_file = non_empty_path(value);
                }
            }
            Flag::TlsCertFile => {
                if let Some(value) = explicit::<String>(matches, &name)? {
                    settings.tls.cert_file = non_empty_path(value);
                }
            }
            Flag::TlsKeyFile => {
                if let Some(value) = explicit::<String>(matches, &name)? {
                    settings.tls.key_file = non_empty_path(value);
                }
            }
        }

        Ok(())
    }
}

/// Returns the parsed value only when it came from the command line or the environment.
fn explicit<T>(matches: &ArgMatches, name: &str) -> Result<Option<T>, FlagError>
where
    T: Any + Clone + Send + Sync + 'static,
{
    let value = matches
        .try_get_one::<T>(name)
        .map_err(|source| FlagError::Matches {
            flag: name.to_string(),
            source,
        })?;

    match matches.value_source(name) {
        Some(ValueSource::CommandLine | ValueSource::EnvVariable) => Ok(value.cloned()),
        _ => Ok(None),
    }
}

fn parse_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(value)
}

fn path_value(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default()
}

fn non_empty_path(value: String) -> Option<PathBuf> {
    super::non_empty(value).map(PathBuf::from)
}
