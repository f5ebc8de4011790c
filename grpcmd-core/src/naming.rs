//! # Naming Strategies
//!
//! A [`Namer`] turns a logical setting name such as `"TLS CACertFile"` into its external
//! spelling. Words are split on spaces, `_`, `-` and case transitions, so acronym runs stay
//! together: `lower_kebab("TLS CACertFile")` is `tls-ca-cert-file`.
use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
    ToUpperCamelCase,
};

/// A pure function mapping a logical name to a flag, command or environment variable name.
pub type Namer = fn(&str) -> String;

/// `tlsCaCertFile`
pub fn lower_camel(name: &str) -> String {
    name.to_lower_camel_case()
}

/// `TlsCaCertFile`
pub fn upper_camel(name: &str) -> String {
    name.to_upper_camel_case()
}

/// `tls_ca_cert_file`
pub fn lower_snake(name: &str) -> String {
    name.to_snake_case()
}

/// `TLS_CA_CERT_FILE`
pub fn upper_snake(name: &str) -> String {
    name.to_shouty_snake_case()
}

/// `tls-ca-cert-file`
pub fn lower_kebab(name: &str) -> String {
    name.to_kebab_case()
}

/// `TLS-CA-CERT-FILE`
pub fn upper_kebab(name: &str) -> String {
    name.to_shouty_kebab_case()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acronyms_are_kept_together() {
        assert_eq!(lower_kebab("TLS CACertFile"), "tls-ca-cert-file");
        assert_eq!(lower_kebab("TLS InsecureSkipVerify"), "tls-insecure-skip-verify");
        assert_eq!(lower_kebab("ServerAddr"), "server-addr");
        assert_eq!(lower_kebab("TLS"), "tls");
    }

    #[test]
    fn test_conventions() {
        let name = "TLS ServerName";

        assert_eq!(lower_camel(name), "tlsServerName");
        assert_eq!(upper_camel(name), "TlsServerName");
        assert_eq!(lower_snake(name), "tls_server_name");
        assert_eq!(upper_snake(name), "TLS_SERVER_NAME");
        assert_eq!(lower_kebab(name), "tls-server-name");
        assert_eq!(upper_kebab(name), "TLS-SERVER-NAME");
    }

    #[test]
    fn test_env_prefix_becomes_leading_word() {
        assert_eq!(upper_snake("health ResponseFormat"), "HEALTH_RESPONSE_FORMAT");
    }
}
