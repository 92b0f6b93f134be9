//! Relay settings from the environment.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use relaymail_smtp::connection::DEFAULT_PACING;
use relaymail_smtp::{Config, Mechanism, Security, TranscriptObserver};

/// Errors in relay settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} not set")]
    Missing(&'static str),

    /// A variable could not be parsed.
    #[error("Invalid {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// How to reach and authenticate with the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub security: Security,
    /// `None` skips AUTH.
    pub mechanism: Option<Mechanism>,
    pub secret: Option<String>,
    pub pacing: Duration,
    pub timeout: Duration,
    pub helo_name: Option<String>,
}

impl Settings {
    /// Loads settings from the process environment.
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `SMTP_HOST`
    /// - `SMTP_PASS` (unless `SMTP_MECHANISM=none`)
    ///
    /// Optional (with defaults):
    /// - `SMTP_SECURITY` (default: `none`)
    /// - `SMTP_PORT` (default: 25, 587 or 465 by security mode)
    /// - `SMTP_MECHANISM` (default: `CRAM-MD5`)
    /// - `SMTP_PACING_NS` (default: `500000`)
    /// - `SMTP_TIMEOUT_SECS` (default: `60`)
    /// - `SMTP_HELO_NAME` (default: local hostname)
    ///
    /// Values from `overrides` win over the environment.
    pub fn from_env(overrides: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| overrides(key).or_else(|| env::var(key).ok()))
    }

    /// Loads settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = var("SMTP_HOST").ok_or(ConfigError::Missing("SMTP_HOST"))?;

        let security = match var("SMTP_SECURITY") {
            Some(value) => Security::parse(&value).ok_or_else(|| ConfigError::Invalid {
                name: "SMTP_SECURITY",
                reason: format!("expected none, starttls or tls, got {value:?}"),
            })?,
            None => Security::None,
        };

        let port = match var("SMTP_PORT") {
            Some(value) => parse_number("SMTP_PORT", &value)?,
            None => security.default_port(),
        };

        let mechanism = match var("SMTP_MECHANISM") {
            Some(value) if value.trim().eq_ignore_ascii_case("none") => None,
            Some(value) => Some(Mechanism::parse(&value).ok_or_else(|| ConfigError::Invalid {
                name: "SMTP_MECHANISM",
                reason: format!("unsupported mechanism {value:?}"),
            })?),
            None => Some(Mechanism::CramMd5),
        };

        let secret = lookup("SMTP_PASS");
        if mechanism.is_some() && secret.is_none() {
            return Err(ConfigError::Missing("SMTP_PASS"));
        }

        let pacing = match var("SMTP_PACING_NS") {
            Some(value) => Duration::from_nanos(parse_number("SMTP_PACING_NS", &value)?),
            None => DEFAULT_PACING,
        };

        let timeout = match var("SMTP_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_number("SMTP_TIMEOUT_SECS", &value)?),
            None => Duration::from_secs(60),
        };

        Ok(Self {
            host,
            port,
            security,
            mechanism,
            secret,
            pacing,
            timeout,
            helo_name: var("SMTP_HELO_NAME"),
        })
    }

    /// Returns the mechanism and secret to authenticate with, if any.
    pub fn credentials(&self) -> Option<(Mechanism, &str)> {
        self.mechanism.zip(self.secret.as_deref())
    }

    /// Builds the session configuration.
    pub fn session_config(
        &self,
        extended: bool,
        observer: Option<Arc<dyn TranscriptObserver>>,
    ) -> Config {
        let mut builder = Config::builder(self.host.clone())
            .port(self.port)
            .security(self.security)
            .extended(extended)
            .io_timeout(self.timeout)
            .pacing(self.pacing);

        if let Some(name) = &self.helo_name {
            builder = builder.local_name(name.clone());
        }
        if let Some(observer) = observer {
            builder = builder.observer(observer);
        }
        builder.build()
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[("SMTP_HOST", "mail.example.com"), ("SMTP_PASS", "s3cret")]).unwrap();

        assert_eq!(settings.host, "mail.example.com");
        assert_eq!(settings.port, 25);
        assert_eq!(settings.security, Security::None);
        assert_eq!(settings.mechanism, Some(Mechanism::CramMd5));
        assert_eq!(settings.pacing, Duration::from_micros(500));
        assert_eq!(settings.timeout, Duration::from_secs(60));
        assert_eq!(settings.helo_name, None);
        assert_eq!(settings.credentials(), Some((Mechanism::CramMd5, "s3cret")));
    }

    #[test]
    fn test_all_variables() {
        let settings = settings(&[
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_SECURITY", "starttls"),
            ("SMTP_MECHANISM", "digest-sha256"),
            ("SMTP_PASS", "s3cret"),
            ("SMTP_PACING_NS", "0"),
            ("SMTP_TIMEOUT_SECS", "5"),
            ("SMTP_HELO_NAME", "client.test"),
        ])
        .unwrap();

        assert_eq!(settings.port, 2525);
        assert_eq!(settings.security, Security::StartTls);
        assert_eq!(settings.mechanism, Some(Mechanism::DigestSha256));
        assert!(settings.pacing.is_zero());
        assert_eq!(settings.timeout, Duration::from_secs(5));

        let config = settings.session_config(true, None);
        assert_eq!(config.port, 2525);
        assert_eq!(config.resolved_local_name(), "client.test");
        assert_eq!(config.io_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_port_follows_security() {
        let settings = settings(&[
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_SECURITY", "tls"),
            ("SMTP_MECHANISM", "none"),
        ])
        .unwrap();

        assert_eq!(settings.port, 465);
        assert_eq!(settings.credentials(), None);
    }

    #[test]
    fn test_missing_host() {
        let err = settings(&[("SMTP_PASS", "s3cret")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SMTP_HOST")));
    }

    #[test]
    fn test_mechanism_requires_secret() {
        let err = settings(&[("SMTP_HOST", "mail.example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SMTP_PASS")));
    }

    #[test]
    fn test_invalid_values() {
        let err = settings(&[("SMTP_HOST", "h"), ("SMTP_PASS", "p"), ("SMTP_PORT", "smtp")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SMTP_PORT", .. }));

        let err = settings(&[("SMTP_HOST", "h"), ("SMTP_PASS", "p"), ("SMTP_MECHANISM", "LOGIN")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SMTP_MECHANISM", .. }));

        let err = settings(&[("SMTP_HOST", "h"), ("SMTP_PASS", "p"), ("SMTP_SECURITY", "smime")])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid SMTP_SECURITY: expected none, starttls or tls, got \"smime\""
        );
    }
}
