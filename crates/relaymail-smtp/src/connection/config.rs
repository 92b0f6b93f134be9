//! Session configuration types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::observer::{NoopObserver, TranscriptObserver};

/// Default DATA pacing: 500 µs between body lines.
pub const DEFAULT_PACING: Duration = Duration::from_micros(500);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 25). **Not recommended for production.**
    #[default]
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }

    /// Parses `none`, `starttls` or `tls`/`implicit`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "plain" => Some(Self::None),
            "starttls" => Some(Self::StartTls),
            "tls" | "implicit" | "ssl" => Some(Self::Implicit),
            _ => None,
        }
    }
}

/// SMTP session configuration.
#[derive(Clone)]
pub struct Config {
    /// Server hostname (also used for TLS server name verification).
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Name sent with EHLO/HELO; the local hostname when `None`.
    pub local_name: Option<String>,
    /// Use EHLO (true) or HELO (false) when establishing a session.
    pub extended: bool,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout. Zero disables it.
    pub io_timeout: Duration,
    /// Minimum interval between DATA body lines. Zero disables it.
    pub pacing: Duration,
    /// Receives every transcript line.
    pub observer: Arc<dyn TranscriptObserver>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("local_name", &self.local_name)
            .field("extended", &self.extended)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Creates a new plaintext configuration on port 25.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Returns the EHLO/HELO name: the configured one, else the local
    /// hostname, else `localhost`.
    #[must_use]
    pub fn resolved_local_name(&self) -> String {
        self.local_name.clone().unwrap_or_else(local_hostname)
    }
}

/// Resolves the local hostname for the greeting.
#[must_use]
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Builder for session configuration.
#[derive(Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    local_name: Option<String>,
    extended: bool,
    connect_timeout: Duration,
    io_timeout: Duration,
    pacing: Duration,
    observer: Arc<dyn TranscriptObserver>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::None,
            local_name: None,
            extended: true,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
            pacing: DEFAULT_PACING,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the EHLO/HELO name.
    #[must_use]
    pub fn local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    /// Chooses EHLO (true) or HELO (false).
    #[must_use]
    pub const fn extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the DATA inter-line pacing interval.
    #[must_use]
    pub const fn pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Sets the transcript observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn TranscriptObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            local_name: self.local_name,
            extended: self.extended,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            pacing: self.pacing,
            observer: self.observer,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_security_parse() {
        assert_eq!(Security::parse("STARTTLS"), Some(Security::StartTls));
        assert_eq!(Security::parse("tls"), Some(Security::Implicit));
        assert_eq!(Security::parse("none"), Some(Security::None));
        assert_eq!(Security::parse("smime"), None);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("smtp.example.com");
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.security, Security::None);
        assert!(config.extended);
        assert_eq!(config.pacing, DEFAULT_PACING);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("smtp.example.com")
            .port(2525)
            .security(Security::StartTls)
            .local_name("client.example.org")
            .extended(false)
            .io_timeout(Duration::from_secs(5))
            .pacing(Duration::ZERO)
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.resolved_local_name(), "client.example.org");
        assert!(!config.extended);
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        assert!(config.pacing.is_zero());
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = Config::builder("smtp.example.com")
            .security(Security::Implicit)
            .build();

        assert_eq!(config.port, 465);
    }

    #[test]
    fn test_resolved_local_name_falls_back_to_hostname() {
        let config = Config::new("smtp.example.com");
        assert!(!config.resolved_local_name().is_empty());
    }

    #[test]
    fn test_debug_omits_observer() {
        let rendered = format!("{:?}", Config::new("smtp.example.com"));
        assert!(rendered.contains("smtp.example.com"));
        assert!(!rendered.contains("observer"));
    }
}
