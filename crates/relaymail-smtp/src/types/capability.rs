//! Capabilities discovered from the EHLO response.

use super::{Mechanism, Reply};

/// SMTP extension advertised on one EHLO line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - advertised mechanism names, uppercased
    Auth(Vec<String>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// HELP - the server answers HELP
    Help,
    /// Unknown extension
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from EHLO response.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(keyword) = parts.first() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(parts[1..].iter().map(|m| m.to_uppercase()).collect()),
            "SIZE" => Self::Size(parts.get(1).and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            "HELP" => Self::Help,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Ordered capability set of one negotiation.
///
/// `tokens` keeps every capability line verbatim in the order the server sent
/// them; `extensions` is the parsed view of the same lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    /// Server domain from the first EHLO/HELO line.
    pub domain: Option<String>,
    /// Raw capability tokens (text after the reply code).
    pub tokens: Vec<String>,
    /// Parsed extensions, same order as `tokens`.
    pub extensions: Vec<Extension>,
}

impl CapabilitySet {
    /// Builds the set from a successful EHLO reply.
    ///
    /// The first line names the server; every following line is a capability.
    #[must_use]
    pub fn from_ehlo(reply: &Reply) -> Self {
        let domain = Self::domain_of(reply);
        let tokens: Vec<String> = reply.message.iter().skip(1).cloned().collect();
        let extensions = tokens.iter().map(|t| Extension::parse(t)).collect();
        Self {
            domain,
            tokens,
            extensions,
        }
    }

    /// Builds the (capability-free) set from a successful HELO reply.
    #[must_use]
    pub fn from_helo(reply: &Reply) -> Self {
        Self {
            domain: Self::domain_of(reply),
            ..Self::default()
        }
    }

    fn domain_of(reply: &Reply) -> Option<String> {
        reply
            .message
            .first()
            .and_then(|line| line.split_whitespace().next())
            .map(str::to_string)
    }

    /// Returns true if no capability was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Checks if the server advertised an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns the maximum message size, if advertised with a non-zero value.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(size)) if *size > 0 => Some(*size),
            _ => None,
        })
    }

    /// Returns every advertised AUTH mechanism name, including ones this
    /// crate cannot drive.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<&str> {
        self.extensions
            .iter()
            .filter_map(|ext| match ext {
                Extension::Auth(names) => Some(names.iter().map(String::as_str)),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Returns true if `mechanism` appears in an AUTH line.
    #[must_use]
    pub fn advertises(&self, mechanism: Mechanism) -> bool {
        self.auth_mechanisms().contains(&mechanism.as_str())
    }
}
