//! SASL mechanism descriptors.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// SASL mechanism selected by the caller for `AUTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// PLAIN - base64 of the bare secret
    Plain,
    /// CRAM-MD5 - HMAC-MD5 over the server challenge
    CramMd5,
    /// CRAM-SHA256 - HMAC-SHA256 over the server challenge
    CramSha256,
    /// DIGEST-MD5 - MD5 of the secret, challenge ignored
    DigestMd5,
    /// DIGEST-SHA256 - SHA-256 of the secret, challenge ignored
    DigestSha256,
}

impl Mechanism {
    /// All supported mechanisms.
    pub const ALL: [Self; 5] = [
        Self::Plain,
        Self::CramMd5,
        Self::CramSha256,
        Self::DigestMd5,
        Self::DigestSha256,
    ];

    /// Parses a mechanism name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "CRAM-MD5" => Some(Self::CramMd5),
            "CRAM-SHA256" => Some(Self::CramSha256),
            "DIGEST-MD5" => Some(Self::DigestMd5),
            "DIGEST-SHA256" => Some(Self::DigestSha256),
            _ => None,
        }
    }

    /// Returns the mechanism name as sent in `AUTH`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::CramSha256 => "CRAM-SHA256",
            Self::DigestMd5 => "DIGEST-MD5",
            Self::DigestSha256 => "DIGEST-SHA256",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::NotSupported(format!("AUTH {s}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_names() {
        for mechanism in Mechanism::ALL {
            assert_eq!(Mechanism::parse(mechanism.as_str()), Some(mechanism));
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Mechanism::parse("cram-md5"), Some(Mechanism::CramMd5));
        assert_eq!(Mechanism::parse(" Plain "), Some(Mechanism::Plain));
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(Mechanism::parse("LOGIN"), None);
        assert!("XOAUTH2".parse::<Mechanism>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Mechanism::DigestSha256.to_string(), "DIGEST-SHA256");
    }
}
