//! Email address types.

use std::fmt;

use crate::error::{Error, Result};

/// Email address for the SMTP envelope (`MAIL FROM` / `RCPT TO`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Basic validation; also refuses anything that would break the
    /// `<...>` framing of an envelope command.
    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains forbidden characters: {addr:?}"
            )));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        };

        if domain.contains('@') {
            return Err(Error::InvalidAddress(
                "Address must have exactly one @".into(),
            ));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mailbox (optional display name + address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address.
    pub address: Address,
}

impl Mailbox {
    /// Creates a new mailbox with just an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: None,
            address: Address::new(address)?,
        })
    }

    /// Creates a new mailbox with a display name and address.
    ///
    /// An empty name is treated as no name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Ok(Self {
            name: (!name.is_empty()).then_some(name),
            address: Address::new(address)?,
        })
    }
}

/// Header form: `"Name" <addr>` or `<addr>`.
impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\" <{}>", self.address)
            }
            None => write!(f, "<{}>", self.address),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("a@b@c").is_err());
    }

    #[test]
    fn test_command_injection_is_refused() {
        assert!(Address::new("user@example.com>\r\nRCPT TO:<x@y").is_err());
        assert!(Address::new("user name@example.com").is_err());
        assert!(Address::new("<user@example.com>").is_err());
    }

    #[test]
    fn test_mailbox_display() {
        let bare = Mailbox::new("alice@email.com").unwrap();
        assert_eq!(bare.to_string(), "<alice@email.com>");

        let named = Mailbox::with_name("Alice", "alice@email.com").unwrap();
        assert_eq!(named.to_string(), "\"Alice\" <alice@email.com>");
    }

    #[test]
    fn test_mailbox_empty_name_is_dropped() {
        let mailbox = Mailbox::with_name("", "bob@email.com").unwrap();
        assert!(mailbox.name.is_none());
    }

    #[test]
    fn test_mailbox_name_quotes_are_escaped() {
        let mailbox = Mailbox::with_name("Bob \"The\" Sender", "bob@email.com").unwrap();
        assert_eq!(
            mailbox.to_string(),
            "\"Bob \\\"The\\\" Sender\" <bob@email.com>"
        );
    }
}
