//! SMTP command builder.

use std::fmt;

use crate::error::{Error, Result};
use crate::types::Address;

/// SMTP command.
///
/// Renders to a single wire line without the CRLF terminator; the channel
/// appends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism name
        mechanism: String,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// HELP - Ask the server for help text
    Help {
        /// Optional topic
        topic: Option<String>,
    },
    /// SIZE - Probe the server's size limit
    Size,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Returns the command verb, for logging.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Help { .. } => "HELP",
            Self::Size => "SIZE",
            Self::Quit => "QUIT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } => write!(f, "HELO {hostname}"),
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::Auth { mechanism } => write!(f, "AUTH {mechanism}"),
            Self::MailFrom { from } => write!(f, "MAIL FROM:<{from}>"),
            Self::RcptTo { to } => write!(f, "RCPT TO:<{to}>"),
            Self::Help { topic: Some(topic) } => write!(f, "HELP {topic}"),
            other => f.write_str(other.verb()),
        }
    }
}

/// Checks that `value` can be sent as a single command argument.
///
/// # Errors
///
/// [`Error::InvalidArgument`] if `value` is empty or contains whitespace or
/// control characters.
pub fn check_argument(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidArgument(format!("{what} {value:?}")));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_greetings() {
        let helo = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(helo.to_string(), "HELO client.example.com");

        let ehlo = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(ehlo.to_string(), "EHLO client.example.com");
    }

    #[test]
    fn test_auth_command() {
        let auth = Command::Auth {
            mechanism: "CRAM-SHA256".to_string(),
        };
        assert_eq!(auth.to_string(), "AUTH CRAM-SHA256");
    }

    #[test]
    fn test_check_argument() {
        assert!(check_argument("hostname", "client.example.com").is_ok());
        assert!(check_argument("topic", "DATA").is_ok());

        for bad in ["", "X\r\nRSET", "two words", "tab\there", "nul\0"] {
            let err = check_argument("topic", bad).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_envelope_commands() {
        let from = Command::MailFrom {
            from: Address::new("bob@email.com").unwrap(),
        };
        assert_eq!(from.to_string(), "MAIL FROM:<bob@email.com>");

        let to = Command::RcptTo {
            to: Address::new("alice@email.com").unwrap(),
        };
        assert_eq!(to.to_string(), "RCPT TO:<alice@email.com>");
    }

    #[test]
    fn test_bare_verbs() {
        assert_eq!(Command::StartTls.to_string(), "STARTTLS");
        assert_eq!(Command::Data.to_string(), "DATA");
        assert_eq!(Command::Rset.to_string(), "RSET");
        assert_eq!(Command::Size.to_string(), "SIZE");
        assert_eq!(Command::Quit.to_string(), "QUIT");
        assert_eq!(Command::Help { topic: None }.to_string(), "HELP");
    }

    #[test]
    fn test_help_with_topic() {
        let cmd = Command::Help {
            topic: Some("DATA".to_string()),
        };
        assert_eq!(cmd.to_string(), "HELP DATA");
    }
}
