//! Error types for SMTP sessions.

use std::io;

use crate::types::Reply;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Every variant produced by a server rejection carries the full [`Reply`]
/// so the relay's own wording is available for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure on the connection, including read/write timeouts.
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// TLS handshake failure.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The server sent something that is not a valid SMTP reply.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The connection greeting was not a success reply.
    #[error("Greeting rejected: {0}")]
    GreetingRejected(Reply),

    /// EHLO or HELO was refused.
    #[error("Negotiation failed: {0}")]
    NegotiationFailed(Reply),

    /// STARTTLS was refused.
    #[error("STARTTLS rejected: {0}")]
    TlsUpgradeRejected(Reply),

    /// MAIL FROM was refused.
    #[error("Sender rejected: {0}")]
    SenderRejected(Reply),

    /// RCPT TO was refused for `address`.
    #[error("Recipient {address} rejected: {reply}")]
    RecipientRejected {
        /// The refused recipient address.
        address: String,
        /// The server's reply.
        reply: Reply,
    },

    /// DATA did not receive the 354 continuation.
    #[error("DATA rejected: {0}")]
    DataRejected(Reply),

    /// The message content was refused after the terminating dot.
    #[error("Delivery rejected: {0}")]
    DeliveryRejected(Reply),

    /// An auxiliary command (RSET, QUIT) was refused.
    #[error("Command rejected: {0}")]
    CommandRejected(Reply),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// A command argument would break the one-line framing.
    #[error("Invalid command argument: {0}")]
    InvalidArgument(String),

    /// A step was attempted before its preconditions were met.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// A credential response could not be derived.
    #[error("Credential encoding failed: {0}")]
    Credential(String),

    /// Connection already authenticated.
    #[error("Connection already authenticated")]
    AlreadyAuthenticated,

    /// Feature not advertised by the server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// The envelope has no recipients.
    #[error("Envelope has no recipients")]
    NoRecipients,

    /// The serialized message exceeds the advertised SIZE limit.
    #[error("Message of {size} bytes exceeds the server limit of {limit} bytes")]
    MessageTooLarge {
        /// Serialized message size.
        size: usize,
        /// Limit advertised in the EHLO SIZE extension.
        limit: usize,
    },
}

impl Error {
    /// Returns the server reply attached to this error, if any.
    #[must_use]
    pub const fn reply(&self) -> Option<&Reply> {
        match self {
            Self::GreetingRejected(reply)
            | Self::NegotiationFailed(reply)
            | Self::TlsUpgradeRejected(reply)
            | Self::SenderRejected(reply)
            | Self::RecipientRejected { reply, .. }
            | Self::DataRejected(reply)
            | Self::DeliveryRejected(reply)
            | Self::CommandRejected(reply) => Some(reply),
            _ => None,
        }
    }

    /// Returns true if the connection can no longer be used.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Tls(_) | Self::Protocol(_))
    }

    /// Returns true if the attached reply is a permanent error (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.reply().is_some_and(Reply::is_permanent_error)
    }

    /// Returns true if the attached reply is a transient error (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.reply().is_some_and(Reply::is_transient_error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;

    fn reply(code: u16, text: &str) -> Reply {
        Reply::new(ReplyCode::new(code), vec![text.to_string()])
    }

    #[test]
    fn test_reply_is_attached() {
        let err = Error::RecipientRejected {
            address: "bob@example.com".into(),
            reply: reply(550, "No such user"),
        };
        assert_eq!(err.reply().unwrap().code.as_u16(), 550);
        assert!(err.is_permanent());
        assert!(!err.is_transient());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_display_keeps_server_text() {
        let err = Error::SenderRejected(reply(451, "Try again later"));
        assert_eq!(err.to_string(), "Sender rejected: 451 Try again later");
        assert!(err.is_transient());
    }

    #[test]
    fn test_transport_is_fatal() {
        let err = Error::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(err.is_fatal());
        assert!(err.reply().is_none());
    }
}
