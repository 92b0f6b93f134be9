//! SASL challenge-response authentication.
//!
//! Implements the credential derivations relays in this deployment expect:
//! - PLAIN - base64 of the bare secret (no authzid/authcid)
//! - CRAM-MD5 - HMAC-MD5 keyed by MD5(secret) over the raw challenge
//! - CRAM-SHA256 - HMAC-SHA256 keyed by MD5(secret) over the raw challenge
//! - DIGEST-MD5 - MD5(secret), challenge parameters ignored
//! - DIGEST-SHA256 - SHA-256(secret), challenge parameters ignored
//!
//! None of these are the RFC 4616 / RFC 2195 / RFC 2831 encodings. Each lives
//! behind [`CredentialEncoder`] so a standard derivation can replace it
//! without touching the session.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::Command;
use crate::connection::Channel;
use crate::error::{Error, Result};
use crate::types::{Mechanism, Reply, ReplyCode};

type HmacMd5 = Hmac<Md5>;
type HmacSha256 = Hmac<Sha256>;

/// Result of one AUTH exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The server accepted the credentials (235).
    Authenticated(Reply),
    /// The server refused the mechanism or the credentials.
    Rejected(Reply),
}

impl AuthOutcome {
    /// Returns true for [`AuthOutcome::Authenticated`].
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Returns the final reply of the exchange.
    #[must_use]
    pub const fn reply(&self) -> &Reply {
        match self {
            Self::Authenticated(reply) | Self::Rejected(reply) => reply,
        }
    }
}

/// Derives the client response for one mechanism.
pub trait CredentialEncoder: Send + Sync {
    /// Computes the line sent after the `334` continuation.
    ///
    /// `challenge` is the text of the continuation reply, exactly as
    /// received (not base64-decoded).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] if no response can be derived.
    fn encode(&self, secret: &str, challenge: &str) -> Result<String>;
}

/// PLAIN: base64 of the secret.
#[derive(Debug, Default, Clone, Copy)]
pub struct Plain;

impl CredentialEncoder for Plain {
    fn encode(&self, secret: &str, _challenge: &str) -> Result<String> {
        Ok(STANDARD.encode(secret.as_bytes()))
    }
}

/// CRAM-MD5: base64(hex(HMAC-MD5(MD5(secret), challenge))).
#[derive(Debug, Default, Clone, Copy)]
pub struct CramMd5;

impl CredentialEncoder for CramMd5 {
    fn encode(&self, secret: &str, challenge: &str) -> Result<String> {
        let key = Md5::digest(secret.as_bytes());
        let mut mac =
            HmacMd5::new_from_slice(&key).map_err(|e| Error::Credential(e.to_string()))?;
        mac.update(challenge.as_bytes());
        Ok(encode_hex(&mac.finalize().into_bytes()))
    }
}

/// CRAM-SHA256: base64(hex(HMAC-SHA256(MD5(secret), challenge))).
///
/// The key is derived with MD5, not SHA-256.
#[derive(Debug, Default, Clone, Copy)]
pub struct CramSha256;

impl CredentialEncoder for CramSha256 {
    fn encode(&self, secret: &str, challenge: &str) -> Result<String> {
        let key = Md5::digest(secret.as_bytes());
        let mut mac =
            HmacSha256::new_from_slice(&key).map_err(|e| Error::Credential(e.to_string()))?;
        mac.update(challenge.as_bytes());
        Ok(encode_hex(&mac.finalize().into_bytes()))
    }
}

/// DIGEST-MD5 (simplified): base64(hex(MD5(secret))).
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestMd5;

impl CredentialEncoder for DigestMd5 {
    fn encode(&self, secret: &str, _challenge: &str) -> Result<String> {
        Ok(encode_hex(&Md5::digest(secret.as_bytes())))
    }
}

/// DIGEST-SHA256 (simplified): base64(hex(SHA-256(secret))).
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestSha256;

impl CredentialEncoder for DigestSha256 {
    fn encode(&self, secret: &str, _challenge: &str) -> Result<String> {
        Ok(encode_hex(&Sha256::digest(secret.as_bytes())))
    }
}

fn encode_hex(digest: &[u8]) -> String {
    STANDARD.encode(hex::encode(digest))
}

impl Mechanism {
    /// Returns the encoder implementing this mechanism.
    #[must_use]
    pub fn encoder(self) -> &'static dyn CredentialEncoder {
        match self {
            Self::Plain => &Plain,
            Self::CramMd5 => &CramMd5,
            Self::CramSha256 => &CramSha256,
            Self::DigestMd5 => &DigestMd5,
            Self::DigestSha256 => &DigestSha256,
        }
    }
}

/// Extracts the challenge from a `334` reply: the text after `334 `.
#[must_use]
pub fn challenge_text(reply: &Reply) -> &str {
    reply.last_line().trim_end_matches(['\r', '\n'])
}

/// Exchange progress; there is no way back to `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthState {
    Start,
    ChallengeReceived,
}

/// Drives one `AUTH <name>` exchange to completion.
///
/// 1. `AUTH <name>`; anything but 334 ends the exchange as rejected.
/// 2. The encoder's response is sent as a bare line.
/// 3. 235 means authenticated, anything else rejected.
///
/// # Errors
///
/// Transport and protocol failures, and encoder failures. A refusal by the
/// server is not an error.
pub async fn exchange<S: AsyncRead + AsyncWrite + Unpin>(
    channel: &mut Channel<S>,
    name: &str,
    encoder: &dyn CredentialEncoder,
    secret: &str,
) -> Result<AuthOutcome> {
    let mut state = AuthState::Start;
    tracing::debug!(mechanism = name, ?state, "starting AUTH");

    let reply = channel
        .command(&Command::Auth {
            mechanism: name.to_string(),
        })
        .await?;

    if reply.code != ReplyCode::AUTH_CONTINUE {
        tracing::warn!(mechanism = name, code = reply.code.as_u16(), "mechanism refused");
        return Ok(AuthOutcome::Rejected(reply));
    }
    state = AuthState::ChallengeReceived;
    tracing::debug!(mechanism = name, ?state, "challenge received");

    let response = match encoder.encode(secret, challenge_text(&reply)) {
        Ok(response) => response,
        Err(e) => {
            // The server is waiting for a response line; `*` cancels the exchange.
            channel.send("*").await?;
            channel.read_reply().await?;
            return Err(e);
        }
    };
    channel.send_sensitive(&response).await?;

    let reply = channel.read_reply().await?;
    if reply.code == ReplyCode::AUTH_SUCCESS {
        tracing::debug!(mechanism = name, "authenticated");
        Ok(AuthOutcome::Authenticated(reply))
    } else {
        tracing::warn!(mechanism = name, code = reply.code.as_u16(), "credentials refused");
        Ok(AuthOutcome::Rejected(reply))
    }
}
