//! One-shot delivery through the relay.

use std::sync::Arc;

use anyhow::{Context, Result};
use relaymail_smtp::{Delivered, Envelope, Mailbox, Session, TranscriptObserver};
use tracing::{info, warn};

use crate::config::Settings;

/// An email to send, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub from: String,
    pub from_name: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub subject: String,
    pub body: String,
}

impl Draft {
    /// Validates every address and builds the envelope.
    pub fn into_envelope(self) -> Result<Envelope> {
        let sender = match self.from_name {
            Some(name) => Mailbox::with_name(name, &self.from),
            None => Mailbox::new(&self.from),
        }
        .with_context(|| format!("invalid sender {:?}", self.from))?;

        let mut envelope = Envelope::new(sender).subject(self.subject).body(self.body);
        for address in self.to {
            envelope = envelope.to(mailbox(&address)?);
        }
        for address in self.cc {
            envelope = envelope.cc(mailbox(&address)?);
        }
        for address in self.bcc {
            envelope = envelope.bcc(mailbox(&address)?);
        }
        for (key, value) in self.headers {
            envelope = envelope.header(key, value);
        }
        Ok(envelope)
    }
}

fn mailbox(address: &str) -> Result<Mailbox> {
    Mailbox::new(address).with_context(|| format!("invalid recipient {address:?}"))
}

/// Runs a whole session: connect, negotiate, optional STARTTLS and AUTH,
/// deliver, QUIT.
///
/// A refused AUTH is logged and delivery is still attempted, since some
/// relays accept mail without authentication.
///
/// # Errors
///
/// Returns an error if any step other than AUTH or QUIT fails.
pub async fn send(
    settings: &Settings,
    envelope: &Envelope,
    extended: bool,
    observer: Option<Arc<dyn TranscriptObserver>>,
) -> Result<Delivered> {
    let config = settings.session_config(extended, observer);
    let mut session = Session::establish(config)
        .await
        .with_context(|| format!("establishing session with {}:{}", settings.host, settings.port))?;

    info!(
        server = session.server_domain().unwrap_or("unknown"),
        encrypted = session.is_encrypted(),
        "session established"
    );

    if let Some((mechanism, secret)) = settings.credentials() {
        let outcome = session
            .authenticate(mechanism, secret)
            .await
            .with_context(|| format!("AUTH {mechanism}"))?;

        if outcome.is_authenticated() {
            info!(%mechanism, "authenticated");
        } else {
            warn!(%mechanism, reply = %outcome.reply(), "authentication refused; sending anyway");
        }
    }

    let delivered = session
        .deliver(envelope)
        .await
        .context("delivering message")?;
    info!(
        recipients = delivered.recipients,
        reply = %delivered.reply,
        "message accepted"
    );

    if let Err(e) = session.quit().await {
        warn!(error = %e, "QUIT failed after delivery");
    }

    Ok(delivered)
}
