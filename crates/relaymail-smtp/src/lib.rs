//! # relaymail-smtp
//!
//! Client-side SMTP submission engine (RFC 5321).
//!
//! ## Features
//!
//! - **Session controller**: greeting, EHLO/HELO negotiation, STARTTLS,
//!   AUTH, one MAIL/RCPT/DATA transaction, RSET/HELP/QUIT
//! - **TLS support**: both implicit TLS (port 465) and STARTTLS
//! - **Authentication**: PLAIN, CRAM-MD5, CRAM-SHA256, DIGEST-MD5,
//!   DIGEST-SHA256, or any custom [`CredentialEncoder`]
//! - **Transcript observers**: every line on the wire, with credentials
//!   redacted
//! - **Read timeouts**: a stalled server becomes an [`Error::Transport`],
//!   and the session refuses every later step
//!
//! ## Quick Start
//!
//! ```ignore
//! use relaymail_smtp::{Config, Envelope, Mailbox, Mechanism, Security, Session};
//!
//! #[tokio::main]
//! async fn main() -> relaymail_smtp::Result<()> {
//!     let config = Config::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .build();
//!
//!     // Greeting, EHLO, STARTTLS, EHLO again
//!     let mut session = Session::establish(config).await?;
//!
//!     let outcome = session.authenticate(Mechanism::CramMd5, "secret").await?;
//!     if !outcome.is_authenticated() {
//!         eprintln!("AUTH refused: {}", outcome.reply());
//!     }
//!
//!     let envelope = Envelope::new(Mailbox::new("sender@example.com")?)
//!         .to(Mailbox::new("recipient@example.com")?)
//!         .subject("Test")
//!         .body("Hello, World!");
//!     session.deliver(&envelope).await?;
//!
//!     session.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command lines
//! - [`connection`]: transport, channel and session controller
//! - [`envelope`]: message envelope and serialization
//! - [`parser`]: reply parser
//! - [`sasl`]: credential encoders and the AUTH exchange
//! - [`types`]: core SMTP types (addresses, capabilities, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
pub mod envelope;
mod error;
pub mod parser;
pub mod sasl;
pub mod types;

pub use connection::{
    Config, ConfigBuilder, Delivered, LoggingObserver, NoopObserver, Security, Session,
    SmtpStream, TranscriptObserver,
};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use sasl::{AuthOutcome, CredentialEncoder};
pub use types::{Address, CapabilitySet, Mailbox, Mechanism, Reply, ReplyCode};
