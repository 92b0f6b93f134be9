//! Connection management: transport, transcript channel and session.
//!
//! - [`stream`]: TCP/TLS transport and the STARTTLS upgrade hook
//! - [`channel`]: CRLF line framing, reply reading, read timeouts
//! - [`observer`]: transcript hooks
//! - [`session`]: the protocol state machine

mod channel;
mod config;
mod observer;
mod session;
mod stream;

pub use channel::Channel;
pub use config::{Config, ConfigBuilder, DEFAULT_PACING, Security, local_hostname};
pub use observer::{LoggingObserver, NoopObserver, REDACTED, TranscriptObserver};
pub use session::{Authentication, Delivered, Encryption, Session};
pub use stream::{SmtpStream, TlsUpgrade, connect, connect_tls};
