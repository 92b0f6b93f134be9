//! Transcript observers.
//!
//! Every line that crosses the channel is reported to the session's observer,
//! so diagnostics can be routed anywhere without the protocol engine knowing
//! about the sink.
//!
//! # Example
//!
//! ```ignore
//! use relaymail_smtp::connection::TranscriptObserver;
//!
//! struct Counter(std::sync::atomic::AtomicUsize);
//!
//! impl TranscriptObserver for Counter {
//!     fn on_receive(&self, _line: &str) {
//!         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!     }
//! }
//! ```

use crate::types::Reply;

/// Placeholder reported instead of AUTH credential lines.
pub const REDACTED: &str = "<credentials>";

/// Observer for session traffic.
///
/// All methods default to doing nothing.
pub trait TranscriptObserver: Send + Sync {
    /// Called for every line written to the server, without CRLF.
    ///
    /// Credential responses are reported as [`REDACTED`].
    fn on_send(&self, line: &str) {
        let _ = line;
    }

    /// Called for every raw line read from the server, without CRLF.
    fn on_receive(&self, line: &str) {
        let _ = line;
    }

    /// Called for every DATA body line after dot-stuffing.
    fn on_body_line(&self, line: &str) {
        let _ = line;
    }

    /// Called once per complete (possibly multi-line) reply.
    fn on_reply(&self, reply: &Reply) {
        let _ = reply;
    }
}

/// Observer that ignores all traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TranscriptObserver for NoopObserver {}

/// Observer that echoes the transcript through `tracing`.
///
/// Commands and reply lines are logged at `info`; DATA body lines only at
/// `trace` to keep message content out of ordinary logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl TranscriptObserver for LoggingObserver {
    fn on_send(&self, line: &str) {
        tracing::info!("C: {line}");
    }

    fn on_receive(&self, line: &str) {
        tracing::info!("S: {line}");
    }

    fn on_body_line(&self, line: &str) {
        tracing::trace!("C: {line}");
    }

    fn on_reply(&self, reply: &Reply) {
        if !reply.is_success() && !reply.is_intermediate() {
            tracing::warn!(code = reply.code.as_u16(), "server replied with failure");
        }
    }
}
