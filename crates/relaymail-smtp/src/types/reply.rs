//! SMTP reply types.

use std::fmt;

/// SMTP reply from server.
///
/// Multi-line replies are folded into one value: `message` holds the text of
/// every line in order, without the code and separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns the coarse classification of the reply code.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.code.category()
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code.is_intermediate()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the text of the final line.
    #[must_use]
    pub fn last_line(&self) -> &str {
        self.message.last().map_or("", String::as_str)
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }
}

/// Renders the reply the way it appeared on the wire, one line per row.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            return write!(f, "{}", self.code);
        }
        let last = self.message.len() - 1;
        for (i, line) in self.message.iter().enumerate() {
            if i == last {
                write!(f, "{} {line}", self.code)?;
            } else {
                writeln!(f, "{}-{line}", self.code)?;
            }
        }
        Ok(())
    }
}

/// A single parsed reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// Reply code of this line.
    pub code: ReplyCode,
    /// True when the fourth column is a space, i.e. no more lines follow.
    pub last: bool,
    /// Text after the code and separator.
    pub text: String,
}

/// Coarse reply classification used to drive the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 2xx - the command completed.
    Success,
    /// 3xx - the server waits for more input (AUTH challenge, DATA).
    Intermediate,
    /// Anything else, 4xx and 5xx in practice.
    Failure,
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Classifies the code.
    #[must_use]
    pub const fn category(self) -> Category {
        match self.0 / 100 {
            2 => Category::Success,
            3 => Category::Intermediate,
            _ => Category::Failure,
        }
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Common reply codes
impl ReplyCode {
    /// 211 System status, or system help reply
    pub const SYSTEM_STATUS: Self = Self(211);
    /// 214 Help message
    pub const HELP: Self = Self(214);
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 Mailbox unavailable (busy)
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 451 Local error in processing
    pub const LOCAL_ERROR: Self = Self(451);
    /// 454 TLS not available due to temporary reason
    pub const TLS_UNAVAILABLE: Self = Self(454);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 503 Bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 504 Command parameter not implemented
    pub const PARAMETER_NOT_IMPLEMENTED: Self = Self(504);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 552 Exceeded storage allocation
    pub const EXCEEDED_STORAGE: Self = Self(552);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn categories() {
            assert_eq!(ReplyCode::OK.category(), Category::Success);
            assert_eq!(ReplyCode::AUTH_SUCCESS.category(), Category::Success);
            assert_eq!(ReplyCode::AUTH_CONTINUE.category(), Category::Intermediate);
            assert_eq!(ReplyCode::START_DATA.category(), Category::Intermediate);
            assert_eq!(ReplyCode::MAILBOX_BUSY.category(), Category::Failure);
            assert_eq!(ReplyCode::MAILBOX_UNAVAILABLE.category(), Category::Failure);
            assert_eq!(ReplyCode::new(199).category(), Category::Failure);
        }

        #[test]
        fn transient_and_permanent() {
            assert!(ReplyCode::TLS_UNAVAILABLE.is_transient());
            assert!(!ReplyCode::TLS_UNAVAILABLE.is_permanent());
            assert!(ReplyCode::AUTH_FAILED.is_permanent());
            assert!(ReplyCode::BAD_SEQUENCE.is_permanent());
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", ReplyCode::OK), "250");
            assert_eq!(format!("{}", ReplyCode::SYNTAX_ERROR), "500");
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn last_line() {
            let reply = Reply::new(
                ReplyCode::OK,
                vec!["mail.example.com".to_string(), "SIZE 1000".to_string()],
            );
            assert_eq!(reply.last_line(), "SIZE 1000");
            assert_eq!(Reply::new(ReplyCode::OK, vec![]).last_line(), "");
        }

        #[test]
        fn display_single_line() {
            let reply = Reply::new(ReplyCode::MAILBOX_UNAVAILABLE, vec!["Rejected".to_string()]);
            assert_eq!(reply.to_string(), "550 Rejected");
        }

        #[test]
        fn display_multi_line() {
            let reply = Reply::new(
                ReplyCode::OK,
                vec!["mail.example.com".to_string(), "STARTTLS".to_string()],
            );
            assert_eq!(reply.to_string(), "250-mail.example.com\n250 STARTTLS");
        }

        #[test]
        fn display_without_text() {
            assert_eq!(Reply::new(ReplyCode::OK, vec![]).to_string(), "250");
        }

        #[test]
        fn message_text_multiple_lines() {
            let reply = Reply::new(
                ReplyCode::SERVICE_READY,
                vec![
                    "smtp.example.com ESMTP".to_string(),
                    "Ready to serve".to_string(),
                ],
            );
            assert_eq!(
                reply.message_text(),
                "smtp.example.com ESMTP\nReady to serve"
            );
            assert!(reply.is_success());
            assert_eq!(reply.category(), Category::Success);
        }
    }
}
