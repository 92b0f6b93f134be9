//! Outgoing message envelope and its RFC 5322 serialization.

use chrono::{DateTime, FixedOffset, Local};

use crate::types::{Address, Mailbox};

/// Date header format (RFC 2822), e.g. `Mon, 2 Jan 2006 15:04:05 -0700`.
const DATE_FORMAT: &str = "%a, %-d %b %Y %H:%M:%S %z";

/// An email to deliver: sender, recipients, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sender mailbox; its address is used for `MAIL FROM`.
    pub sender: Mailbox,
    /// To recipients.
    pub to: Vec<Mailbox>,
    /// Cc recipients.
    pub cc: Vec<Mailbox>,
    /// Bcc recipients.
    pub bcc: Vec<Mailbox>,
    /// Additional headers, in insertion order.
    pub headers: Vec<(String, String)>,
    /// Subject line.
    pub subject: String,
    /// Body text; lines may end in LF or CRLF.
    pub body: String,
    /// Fixed `Date` header; the time of serialization when `None`.
    pub date: Option<DateTime<FixedOffset>>,
}

impl Envelope {
    /// Creates an empty envelope from `sender`.
    #[must_use]
    pub const fn new(sender: Mailbox) -> Self {
        Self {
            sender,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            headers: Vec::new(),
            subject: String::new(),
            body: String::new(),
            date: None,
        }
    }

    /// Adds a To recipient.
    #[must_use]
    pub fn to(mut self, recipient: Mailbox) -> Self {
        self.to.push(recipient);
        self
    }

    /// Adds a Cc recipient.
    #[must_use]
    pub fn cc(mut self, recipient: Mailbox) -> Self {
        self.cc.push(recipient);
        self
    }

    /// Adds a Bcc recipient.
    #[must_use]
    pub fn bcc(mut self, recipient: Mailbox) -> Self {
        self.bcc.push(recipient);
        self
    }

    /// Adds a header, written after the recipient headers.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Fixes the `Date` header.
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Returns every envelope recipient: To, then Cc, then Bcc.
    #[must_use]
    pub fn recipients(&self) -> Vec<&Address> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(|mailbox| &mailbox.address)
            .collect()
    }

    /// Serializes the message, dated now unless a date was fixed.
    #[must_use]
    pub fn serialize(&self) -> String {
        let date = self.date.unwrap_or_else(|| Local::now().fixed_offset());
        self.serialize_at(&date)
    }

    /// Serializes the message with `date` as the `Date` header.
    ///
    /// Header order: From, To, Cc, Bcc, additional headers, Date, Subject,
    /// then a blank line and the body. Lines are CRLF-separated; the DATA
    /// terminator is not included.
    #[must_use]
    pub fn serialize_at(&self, date: &DateTime<FixedOffset>) -> String {
        let mut lines = vec![format!("From: {}", self.sender)];

        for (name, list) in [("To", &self.to), ("Cc", &self.cc), ("Bcc", &self.bcc)] {
            if !list.is_empty() {
                lines.push(format!("{name}: {}", join_mailboxes(list)));
            }
        }

        for (key, value) in &self.headers {
            lines.push(format!("{}: {}", single_line(key), single_line(value)));
        }

        lines.push(format!("Date: {}", date.format(DATE_FORMAT)));
        lines.push(format!("Subject: {}", single_line(&self.subject)));
        lines.push(String::new());
        lines.push(self.body.clone());

        lines.join("\r\n")
    }
}

fn join_mailboxes(list: &[Mailbox]) -> String {
    list.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Header values must not smuggle in extra header lines.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2006, 1, 2, 15, 4, 5)
            .unwrap()
    }

    fn bob() -> Mailbox {
        Mailbox::with_name("Bob", "bob@email.com").unwrap()
    }

    #[test]
    fn test_serialize_minimal() {
        let envelope = Envelope::new(bob())
            .to(Mailbox::with_name("Alice", "alice@email.com").unwrap())
            .subject("This is a test")
            .body("Hello Alice.\r\nYour friend,\r\nBob");

        assert_eq!(
            envelope.serialize_at(&date()),
            "From: \"Bob\" <bob@email.com>\r\n\
             To: \"Alice\" <alice@email.com>\r\n\
             Date: Mon, 2 Jan 2006 15:04:05 -0700\r\n\
             Subject: This is a test\r\n\
             \r\n\
             Hello Alice.\r\nYour friend,\r\nBob"
        );
    }

    #[test]
    fn test_serialize_all_headers() {
        let envelope = Envelope::new(Mailbox::new("bob@email.com").unwrap())
            .to(Mailbox::new("alice@email.com").unwrap())
            .to(Mailbox::with_name("Carol", "carol@email.com").unwrap())
            .cc(Mailbox::new("dave@email.com").unwrap())
            .bcc(Mailbox::new("eve@email.com").unwrap())
            .header("X-Mailer", "relaymail")
            .header("Reply-To", "bob@email.com");

        let text = envelope.serialize_at(&date());
        let headers: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(
            headers,
            vec![
                "From: <bob@email.com>",
                "To: <alice@email.com>, \"Carol\" <carol@email.com>",
                "Cc: <dave@email.com>",
                "Bcc: <eve@email.com>",
                "X-Mailer: relaymail",
                "Reply-To: bob@email.com",
                "Date: Mon, 2 Jan 2006 15:04:05 -0700",
                "Subject: ",
                "",
                "",
            ]
        );
    }

    #[test]
    fn test_header_injection_is_flattened() {
        let envelope = Envelope::new(bob())
            .subject("hi\r\nBcc: victim@example.com")
            .header("X-Note", "a\nb");
        let text = envelope.serialize_at(&date());
        assert!(text.contains("Subject: hi  Bcc: victim@example.com\r\n"));
        assert!(text.contains("X-Note: a b\r\n"));
    }

    #[test]
    fn test_recipients_order() {
        let envelope = Envelope::new(bob())
            .bcc(Mailbox::new("c@example.com").unwrap())
            .cc(Mailbox::new("b@example.com").unwrap())
            .to(Mailbox::new("a@example.com").unwrap());

        let recipients: Vec<&str> = envelope.recipients().iter().map(|a| a.as_str()).collect();
        assert_eq!(recipients, vec!["a@example.com", "b@example.com", "c@example.com"]);
    }

    #[test]
    fn test_serialize_uses_current_date() {
        let envelope = Envelope::new(bob());
        assert!(envelope.serialize().contains("\r\nDate: "));
    }

    #[test]
    fn test_serialize_uses_fixed_date() {
        let envelope = Envelope::new(bob()).date(date());
        assert!(
            envelope
                .serialize()
                .contains("\r\nDate: Mon, 2 Jan 2006 15:04:05 -0700\r\n")
        );
    }
}
