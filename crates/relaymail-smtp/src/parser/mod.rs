//! SMTP response parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode, ReplyLine};

/// Parses one reply line (without its CRLF).
///
/// The first three characters are the code; the fourth is a space on the
/// last line of a reply and a hyphen on every other line:
/// - `250-SIZE 10000000` → code 250, more lines follow
/// - `250 HELP` → code 250, last line
///
/// # Errors
///
/// Returns [`Error::Protocol`] for lines shorter than four characters, a
/// non-numeric code, or any other separator.
pub fn parse_line(line: &str) -> Result<ReplyLine> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 {
        return Err(Error::Protocol(format!("Reply too short: {line:?}")));
    }

    if !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::Protocol(format!("Invalid reply code: {line:?}")));
    }

    let last = match bytes[3] {
        b' ' => true,
        b'-' => false,
        _ => return Err(Error::Protocol(format!("Malformed reply line: {line:?}"))),
    };

    let code = u16::from(bytes[0] - b'0') * 100
        + u16::from(bytes[1] - b'0') * 10
        + u16::from(bytes[2] - b'0');

    Ok(ReplyLine {
        code: ReplyCode::new(code),
        last,
        text: line[4..].to_string(),
    })
}

/// Parses an SMTP reply from response lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// # Errors
///
/// Returns an error if the reply is empty, a line is malformed, or the lines
/// disagree on the code.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };

    let code = parse_line(first)?.code;
    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        let parsed = parse_line(line)?;
        if parsed.code != code {
            return Err(Error::Protocol(format!(
                "Reply code changed from {code} to {} mid-reply",
                parsed.code
            )));
        }
        message.push(parsed.text);
    }

    Ok(Reply::new(code, message))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the last line.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() >= 4 && line.as_bytes()[3] == b' '
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Category;
    use proptest::prelude::*;

    #[test]
    fn test_parse_line_continuation() {
        let line = parse_line("250-SIZE 10000000").unwrap();
        assert_eq!(line.code.as_u16(), 250);
        assert!(!line.last);
        assert_eq!(line.text, "SIZE 10000000");
    }

    #[test]
    fn test_parse_line_final() {
        let line = parse_line("250 HELP").unwrap();
        assert_eq!(line.code.as_u16(), 250);
        assert!(line.last);
        assert_eq!(line.text, "HELP");
    }

    #[test]
    fn test_parse_line_code_only() {
        let line = parse_line("354 ").unwrap();
        assert_eq!(line.code.category(), Category::Intermediate);
        assert_eq!(line.text, "");
    }

    #[test]
    fn test_parse_line_too_short() {
        assert!(matches!(parse_line("250"), Err(Error::Protocol(_))));
        assert!(matches!(parse_line(""), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_line_bad_separator() {
        assert!(matches!(parse_line("250+OK"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_line_invalid_code() {
        assert!(matches!(parse_line("ABC OK"), Err(Error::Protocol(_))));
        assert!(matches!(parse_line("2é0 OK"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_single_line_reply() {
        let lines = vec!["250 OK".to_string()];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let lines = vec![
            "250-First line".to_string(),
            "250-Second line".to_string(),
            "250 Last line".to_string(),
        ];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(
            reply.message,
            vec!["First line", "Second line", "Last line"]
        );
    }

    #[test]
    fn test_parse_reply_mixed_codes() {
        let lines = vec!["250-First".to_string(), "550 Second".to_string()];
        assert!(matches!(parse_reply(&lines), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_error_empty() {
        assert!(parse_reply(&[]).is_err());
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(!is_last_reply_line("250-Continuing"));
        assert!(!is_last_reply_line("250"));
    }

    proptest! {
        #[test]
        fn parse_line_never_panics(line in "\\PC*") {
            let _ = parse_line(&line);
        }

        #[test]
        fn parse_line_recovers_code_and_finality(
            code in 200u16..600,
            last in any::<bool>(),
            text in "[ -~]{0,40}",
        ) {
            let sep = if last { ' ' } else { '-' };
            let parsed = parse_line(&format!("{code}{sep}{text}")).unwrap();
            prop_assert_eq!(parsed.code.as_u16(), code);
            prop_assert_eq!(parsed.last, last);
            prop_assert_eq!(parsed.text, text);
        }
    }
}
