//! `relaymail` - send one message through an SMTP relay.
//!
//! Relay settings come from the environment (or a `.env` file); the message
//! comes from the command line, with the body read from stdin when
//! `--body` is not given.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod send;

use std::collections::HashMap;
use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use relaymail_smtp::{LoggingObserver, TranscriptObserver};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Settings;
use send::Draft;

#[derive(Parser, Debug)]
#[command(name = "relaymail", version)]
#[command(about = "Send one message through an SMTP relay")]
struct Args {
    /// Sender address
    #[arg(long)]
    from: String,

    /// Sender display name
    #[arg(long)]
    from_name: Option<String>,

    /// Recipient address (repeatable)
    #[arg(long, required = true)]
    to: Vec<String>,

    /// Carbon-copy address (repeatable)
    #[arg(long)]
    cc: Vec<String>,

    /// Blind-carbon-copy address (repeatable)
    #[arg(long)]
    bcc: Vec<String>,

    /// Subject line
    #[arg(long, short, default_value = "")]
    subject: String,

    /// Extra header as `Name: value` (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Message body; read from stdin when omitted
    #[arg(long)]
    body: Option<String>,

    /// Relay host (overrides SMTP_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Relay port (overrides SMTP_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// none, starttls or tls (overrides SMTP_SECURITY)
    #[arg(long)]
    security: Option<String>,

    /// SASL mechanism (overrides SMTP_MECHANISM)
    #[arg(long, conflicts_with = "no_auth")]
    mechanism: Option<String>,

    /// Skip AUTH
    #[arg(long)]
    no_auth: bool,

    /// Greet with HELO instead of EHLO
    #[arg(long)]
    helo: bool,

    /// Log every line exchanged with the server
    #[arg(long)]
    transcript: bool,

    /// Debug logging
    #[arg(long, short)]
    verbose: bool,
}

impl Args {
    /// Command-line values that take precedence over the environment.
    fn env_overrides(&self) -> HashMap<&'static str, String> {
        let mut overrides = HashMap::new();
        if let Some(host) = &self.host {
            overrides.insert("SMTP_HOST", host.clone());
        }
        if let Some(port) = self.port {
            overrides.insert("SMTP_PORT", port.to_string());
        }
        if let Some(security) = &self.security {
            overrides.insert("SMTP_SECURITY", security.clone());
        }
        if self.no_auth {
            overrides.insert("SMTP_MECHANISM", "none".to_string());
        } else if let Some(mechanism) = &self.mechanism {
            overrides.insert("SMTP_MECHANISM", mechanism.clone());
        }
        overrides
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(format!("invalid header name {name:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let fallback = if args.verbose {
        "relaymail=debug,relaymail_smtp=debug"
    } else {
        "relaymail=info,relaymail_smtp=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let overrides = args.env_overrides();
    let settings =
        Settings::from_env(|key| overrides.get(key).cloned()).context("loading relay settings")?;

    let body = match args.body {
        Some(body) => body,
        None => {
            if io::stdin().is_terminal() {
                info!("reading message body from stdin; end with Ctrl-D");
            }
            io::read_to_string(io::stdin()).context("reading body from stdin")?
        }
    };

    let envelope = Draft {
        from: args.from,
        from_name: args.from_name,
        to: args.to,
        cc: args.cc,
        bcc: args.bcc,
        headers: args.headers,
        subject: args.subject,
        body,
    }
    .into_envelope()?;

    let observer: Option<Arc<dyn TranscriptObserver>> = if args.transcript {
        Some(Arc::new(LoggingObserver))
    } else {
        None
    };

    info!(host = %settings.host, port = settings.port, "sending");
    send::send(&settings, &envelope, !args.helo, observer).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("X-Mailer: relaymail").unwrap(),
            ("X-Mailer".to_string(), "relaymail".to_string())
        );
        assert_eq!(
            parse_header("Reply-To:bob@email.com").unwrap(),
            ("Reply-To".to_string(), "bob@email.com".to_string())
        );
        assert!(parse_header("no colon").is_err());
        assert!(parse_header(": value").is_err());
        assert!(parse_header("Bad Name: value").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "relaymail",
            "--from",
            "bob@email.com",
            "--to",
            "alice@email.com",
            "--to",
            "carol@email.com",
            "--header",
            "X-Mailer: relaymail",
            "--no-auth",
            "--helo",
        ])
        .unwrap();

        assert_eq!(args.to, vec!["alice@email.com", "carol@email.com"]);
        assert_eq!(args.headers.len(), 1);
        assert!(args.helo);
        assert_eq!(
            args.env_overrides().get("SMTP_MECHANISM").map(String::as_str),
            Some("none")
        );
    }

    #[test]
    fn test_args_require_recipient() {
        assert!(Args::try_parse_from(["relaymail", "--from", "bob@email.com"]).is_err());
    }

    #[test]
    fn test_no_auth_conflicts_with_mechanism() {
        let result = Args::try_parse_from([
            "relaymail",
            "--from",
            "bob@email.com",
            "--to",
            "alice@email.com",
            "--no-auth",
            "--mechanism",
            "PLAIN",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let args = Args::try_parse_from([
            "relaymail",
            "--from",
            "bob@email.com",
            "--to",
            "alice@email.com",
            "--host",
            "relay.local",
            "--port",
            "2525",
            "--mechanism",
            "PLAIN",
        ])
        .unwrap();
        let overrides = args.env_overrides();
        let env: HashMap<&str, &str> = [
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PASS", "s3cret"),
            ("SMTP_MECHANISM", "CRAM-MD5"),
        ]
        .into_iter()
        .collect();

        let settings = Settings::from_lookup(|key| {
            overrides
                .get(key)
                .cloned()
                .or_else(|| env.get(key).map(|v| (*v).to_string()))
        })
        .unwrap();

        assert_eq!(settings.host, "relay.local");
        assert_eq!(settings.port, 2525);
        assert_eq!(settings.mechanism, Some(relaymail_smtp::Mechanism::Plain));
    }
}
