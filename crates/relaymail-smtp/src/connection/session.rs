//! Session controller.
//!
//! A [`Session`] drives one SMTP conversation from greeting to QUIT. Each
//! step checks that the steps it depends on have succeeded, and every
//! server refusal comes back as a typed error carrying the raw reply.
//!
//! ```text
//! connect ─→ greeting ─→ EHLO/HELO ─→ [STARTTLS ─→ EHLO] ─→ [AUTH]
//!                                                             │
//!                        QUIT ←── [RSET] ←── DATA ←── RCPT ←── MAIL
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::channel::Channel;
use super::config::{Config, Security};
use super::stream::{SmtpStream, TlsUpgrade, connect, connect_tls};
use crate::command::{Command, check_argument};
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::sasl::{self, AuthOutcome, CredentialEncoder};
use crate::types::{Address, CapabilitySet, Mechanism, Reply, ReplyCode};

/// Authentication state; only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authentication {
    /// No AUTH exchange has succeeded.
    #[default]
    Unauthenticated,
    /// The server accepted credentials.
    Authenticated,
}

/// Encryption state of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    /// Cleartext.
    #[default]
    Plain,
    /// TLS, either implicit or after STARTTLS.
    Encrypted,
}

/// Result of an accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Final reply after the DATA terminator.
    pub reply: Reply,
    /// Number of recipients the server accepted.
    pub recipients: usize,
}

/// One SMTP conversation over an exclusively owned stream.
#[derive(Debug)]
pub struct Session<S> {
    channel: Channel<S>,
    config: Config,
    greeting: Reply,
    capabilities: Option<CapabilitySet>,
    authentication: Authentication,
    encryption: Encryption,
    sensitive_issued: bool,
    transaction_open: bool,
}

impl Session<SmtpStream> {
    /// Dials the server per `config.security` and reads the greeting.
    ///
    /// # Errors
    ///
    /// Connection, TLS and greeting failures.
    pub async fn open(config: Config) -> Result<Self> {
        let stream = dial(&config).await?;
        let encrypted = stream.is_encrypted();

        let mut session = Self::connect(stream, config).await?;
        if encrypted {
            session.encryption = Encryption::Encrypted;
        }
        Ok(session)
    }

    /// Dials the server and brings the session to the point where it can
    /// authenticate or deliver.
    ///
    /// # Errors
    ///
    /// See [`Session::start`].
    pub async fn establish(config: Config) -> Result<Self> {
        let stream = dial(&config).await?;
        Self::start(stream, config).await
    }
}

async fn dial(config: &Config) -> Result<SmtpStream> {
    match config.security {
        Security::Implicit => connect_tls(&config.host, config.port, config.connect_timeout).await,
        Security::None | Security::StartTls => {
            connect(&config.host, config.port, config.connect_timeout).await
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + TlsUpgrade> Session<S> {
    /// Reads the greeting, negotiates, and upgrades with STARTTLS when the
    /// configuration asks for it.
    ///
    /// # Errors
    ///
    /// Greeting, negotiation and STARTTLS failures, including
    /// [`Error::NotSupported`] if STARTTLS is required but not advertised.
    pub async fn start(stream: S, config: Config) -> Result<Self> {
        let encrypted = stream.is_encrypted();
        let mut session = Self::connect(stream, config).await?;
        if encrypted {
            session.encryption = Encryption::Encrypted;
        }

        let extended = session.config.extended;
        session.negotiate(extended, None).await?;

        if session.config.security == Security::StartTls && !session.is_encrypted() {
            let host = session.config.host.clone();
            session = session.starttls(&host).await?;
            session.negotiate(extended, None).await?;
        }

        Ok(session)
    }

    /// Upgrades the connection to TLS.
    ///
    /// Consumes the session: on a refused or failed upgrade the connection
    /// is left in an unknown state and must be dropped. The capability set
    /// is discarded on success, so [`negotiate`](Self::negotiate) must run
    /// again.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] before negotiation, when already encrypted,
    ///   or after AUTH or MAIL was sent
    /// - [`Error::NotSupported`] if STARTTLS is not advertised
    /// - [`Error::TlsUpgradeRejected`] on a non-2xx reply
    pub async fn starttls(self, hostname: &str) -> Result<Self> {
        let caps = self.require_negotiated("STARTTLS")?;
        if self.encryption == Encryption::Encrypted {
            return Err(Error::InvalidState("Connection is already encrypted".into()));
        }
        if self.sensitive_issued {
            return Err(Error::InvalidState(
                "STARTTLS must precede AUTH and MAIL".into(),
            ));
        }
        if !caps.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let Self {
            mut channel,
            config,
            greeting,
            authentication,
            ..
        } = self;

        let reply = channel.command(&Command::StartTls).await?;
        if !reply.is_success() {
            return Err(Error::TlsUpgradeRejected(reply));
        }

        let channel = channel.upgrade(hostname).await?;
        tracing::debug!(hostname, "connection upgraded to TLS");

        Ok(Self {
            channel,
            config,
            greeting,
            capabilities: None,
            authentication,
            encryption: Encryption::Encrypted,
            sensitive_issued: false,
            transaction_open: false,
        })
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Wraps a connected stream and reads the server greeting.
    ///
    /// The stream is assumed to be cleartext.
    ///
    /// # Errors
    ///
    /// [`Error::GreetingRejected`] if the greeting is not 2xx, or a
    /// transport/protocol error.
    pub async fn connect(stream: S, config: Config) -> Result<Self> {
        let mut channel = Channel::new(stream, config.observer.clone(), config.io_timeout);
        let greeting = channel.read_reply().await?;

        if !greeting.is_success() {
            return Err(Error::GreetingRejected(greeting));
        }
        tracing::debug!(code = greeting.code.as_u16(), "greeting accepted");

        Ok(Self {
            channel,
            config,
            greeting,
            capabilities: None,
            authentication: Authentication::Unauthenticated,
            encryption: Encryption::Plain,
            sensitive_issued: false,
            transaction_open: false,
        })
    }

    /// Identifies the client with EHLO (`use_extended`) or HELO.
    ///
    /// `local_name` overrides the configured name. Any previous capability
    /// set is discarded first, so a failed negotiation leaves the session
    /// un-negotiated.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the name cannot be sent on one line
    /// - [`Error::NegotiationFailed`] if the reply is not 2xx
    pub async fn negotiate(
        &mut self,
        use_extended: bool,
        local_name: Option<&str>,
    ) -> Result<&CapabilitySet> {
        let hostname =
            local_name.map_or_else(|| self.config.resolved_local_name(), str::to_string);
        check_argument("hostname", &hostname)?;
        let command = if use_extended {
            Command::Ehlo { hostname }
        } else {
            Command::Helo { hostname }
        };

        self.capabilities = None;
        let reply = self.channel.command(&command).await?;
        if !reply.is_success() {
            return Err(Error::NegotiationFailed(reply));
        }

        let caps = if use_extended {
            CapabilitySet::from_ehlo(&reply)
        } else {
            CapabilitySet::from_helo(&reply)
        };
        tracing::debug!(capabilities = ?caps.tokens, "negotiated");
        Ok(self.capabilities.insert(caps))
    }

    /// Authenticates with one of the built-in mechanisms.
    ///
    /// # Errors
    ///
    /// See [`authenticate_with`](Self::authenticate_with).
    pub async fn authenticate(&mut self, mechanism: Mechanism, secret: &str) -> Result<AuthOutcome> {
        self.authenticate_with(mechanism.as_str(), mechanism.encoder(), secret)
            .await
    }

    /// Runs an AUTH exchange for `name` using `encoder` to build the response.
    ///
    /// A mechanism the server did not advertise is still attempted.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `name` is not a single token
    /// - [`Error::InvalidState`] before negotiation
    /// - [`Error::AlreadyAuthenticated`] after a successful exchange
    /// - transport, protocol and encoder errors
    pub async fn authenticate_with(
        &mut self,
        name: &str,
        encoder: &dyn CredentialEncoder,
        secret: &str,
    ) -> Result<AuthOutcome> {
        check_argument("mechanism", name)?;
        let advertised = self
            .require_negotiated("AUTH")?
            .auth_mechanisms()
            .iter()
            .any(|m| m.eq_ignore_ascii_case(name));
        if self.authentication == Authentication::Authenticated {
            return Err(Error::AlreadyAuthenticated);
        }
        if !advertised {
            tracing::warn!(mechanism = name, "mechanism not advertised by server");
        }

        self.sensitive_issued = true;
        let outcome = sasl::exchange(&mut self.channel, name, encoder, secret).await?;
        if outcome.is_authenticated() {
            self.authentication = Authentication::Authenticated;
        }
        Ok(outcome)
    }

    /// Delivers `envelope` to all of its recipients.
    ///
    /// # Errors
    ///
    /// See [`send_mail`](Self::send_mail).
    pub async fn deliver(&mut self, envelope: &Envelope) -> Result<Delivered> {
        let recipients = envelope.recipients();
        let message = envelope.serialize();
        self.send_mail(&envelope.sender.address, &recipients, &message)
            .await
    }

    /// Runs one mail transaction: MAIL, RCPT per recipient, DATA.
    ///
    /// `message` is the serialized message without the terminating dot.
    /// Lines may end in LF or CRLF; leading dots are doubled on the wire.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] before negotiation, or if a previous
    ///   transaction has not been cleared with [`reset`](Self::reset)
    /// - [`Error::NoRecipients`] and [`Error::MessageTooLarge`] before any
    ///   command is sent
    /// - [`Error::SenderRejected`], [`Error::RecipientRejected`],
    ///   [`Error::DataRejected`], [`Error::DeliveryRejected`]
    pub async fn send_mail(
        &mut self,
        from: &Address,
        recipients: &[&Address],
        message: &str,
    ) -> Result<Delivered> {
        let limit = self.require_negotiated("MAIL")?.max_message_size();
        if self.transaction_open {
            return Err(Error::InvalidState(
                "A mail transaction already ran; RSET before sending again".into(),
            ));
        }
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }
        if let Some(limit) = limit.filter(|&limit| message.len() > limit) {
            return Err(Error::MessageTooLarge {
                size: message.len(),
                limit,
            });
        }

        self.sensitive_issued = true;
        let reply = self
            .channel
            .command(&Command::MailFrom { from: from.clone() })
            .await?;
        if !reply.is_success() {
            return Err(Error::SenderRejected(reply));
        }
        self.transaction_open = true;

        for &to in recipients {
            let reply = self
                .channel
                .command(&Command::RcptTo { to: to.clone() })
                .await?;
            if !reply.is_success() {
                return Err(Error::RecipientRejected {
                    address: to.to_string(),
                    reply,
                });
            }
        }

        let reply = self.channel.command(&Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(Error::DataRejected(reply));
        }

        self.send_body(message).await?;

        let reply = self.channel.read_reply().await?;
        if !reply.is_success() {
            return Err(Error::DeliveryRejected(reply));
        }
        tracing::debug!(recipients = recipients.len(), "message accepted");

        Ok(Delivered {
            reply,
            recipients: recipients.len(),
        })
    }

    async fn send_body(&mut self, message: &str) -> Result<()> {
        let message = message
            .strip_suffix("\r\n")
            .or_else(|| message.strip_suffix('\n'))
            .unwrap_or(message);
        let pacing = self.config.pacing;

        for (index, line) in message.as_bytes().split(|&b| b == b'\n').enumerate() {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if index > 0 {
                pace(pacing).await;
            }

            if line.first() == Some(&b'.') {
                let mut stuffed = Vec::with_capacity(line.len() + 1);
                stuffed.push(b'.');
                stuffed.extend_from_slice(line);
                self.channel.send_body_line(&stuffed).await?;
            } else {
                self.channel.send_body_line(line).await?;
            }
        }

        pace(pacing).await;
        self.channel.send(".").await
    }

    /// Sends RSET, clearing any mail transaction.
    ///
    /// # Errors
    ///
    /// [`Error::CommandRejected`] if the reply is not 2xx.
    pub async fn reset(&mut self) -> Result<Reply> {
        let reply = self.channel.command(&Command::Rset).await?;
        if !reply.is_success() {
            return Err(Error::CommandRejected(reply));
        }
        self.transaction_open = false;
        Ok(reply)
    }

    /// Sends HELP, optionally for `topic`, and returns the reply as is.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `topic` is not a single token, and
    /// transport and protocol errors.
    pub async fn help(&mut self, topic: Option<&str>) -> Result<Reply> {
        if let Some(topic) = topic {
            check_argument("topic", topic)?;
        }
        self.channel
            .command(&Command::Help {
                topic: topic.map(str::to_string),
            })
            .await
    }

    /// Sends the bare `SIZE` probe and returns the reply as is.
    ///
    /// The advertised limit is available without a round trip through
    /// [`CapabilitySet::max_message_size`].
    ///
    /// # Errors
    ///
    /// Transport and protocol errors.
    pub async fn max_size(&mut self) -> Result<Reply> {
        self.channel.command(&Command::Size).await
    }

    /// Sends QUIT and closes the connection.
    ///
    /// # Errors
    ///
    /// [`Error::CommandRejected`] if the reply is not 2xx.
    pub async fn quit(mut self) -> Result<Reply> {
        let reply = self.channel.command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(Error::CommandRejected(reply));
        }

        let mut stream = self.channel.into_inner();
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(error = %e, "shutdown after QUIT failed");
        }
        Ok(reply)
    }

    fn require_negotiated(&self, step: &str) -> Result<&CapabilitySet> {
        self.capabilities
            .as_ref()
            .ok_or_else(|| Error::InvalidState(format!("{step} requires a successful EHLO/HELO")))
    }

    /// Returns the negotiated capability set.
    #[must_use]
    pub const fn capabilities(&self) -> Option<&CapabilitySet> {
        self.capabilities.as_ref()
    }

    /// Returns the server greeting.
    #[must_use]
    pub const fn greeting(&self) -> &Reply {
        &self.greeting
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the authentication state.
    #[must_use]
    pub const fn authentication(&self) -> Authentication {
        self.authentication
    }

    /// Returns the encryption state.
    #[must_use]
    pub const fn encryption(&self) -> Encryption {
        self.encryption
    }

    /// Returns true after a successful AUTH exchange.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authentication == Authentication::Authenticated
    }

    /// Returns true once the connection is encrypted.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.encryption == Encryption::Encrypted
    }

    /// Returns true once a fatal error has ended the session.
    ///
    /// Every later step fails with [`Error::InvalidState`]; only dropping
    /// the session is left.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.channel.is_aborted()
    }

    /// Returns the most recent server reply.
    #[must_use]
    pub const fn last_reply(&self) -> Option<&Reply> {
        self.channel.last_reply()
    }

    /// Returns the server's name from EHLO/HELO, else from the greeting.
    #[must_use]
    pub fn server_domain(&self) -> Option<&str> {
        self.capabilities
            .as_ref()
            .and_then(|caps| caps.domain.as_deref())
            .or_else(|| {
                self.greeting
                    .message
                    .first()
                    .and_then(|line| line.split_whitespace().next())
            })
    }
}

async fn pace(interval: Duration) {
    if !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
}
