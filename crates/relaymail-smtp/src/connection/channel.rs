//! Line-framed transcript channel over a duplex stream.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};

use super::observer::{REDACTED, TranscriptObserver};
use super::stream::TlsUpgrade;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_line, parse_reply};
use crate::types::Reply;

/// Upper bound on a single reply line; RFC 5321 allows 512 octets.
const MAX_LINE_LENGTH: usize = 4096;

/// CRLF-framed, half-duplex channel to the server.
///
/// Owns the stream exclusively. Every line sent or received is reported to
/// the observer, and the most recent reply is kept for later inspection.
///
/// After a fatal error (see [`Error::is_fatal`]) the channel is aborted:
/// the stream may hold a half-read reply, so every later operation fails
/// with [`Error::InvalidState`] without touching it.
pub struct Channel<S> {
    reader: BufReader<S>,
    observer: Arc<dyn TranscriptObserver>,
    io_timeout: Duration,
    last_reply: Option<Reply>,
    aborted: bool,
}

impl<S> std::fmt::Debug for Channel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("io_timeout", &self.io_timeout)
            .field("last_reply", &self.last_reply)
            .field("aborted", &self.aborted)
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Channel<S> {
    /// Wraps a connected stream.
    pub fn new(stream: S, observer: Arc<dyn TranscriptObserver>, io_timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(stream),
            observer,
            io_timeout,
            last_reply: None,
            aborted: false,
        }
    }

    /// Returns the most recent reply read on this channel.
    #[must_use]
    pub const fn last_reply(&self) -> Option<&Reply> {
        self.last_reply.as_ref()
    }

    /// Returns true once a fatal error has ended the conversation.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.aborted {
            return Err(Error::InvalidState("session aborted after fatal error".into()));
        }
        Ok(())
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() && !self.aborted {
                tracing::warn!(error = %e, "aborting session");
                self.aborted = true;
            }
        }
        result
    }

    /// Writes `line` followed by CRLF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the write fails or times out.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        self.observer.on_send(line);
        self.write_line(line).await
    }

    /// Writes a credential line; observers only see a placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the write fails or times out.
    pub async fn send_sensitive(&mut self, line: &str) -> Result<()> {
        self.observer.on_send(REDACTED);
        self.write_line(line).await
    }

    /// Writes one DATA body line (already dot-stuffed).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the write fails or times out.
    pub async fn send_body_line(&mut self, line: &[u8]) -> Result<()> {
        self.observer.on_body_line(&String::from_utf8_lossy(line));
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line);
        data.extend_from_slice(b"\r\n");
        self.write_raw(&data).await
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.write_raw(&data).await
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        let writer = self.reader.get_mut();
        let result = with_timeout(self.io_timeout, async {
            writer.write_all(data).await?;
            writer.flush().await
        })
        .await;
        self.track(result)
    }

    /// Reads one line and strips its terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on I/O failure, timeout, or end of stream,
    /// and [`Error::Protocol`] if the line exceeds the length bound.
    pub async fn receive_line(&mut self) -> Result<String> {
        self.ensure_usable()?;
        let reader = &mut self.reader;
        let result =
            with_timeout(self.io_timeout, read_bounded_line(reader, MAX_LINE_LENGTH)).await;
        let mut buf = self.track(result)?;

        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }

        let line = String::from_utf8_lossy(&buf).into_owned();
        self.observer.on_receive(&line);
        Ok(line)
    }

    /// Reads a complete reply, following continuation lines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on I/O failure and [`Error::Protocol`]
    /// if a line is malformed.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        self.ensure_usable()?;
        let result = self.gather_reply().await;
        let reply = self.track(result)?;

        self.observer.on_reply(&reply);
        self.last_reply = Some(reply.clone());
        Ok(reply)
    }

    async fn gather_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = self.receive_line().await?;
            parse_line(&line)?;
            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }
        parse_reply(&lines)
    }

    /// Sends a command and reads its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails at the transport or protocol level.
    pub async fn command(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::debug!(verb = cmd.verb(), "sending command");
        self.send(&cmd.to_string()).await?;
        self.read_reply().await
    }

    /// Releases the underlying stream.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + TlsUpgrade> Channel<S> {
    /// Hands the stream to the TLS layer and rebuilds the channel on top.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the server pipelined data after its
    /// STARTTLS reply, or the handshake error.
    pub async fn upgrade(self, hostname: &str) -> Result<Self> {
        self.ensure_usable()?;
        if !self.reader.buffer().is_empty() {
            return Err(Error::Protocol(
                "Server sent data before the TLS handshake".into(),
            ));
        }

        let Self {
            reader,
            observer,
            io_timeout,
            last_reply,
            aborted,
        } = self;
        let stream = reader.into_inner().upgrade(hostname).await?;

        Ok(Self {
            reader: BufReader::new(stream),
            observer,
            io_timeout,
            last_reply,
            aborted,
        })
    }
}

/// Reads up to and including the next LF, failing once more than `limit`
/// bytes have arrived without one.
async fn read_bounded_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    limit: usize,
) -> Result<Vec<u8>> {
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            if line.is_empty() {
                return Err(Error::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }
            break;
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..=pos]);
            reader.consume(pos + 1);
            break;
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > limit {
            break;
        }
    }

    if line.len() > limit {
        return Err(Error::Protocol(format!("Reply line exceeds {limit} bytes")));
    }
    Ok(line)
}

/// Bounds an I/O future by `timeout`; zero means no bound.
async fn with_timeout<T, E>(
    timeout: Duration,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    Error: From<E>,
{
    if timeout.is_zero() {
        return Ok(fut.await?);
    }

    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Transport(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no response within {timeout:?}"),
        ))),
    }
}
