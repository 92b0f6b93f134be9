//! Low-level SMTP stream handling.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

use crate::error::{Error, Result};

/// A transport that can be upgraded in place to TLS after `STARTTLS`.
pub trait TlsUpgrade: Sized {
    /// Performs the TLS handshake over the existing connection.
    fn upgrade(self, hostname: &str) -> impl Future<Output = Result<Self>> + Send;

    /// Returns true once the stream is encrypted.
    fn is_encrypted(&self) -> bool;
}

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-encrypted connection.
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl TlsUpgrade for SmtpStream {
    async fn upgrade(self, hostname: &str) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(stream) => stream,
            Self::Tls(_) => return Err(Error::InvalidState("Already using TLS".into())),
        };

        let tls_stream = handshake(tcp_stream, hostname).await?;
        Ok(Self::Tls(Box::new(tls_stream)))
    }

    fn is_encrypted(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or times out.
pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<SmtpStream> {
    let stream = tcp_connect(hostname, port, timeout).await?;
    Ok(SmtpStream::Tcp(stream))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16, timeout: Duration) -> Result<SmtpStream> {
    let tcp_stream = tcp_connect(hostname, port, timeout).await?;
    let tls_stream = handshake(tcp_stream, hostname).await?;
    Ok(SmtpStream::Tls(Box::new(tls_stream)))
}

async fn tcp_connect(hostname: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{hostname}:{port}");
    tracing::debug!(%addr, "connecting");
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(stream) => Ok(stream?),
        Err(_) => Err(Error::Transport(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connecting to {addr} timed out"),
        ))),
    }
}

async fn handshake(
    tcp_stream: TcpStream,
    hostname: &str,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let connector = create_tls_connector();
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

    Ok(connector.connect(server_name, tcp_stream).await?)
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_plain_stream_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 ready\r\n").await.unwrap();
            let mut buf = [0u8; 6];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut stream = connect("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!stream.is_encrypted());

        let mut greeting = [0u8; 11];
        stream.read_exact(&mut greeting).await.unwrap();
        assert_eq!(&greeting, b"220 ready\r\n");

        stream.write_all(b"QUIT\r\n").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"QUIT\r\n");
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
