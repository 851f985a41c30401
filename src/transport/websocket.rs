//! WebSocket transport over `tokio-tungstenite`.
//!
//! [`WsTransport`] adapts an established [`WebSocketStream`] (server side after
//! `accept_async`, or client side after `connect_async`) to the [`Transport`]
//! contract.
//!
//! # Message Handling
//!
//! | Incoming frame | Result |
//! |----------------|--------|
//! | Text / Binary | Payload bytes |
//! | Ping / Pong / raw frame | Skipped |
//! | Close / end of stream | Transport error |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, duration_ms};
use crate::signal::CloseSignal;

use super::{MessageKind, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Default bound on sending the Close frame during `close`.
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// WsTransport
// ============================================================================

/// WebSocket adapter.
///
/// The stream is split into independent halves, each behind its own lock.
/// Under [`Connection`](crate::Connection) each lock has a single user (one
/// pump per direction), so they are never contended.
pub struct WsTransport<S> {
    /// Write half.
    sink: AsyncMutex<SplitSink<WebSocketStream<S>, Message>>,
    /// Read half.
    stream: AsyncMutex<SplitStream<WebSocketStream<S>>>,
    /// Local shutdown; aborts in-flight reads and writes.
    shutdown: CloseSignal,
    /// Bound on sending the Close frame.
    close_timeout: Duration,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an established WebSocket stream.
    #[must_use]
    pub fn new(ws_stream: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            sink: AsyncMutex::new(sink),
            stream: AsyncMutex::new(stream),
            shutdown: CloseSignal::new(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Sets how long `close` may spend sending the Close frame.
    #[inline]
    #[must_use]
    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    /// Builds the outgoing frame for `kind`.
    ///
    /// Text payloads that are not valid UTF-8 go out as binary frames.
    fn encode(kind: MessageKind, data: Vec<u8>) -> Message {
        match kind {
            MessageKind::Binary => Message::binary(data),
            MessageKind::Text => match String::from_utf8(data) {
                Ok(text) => Message::text(text),
                Err(e) => {
                    warn!(error = %e, "Text payload is not UTF-8, sending as binary");
                    Message::binary(e.into_bytes())
                }
            },
        }
    }
}

#[async_trait]
impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_message(&self) -> Result<Vec<u8>> {
        if self.shutdown.is_fired() {
            return Err(Error::transport("transport is closed"));
        }

        let mut stream = self.stream.lock().await;

        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.wait() => {
                    return Err(Error::transport("transport is closed"));
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().as_bytes().to_vec()),

                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),

                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return Err(Error::transport("closed by remote"));
                }

                Some(Err(e)) => return Err(e.into()),

                None => return Err(Error::transport("stream ended")),

                // Ping, Pong, raw frames
                Some(Ok(other)) => {
                    trace!(len = other.len(), "Skipping control frame");
                }
            }
        }
    }

    async fn write_message(&self, kind: MessageKind, data: Vec<u8>) -> Result<()> {
        if self.shutdown.is_fired() {
            return Err(Error::transport("transport is closed"));
        }

        let message = Self::encode(kind, data);
        let mut sink = self.sink.lock().await;

        tokio::select! {
            biased;
            () = self.shutdown.wait() => Err(Error::transport("transport is closed")),
            sent = sink.send(message) => sent.map_err(Error::from),
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.shutdown.fire() {
            return Ok(());
        }

        // The writer releases the sink as soon as it observes the shutdown.
        let send_close = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };

        match timeout(self.close_timeout, send_close).await {
            Ok(Ok(())) | Ok(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                debug!(
                    timeout_ms = duration_ms(self.close_timeout),
                    "Timed out sending Close frame"
                );
                Ok(())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Instant;

    use tokio::io::{DuplexStream, duplex};
    use tokio_tungstenite::tungstenite::protocol::Role;
    use tokio_test::{assert_err, assert_ok};

    use crate::connection::Connection;
    use crate::error::Error;

    const WAIT: Duration = Duration::from_secs(2);

    async fn ws_pair() -> (WsTransport<DuplexStream>, WsTransport<DuplexStream>) {
        let (server_io, client_io) = duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (WsTransport::new(server), WsTransport::new(client))
    }

    #[test]
    fn test_encode_text() {
        let message = WsTransport::<DuplexStream>::encode(MessageKind::Text, b"hi".to_vec());
        assert!(message.is_text());
    }

    #[test]
    fn test_encode_invalid_utf8_falls_back_to_binary() {
        let message =
            WsTransport::<DuplexStream>::encode(MessageKind::Text, vec![0xff, 0xfe, 0x00]);
        assert!(message.is_binary());
    }

    #[tokio::test]
    async fn test_text_and_binary_roundtrip() {
        let (server, client) = ws_pair().await;

        assert_ok!(client.write_message(MessageKind::Text, b"hello".to_vec()).await);
        assert_ok!(client.write_message(MessageKind::Binary, vec![1, 2, 3]).await);

        assert_eq!(assert_ok!(server.read_message().await), b"hello");
        assert_eq!(assert_ok!(server.read_message().await), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_remote_close_is_read_error() {
        let (server, client) = ws_pair().await;

        assert_ok!(client.close().await);

        let err = assert_err!(server.read_message().await);
        assert!(err.is_transport_error());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (server, _client) = ws_pair().await;

        assert_ok!(server.close().await);
        assert_ok!(server.close().await);
        assert_err!(server.read_message().await);
        assert_err!(server.write_message(MessageKind::Text, b"late".to_vec()).await);
    }

    #[tokio::test]
    async fn test_control_frames_are_skipped() {
        let (server_io, client_io) = duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let mut client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WsTransport::new(server);

        assert_ok!(client.send(Message::Ping(vec![1, 2, 3].into())).await);
        assert_ok!(client.send(Message::Pong(Vec::<u8>::new().into())).await);
        assert_ok!(client.send(Message::text("after ping")).await);

        let data = assert_ok!(timeout(WAIT, server.read_message()).await.expect("read"));
        assert_eq!(data, b"after ping");
    }

    #[tokio::test]
    async fn test_close_bounded_when_peer_stops_reading() {
        // Small buffer and a peer that never reads: the write and the Close
        // frame can never be flushed.
        let (server_io, _client_io) = duplex(256);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let server = Arc::new(
            WsTransport::new(server).with_close_timeout(Duration::from_millis(300)),
        );

        let writer = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .write_message(MessageKind::Binary, vec![0u8; 4096])
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!writer.is_finished(), "write should stall on a full buffer");

        let started = Instant::now();
        assert_ok!(timeout(WAIT, server.close()).await.expect("close should be bounded"));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(250), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "took too long: {elapsed:?}");

        let written = timeout(WAIT, writer)
            .await
            .expect("writer should unblock")
            .expect("writer should not panic");
        assert!(assert_err!(written).is_transport_error());
    }

    #[tokio::test]
    async fn test_connection_lifecycle_over_websocket() {
        let (server, client) = ws_pair().await;
        let server = assert_ok!(Connection::new(server));
        let client = assert_ok!(Connection::new(client));

        assert_ok!(client.write_message("ping").await);
        assert_eq!(
            assert_ok!(timeout(WAIT, server.read_message()).await.expect("read")),
            b"ping"
        );

        assert_ok!(server.write_message("pong").await);
        assert_eq!(
            assert_ok!(timeout(WAIT, client.read_message()).await.expect("read")),
            b"pong"
        );

        // The server's inbound pump is parked in a transport read; the
        // client's Close frame must end it and tear the server down.
        timeout(WAIT, client.close()).await.expect("client close");
        timeout(WAIT, server.closed())
            .await
            .expect("server should observe the close");

        assert!(matches!(server.read_message().await, Err(Error::ConnectionClosed)));
        assert!(matches!(server.write_message("late").await, Err(Error::ConnectionClosed)));
        assert!(matches!(client.read_message().await, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_local_close_interrupts_pending_read() {
        let (server, _client) = ws_pair().await;
        let server = assert_ok!(Connection::new(server));

        let reader = {
            let server = server.clone();
            tokio::spawn(async move { server.read_message().await })
        };
        tokio::task::yield_now().await;

        timeout(WAIT, server.close()).await.expect("close");

        let result = timeout(WAIT, reader)
            .await
            .expect("reader should unblock")
            .expect("reader should not panic");
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }
}
