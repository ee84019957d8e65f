//! Bidirectional transport session.
//!
//! A session runs two activities for one connection: the delivery task
//! (mailbox to wire) and the read loop (wire to [`InboundHandler`]). When
//! either ends, the connection is unregistered, which stops the other.

use crate::delivery::{deliver, DeliveryConfig, DeliveryOutcome};
use crate::metrics;
use crate::traits::{EventWriter, FrameSource, InboundFrame, TransportError};
use async_trait::async_trait;
use herald_core::{ConnectionHandle, Event, Registry};
use herald_protocol::{codec, InboundMessage};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handles decoded inbound messages.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Handle one message from `conn`.
    ///
    /// A returned event is queued for `conn` only.
    async fn on_message(&self, conn: &ConnectionHandle, message: InboundMessage) -> Option<Event>;
}

/// Acknowledges every user message back to its sender.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl InboundHandler for EchoHandler {
    async fn on_message(&self, _conn: &ConnectionHandle, message: InboundMessage) -> Option<Event> {
        match message {
            InboundMessage::UserMessage { text } => {
                Some(Event::robot_response(format!("I received: {}", text), None))
            }
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Delivery settings for the write side.
    pub delivery: DeliveryConfig,
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryConfig::default(),
            max_message_size: codec::MAX_INBOUND_SIZE,
        }
    }
}

/// How the read side ended.
#[derive(Debug)]
pub enum ReadOutcome {
    /// The peer sent a close frame or ended the stream.
    ClientClosed,
    /// Reading failed.
    ReadFailed(TransportError),
    /// The connection was closed from the write side.
    Cancelled,
}

/// Result of a finished session.
#[derive(Debug)]
pub struct SessionOutcome {
    pub read: ReadOutcome,
    /// `None` if the delivery task panicked.
    pub delivery: Option<DeliveryOutcome>,
}

/// Run a bidirectional session for an already registered connection.
///
/// Returns once both activities have stopped and the connection is
/// unregistered.
pub async fn serve_bidirectional<W, S>(
    registry: Arc<Registry>,
    conn: ConnectionHandle,
    writer: W,
    source: S,
    handler: Arc<dyn InboundHandler>,
    config: SocketConfig,
) -> SessionOutcome
where
    W: EventWriter,
    S: FrameSource,
{
    debug!(connection = %conn.id(), "Bidirectional session started");

    let delivery = tokio::spawn(deliver(
        Arc::clone(&conn),
        Arc::clone(&registry),
        writer,
        config.delivery.clone(),
    ));

    let read = read_loop(&conn, source, handler.as_ref(), config.max_message_size).await;

    conn.begin_close();
    registry.unregister(conn.id());

    let delivery = match delivery.await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!(connection = %conn.id(), error = %e, "Delivery task failed");
            None
        }
    };

    debug!(connection = %conn.id(), read = ?read, delivery = ?delivery, "Bidirectional session finished");
    SessionOutcome { read, delivery }
}

async fn read_loop<S: FrameSource>(
    conn: &ConnectionHandle,
    mut source: S,
    handler: &dyn InboundHandler,
    max_message_size: usize,
) -> ReadOutcome {
    loop {
        let frame = tokio::select! {
            _ = conn.closed() => return ReadOutcome::Cancelled,
            frame = source.next_frame() => frame,
        };

        let text = match frame {
            Ok(Some(InboundFrame::Text(text))) => text,
            Ok(Some(InboundFrame::Binary(data))) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => {
                    warn!(connection = %conn.id(), "Discarding non-UTF-8 binary frame");
                    metrics::record_decode_failure();
                    continue;
                }
            },
            Ok(Some(InboundFrame::Close)) | Ok(None) => {
                debug!(connection = %conn.id(), "Client closed");
                return ReadOutcome::ClientClosed;
            }
            Err(e) => {
                warn!(connection = %conn.id(), error = %e, "Read failed");
                return ReadOutcome::ReadFailed(e);
            }
        };

        let message = match codec::decode_inbound_limited(&text, max_message_size) {
            Ok(message) => message,
            Err(e) => {
                warn!(connection = %conn.id(), error = %e, "Discarding malformed frame");
                metrics::record_decode_failure();
                continue;
            }
        };

        metrics::record_inbound();
        debug!(connection = %conn.id(), message = ?message, "Inbound message");

        if let Some(reply) = handler.on_message(conn, message).await {
            conn.mailbox().enqueue(Arc::new(reply));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{Broadcaster, ConnectionState, TransportKind};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    struct TestWriter {
        tx: mpsc::UnboundedSender<Event>,
    }

    #[async_trait]
    impl EventWriter for TestWriter {
        async fn write(&mut self, event: &Event) -> Result<(), TransportError> {
            self.tx
                .send(event.clone())
                .map_err(|_| TransportError::ConnectionClosed)
        }

        fn name(&self) -> &'static str {
            "test"
        }
    }

    struct StalledWriter;

    #[async_trait]
    impl EventWriter for StalledWriter {
        async fn write(&mut self, _event: &Event) -> Result<(), TransportError> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    struct TestSource {
        rx: mpsc::UnboundedReceiver<Result<InboundFrame, TransportError>>,
    }

    #[async_trait]
    impl FrameSource for TestSource {
        async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError> {
            match self.rx.recv().await {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        }
    }

    struct Session {
        registry: Arc<Registry>,
        conn: ConnectionHandle,
        inbound: mpsc::UnboundedSender<Result<InboundFrame, TransportError>>,
        outbound: mpsc::UnboundedReceiver<Event>,
        task: JoinHandle<SessionOutcome>,
    }

    fn start_session(registry: Arc<Registry>) -> Session {
        let conn = registry.register(TransportKind::Bidirectional).unwrap();
        let (out_tx, outbound) = mpsc::unbounded_channel();
        let (inbound, in_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(serve_bidirectional(
            Arc::clone(&registry),
            Arc::clone(&conn),
            TestWriter { tx: out_tx },
            TestSource { rx: in_rx },
            Arc::new(EchoHandler),
            SocketConfig::default(),
        ));

        Session {
            registry,
            conn,
            inbound,
            outbound,
            task,
        }
    }

    fn text(s: &str) -> Result<InboundFrame, TransportError> {
        Ok(InboundFrame::Text(s.to_string()))
    }

    #[tokio::test]
    async fn test_user_message_is_echoed() {
        let mut session = start_session(Arc::new(Registry::new()));

        session
            .inbound
            .send(text(r#"{"type":"user_message","text":"hello robot"}"#))
            .unwrap();

        let reply = session.outbound.recv().await.unwrap();
        assert_eq!(reply.text(), Some("I received: hello robot"));
        assert!(!reply.has_audio());
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection_open() {
        let mut session = start_session(Arc::new(Registry::new()));

        session.inbound.send(text("this is not json")).unwrap();
        session
            .inbound
            .send(text(r#"{"type":"unknown","text":"?"}"#))
            .unwrap();
        session
            .inbound
            .send(Ok(InboundFrame::Binary(vec![0xff, 0xfe])))
            .unwrap();
        session
            .inbound
            .send(text(r#"{"type":"user_message","text":"still here"}"#))
            .unwrap();

        let reply = session.outbound.recv().await.unwrap();
        assert_eq!(reply.text(), Some("I received: still here"));
        assert!(session.registry.contains(session.conn.id()));
        assert_eq!(session.conn.state(), ConnectionState::Active);
    }

    #[tokio::test]
    async fn test_close_frame_ends_session() {
        let session = start_session(Arc::new(Registry::new()));

        session.inbound.send(Ok(InboundFrame::Close)).unwrap();

        let outcome = session.task.await.unwrap();
        assert!(matches!(outcome.read, ReadOutcome::ClientClosed));
        assert_eq!(outcome.delivery, Some(DeliveryOutcome::Closed));
        assert!(session.registry.is_empty());
        assert_eq!(session.conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_read_failure_ends_session() {
        let session = start_session(Arc::new(Registry::new()));

        session
            .inbound
            .send(Err(TransportError::ReceiveFailed("reset by peer".into())))
            .unwrap();

        let outcome = session.task.await.unwrap();
        assert!(matches!(outcome.read, ReadOutcome::ReadFailed(_)));
        assert!(session.registry.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_stops_reader() {
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let session = start_session(Arc::clone(&registry));

        drop(session.outbound);
        broadcaster.send_response("nobody is reading", None);

        let outcome = session.task.await.unwrap();
        assert!(matches!(outcome.read, ReadOutcome::Cancelled));
        assert_eq!(outcome.delivery, Some(DeliveryOutcome::WriteFailed));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_socket_subscribers() {
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut a = start_session(Arc::clone(&registry));
        let mut b = start_session(Arc::clone(&registry));

        assert_eq!(broadcaster.send_response("Camera connected", None), 2);

        assert_eq!(a.outbound.recv().await.unwrap().text(), Some("Camera connected"));
        assert_eq!(b.outbound.recv().await.unwrap().text(), Some("Camera connected"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_close_ends_session_with_stalled_write() {
        let registry = Arc::new(Registry::new());
        let conn = registry.register(TransportKind::Bidirectional).unwrap();
        let (inbound, in_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(serve_bidirectional(
            Arc::clone(&registry),
            Arc::clone(&conn),
            StalledWriter,
            TestSource { rx: in_rx },
            Arc::new(EchoHandler),
            SocketConfig::default(),
        ));

        conn.mailbox()
            .enqueue(Arc::new(Event::robot_response("never written", None)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        inbound.send(Ok(InboundFrame::Close)).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(60), task)
            .await
            .expect("session still running after client close")
            .unwrap();
        assert!(matches!(outcome.read, ReadOutcome::ClientClosed));
        assert_eq!(outcome.delivery, Some(DeliveryOutcome::Closed));
        assert!(registry.is_empty());
    }
}
