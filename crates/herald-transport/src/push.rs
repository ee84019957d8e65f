//! Push transport (Server-Sent Events).
//!
//! The delivery task writes each event as one `data: <json>\n\n` chunk into
//! a small channel; the HTTP response body streams out of the other end.
//! When the client goes away the body is dropped, the channel closes and the
//! next write (at the latest the next heartbeat) fails.

use crate::delivery::{deliver, DeliveryConfig, DeliveryOutcome};
use crate::traits::{EventWriter, TransportError};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::Stream;
use herald_core::{ConnectionHandle, Event, Registry, RegistryError, TransportKind};
use herald_protocol::codec;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Chunks buffered between the delivery task and the response body.
const BODY_BUFFER: usize = 1;

/// Writes SSE-framed events into the response body channel.
pub struct SseWriter {
    tx: mpsc::Sender<Bytes>,
}

#[async_trait]
impl EventWriter for SseWriter {
    async fn write(&mut self, event: &Event) -> Result<(), TransportError> {
        let chunk = codec::encode_push(&event.to_push_frame())?;
        self.tx
            .send(Bytes::from(chunk))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn name(&self) -> &'static str {
        TransportKind::Push.as_str()
    }
}

/// Response body of a push subscription.
pub struct SseStream {
    rx: mpsc::Receiver<Bytes>,
}

impl Stream for SseStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}

impl IntoResponse for SseStream {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}

/// A registered push subscriber.
pub struct PushSubscription {
    /// The registered connection.
    pub connection: ConnectionHandle,
    /// Body to hand to the HTTP layer.
    pub stream: SseStream,
    /// The delivery task.
    pub task: JoinHandle<DeliveryOutcome>,
}

/// Register a push subscriber and start its delivery task.
///
/// # Errors
///
/// Returns an error if the registry is full.
pub fn subscribe(
    registry: &Arc<Registry>,
    config: DeliveryConfig,
) -> Result<PushSubscription, RegistryError> {
    let connection = registry.register(TransportKind::Push)?;
    let (tx, rx) = mpsc::channel(BODY_BUFFER);

    let task = tokio::spawn(deliver(
        Arc::clone(&connection),
        Arc::clone(registry),
        SseWriter { tx },
        config,
    ));

    debug!(connection = %connection.id(), "Push subscriber connected");

    Ok(PushSubscription {
        connection,
        stream: SseStream { rx },
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use herald_core::Broadcaster;
    use herald_protocol::{audio, EventType};

    async fn next_frame(stream: &mut SseStream) -> herald_protocol::PushFrame {
        let chunk = stream.next().await.unwrap().unwrap();
        let text = std::str::from_utf8(&chunk).unwrap();
        assert!(text.starts_with("data: "));
        assert!(text.ends_with("\n\n"));
        codec::decode_push(text).unwrap()
    }

    #[tokio::test]
    async fn test_push_stream_frames_events() {
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut sub = subscribe(&registry, DeliveryConfig::default()).unwrap();

        broadcaster.send_response("Robot initialized", None);
        broadcaster.send_response(
            "Hello! How can I help?",
            Some(Bytes::from_static(b"fake audio data")),
        );

        let first = next_frame(&mut sub.stream).await;
        assert_eq!(first.event_type, EventType::RobotResponse);
        assert_eq!(first.text.as_deref(), Some("Robot initialized"));
        assert!(!first.has_audio);

        let second = next_frame(&mut sub.stream).await;
        assert!(second.has_audio);
        let audio_bytes = audio::decode_data_uri(&second.audio_data.unwrap()).unwrap();
        assert_eq!(audio_bytes, b"fake audio data".to_vec());
    }

    #[tokio::test]
    async fn test_heartbeat_frame() {
        let registry = Arc::new(Registry::new());
        let mut sub = subscribe(&registry, DeliveryConfig::default()).unwrap();

        sub.connection
            .mailbox()
            .enqueue(Arc::new(Event::heartbeat()));

        let frame = next_frame(&mut sub.stream).await;
        assert_eq!(frame.event_type, EventType::Heartbeat);
        assert!(frame.text.is_none());
    }

    #[tokio::test]
    async fn test_dropped_body_unregisters_on_next_write() {
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let sub = subscribe(&registry, DeliveryConfig::default()).unwrap();
        let id = sub.connection.id();

        drop(sub.stream);
        broadcaster.send_response("anyone there?", None);

        assert_eq!(sub.task.await.unwrap(), DeliveryOutcome::WriteFailed);
        assert!(!registry.contains(id));
    }

    #[tokio::test]
    async fn test_three_subscribers_one_killed() {
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut s1 = subscribe(&registry, DeliveryConfig::default()).unwrap();
        let s2 = subscribe(&registry, DeliveryConfig::default()).unwrap();
        let mut s3 = subscribe(&registry, DeliveryConfig::default()).unwrap();

        assert_eq!(broadcaster.send_response("first", None), 3);

        // Subscriber 2 disconnects between the two publishes
        registry.unregister(s2.connection.id());
        drop(s2.stream);
        assert_eq!(s2.task.await.unwrap(), DeliveryOutcome::Closed);

        assert_eq!(broadcaster.send_response("second", None), 2);

        for stream in [&mut s1.stream, &mut s3.stream] {
            assert_eq!(next_frame(stream).await.text.as_deref(), Some("first"));
            assert_eq!(next_frame(stream).await.text.as_deref(), Some("second"));
        }
        assert_eq!(registry.len(), 2);
    }
}
