//! Outbound event types.
//!
//! Events are created once by a producer and shared between mailboxes
//! behind an `Arc`, so fan-out never copies text or audio.

use bytes::Bytes;
use herald_protocol::{audio, OutboundMessage, PushFrame};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique event identifier.
pub type EventId = u64;

static EVENT_COUNTER: AtomicU64 = AtomicU64::new(1);

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A response produced by the robot control loop.
    RobotResponse,
    /// Content-free keep-alive.
    Heartbeat,
}

/// An immutable outbound notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    id: EventId,
    kind: EventKind,
    text: Option<String>,
    audio: Option<Bytes>,
    timestamp: u64,
}

impl Event {
    /// Create a robot response event.
    ///
    /// An empty audio payload is treated as no audio.
    #[must_use]
    pub fn robot_response(text: impl Into<String>, audio: Option<Bytes>) -> Self {
        Self {
            id: EVENT_COUNTER.fetch_add(1, Ordering::Relaxed),
            kind: EventKind::RobotResponse,
            text: Some(text.into()),
            audio: audio.filter(|a| !a.is_empty()),
            timestamp: now_millis(),
        }
    }

    /// Create a heartbeat event.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self {
            id: EVENT_COUNTER.fetch_add(1, Ordering::Relaxed),
            kind: EventKind::Heartbeat,
            text: None,
            audio: None,
            timestamp: now_millis(),
        }
    }

    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.kind == EventKind::Heartbeat
    }

    /// Response text, `None` for heartbeats.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Raw audio bytes, if any.
    #[must_use]
    pub fn audio(&self) -> Option<&Bytes> {
        self.audio.as_ref()
    }

    /// Creation time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Creation time in fractional seconds, as carried on the wire.
    #[must_use]
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp as f64 / 1000.0
    }

    /// Convert to a push (SSE) frame.
    #[must_use]
    pub fn to_push_frame(&self) -> PushFrame {
        match self.kind {
            EventKind::Heartbeat => PushFrame::heartbeat(self.timestamp_secs()),
            EventKind::RobotResponse => PushFrame::robot_response(
                self.text.clone().unwrap_or_default(),
                self.timestamp_secs(),
                self.audio_data_uri(),
            ),
        }
    }

    /// Convert to a WebSocket message.
    ///
    /// Heartbeats have no JSON representation on the socket transport.
    #[must_use]
    pub fn to_socket_message(&self) -> Option<OutboundMessage> {
        match self.kind {
            EventKind::Heartbeat => None,
            EventKind::RobotResponse => Some(OutboundMessage::robot_response(
                self.text.clone().unwrap_or_default(),
                self.audio_data_uri(),
            )),
        }
    }

    fn audio_data_uri(&self) -> Option<String> {
        self.audio.as_deref().map(audio::encode_data_uri)
    }
}
