//! Frame types for the Herald wire protocol.
//!
//! Every frame is a JSON object discriminated by its `"type"` field. Field
//! names are camelCase on the wire to match browser clients.

use serde::{Deserialize, Serialize};

/// Kind of event carried by a push frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A response produced by the robot.
    RobotResponse,
    /// Keep-alive with no content.
    Heartbeat,
}

impl EventType {
    /// Wire name of this event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RobotResponse => "robot_response",
            EventType::Heartbeat => "heartbeat",
        }
    }
}

/// A frame on the push (Server-Sent Events) transport.
///
/// Serialized as
/// `{"type":..,"text":..,"timestamp":..,"hasAudio":..,"audioData":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushFrame {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Response text, absent for heartbeats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Creation time in seconds since the Unix epoch.
    pub timestamp: f64,
    /// Whether `audio_data` carries a payload.
    pub has_audio: bool,
    /// Audio as a `data:audio/wav;base64,` URI, `null` when absent.
    #[serde(default)]
    pub audio_data: Option<String>,
}

impl PushFrame {
    /// Create a robot response frame.
    #[must_use]
    pub fn robot_response(
        text: impl Into<String>,
        timestamp: f64,
        audio_data: Option<String>,
    ) -> Self {
        Self {
            event_type: EventType::RobotResponse,
            text: Some(text.into()),
            timestamp,
            has_audio: audio_data.is_some(),
            audio_data,
        }
    }

    /// Create a heartbeat frame.
    #[must_use]
    pub fn heartbeat(timestamp: f64) -> Self {
        Self {
            event_type: EventType::Heartbeat,
            text: None,
            timestamp,
            has_audio: false,
            audio_data: None,
        }
    }
}

/// A server-to-client message on the WebSocket transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// A response produced by the robot.
    #[serde(rename = "robot_response", rename_all = "camelCase")]
    RobotResponse {
        /// Response text.
        text: String,
        /// Whether `audio_data` carries a payload.
        has_audio: bool,
        /// Audio as a data URI, `null` when absent.
        audio_data: Option<String>,
    },
}

impl OutboundMessage {
    /// Create a robot response message.
    #[must_use]
    pub fn robot_response(text: impl Into<String>, audio_data: Option<String>) -> Self {
        OutboundMessage::RobotResponse {
            text: text.into(),
            has_audio: audio_data.is_some(),
            audio_data,
        }
    }
}

/// A client-to-server message on the WebSocket transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Text typed or spoken by the user.
    #[serde(rename = "user_message")]
    UserMessage {
        /// Message text.
        text: String,
    },
}
