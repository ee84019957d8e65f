//! Transport abstraction traits for Herald.
//!
//! Adapters are written against these traits so the delivery and read loops
//! do not depend on a particular HTTP stack.

use async_trait::async_trait;
use herald_core::Event;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed by the peer.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] herald_protocol::ProtocolError),
}

/// Writes events to one subscriber.
///
/// Each writer is owned by exactly one delivery task.
#[async_trait]
pub trait EventWriter: Send + 'static {
    /// Serialize and write one event.
    async fn write(&mut self, event: &Event) -> Result<(), TransportError>;

    /// Release the transport. Called once, when delivery ends.
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Whether the peer is still reachable, as far as the writer can tell
    /// without writing.
    fn is_open(&self) -> bool {
        true
    }

    /// Transport name (e.g. "sse", "websocket").
    fn name(&self) -> &'static str;
}

/// An inbound frame, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A text message.
    Text(String),
    /// A binary message.
    Binary(Vec<u8>),
    /// The peer sent a close frame.
    Close,
}

/// Reads frames from one subscriber.
#[async_trait]
pub trait FrameSource: Send {
    /// Receive the next frame.
    ///
    /// Returns `None` if the stream ended without a close frame.
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError>;
}
