//! WebSocket bindings for axum.
//!
//! Splits an upgraded socket into a writer for the delivery task and a
//! frame source for the read loop.

use crate::traits::{EventWriter, FrameSource, InboundFrame, TransportError};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use herald_core::{Event, TransportKind};
use herald_protocol::codec;
use tracing::trace;

/// Split an upgraded socket into its writer and source halves.
#[must_use]
pub fn split_socket(socket: WebSocket) -> (WsWriter, WsSource) {
    let (sink, stream) = socket.split();
    (WsWriter { sink }, WsSource { stream })
}

/// Writes events as JSON text messages.
///
/// Heartbeats have no JSON form on this transport and go out as Ping
/// control frames instead.
pub struct WsWriter {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl EventWriter for WsWriter {
    async fn write(&mut self, event: &Event) -> Result<(), TransportError> {
        let message = match event.to_socket_message() {
            Some(msg) => Message::Text(codec::encode_socket(&msg)?),
            None => Message::Ping(Vec::new()),
        };

        self.sink
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to close: {}", e)))
    }

    fn name(&self) -> &'static str {
        TransportKind::Bidirectional.as_str()
    }
}

/// Reads frames from the socket, skipping control frames.
pub struct WsSource {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(InboundFrame::Text(text))),
                Some(Ok(Message::Binary(data))) => return Ok(Some(InboundFrame::Binary(data))),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // axum answers pings itself
                    trace!("Control frame");
                }
                Some(Ok(Message::Close(_))) => return Ok(Some(InboundFrame::Close)),
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}
