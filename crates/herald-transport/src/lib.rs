//! # herald-transport
//!
//! Delivery and transport adapters for the Herald event-distribution server.
//!
//! Each connection gets its own delivery task that drains the connection's
//! mailbox and writes to the wire through an [`EventWriter`]:
//!
//! - **Push** ([`push`]) - Server-Sent Events, write-only
//! - **Bidirectional** ([`socket`]) - WebSocket, with a read-and-decode loop
//!   dispatching inbound messages to an [`InboundHandler`]
//!
//! ```rust,ignore
//! use herald_transport::push;
//!
//! async fn events(registry: Arc<Registry>) -> impl IntoResponse {
//!     match push::subscribe(&registry, DeliveryConfig::default()) {
//!         Ok(sub) => sub.stream.into_response(),
//!         Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
//!     }
//! }
//! ```

pub mod delivery;
pub mod metrics;
pub mod push;
pub mod socket;
pub mod traits;
pub mod websocket;

pub use delivery::{deliver, DeliveryConfig, DeliveryOutcome};
pub use push::{subscribe, PushSubscription, SseStream, SseWriter};
pub use socket::{
    serve_bidirectional, EchoHandler, InboundHandler, ReadOutcome, SessionOutcome, SocketConfig,
};
pub use traits::{EventWriter, FrameSource, InboundFrame, TransportError};
pub use websocket::{split_socket, WsSource, WsWriter};
