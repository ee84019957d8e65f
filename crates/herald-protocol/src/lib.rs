//! # herald-protocol
//!
//! Wire formats for the Herald event-distribution server.
//!
//! Two transports carry the same events:
//!
//! - **Push** (Server-Sent Events) - one JSON object per `data:` frame
//! - **Socket** (WebSocket) - one JSON object per text message, in both directions
//!
//! Audio payloads travel as `data:audio/wav;base64,...` URIs.
//!
//! ## Example
//!
//! ```rust
//! use herald_protocol::{codec, PushFrame};
//!
//! let frame = PushFrame::robot_response("Robot initialized", 1_700_000_000.0, None);
//! let wire = codec::encode_push(&frame).unwrap();
//! assert!(wire.starts_with("data: {"));
//! assert!(wire.ends_with("\n\n"));
//!
//! let decoded = codec::decode_push(&wire).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod audio;
pub mod codec;
pub mod frames;

pub use codec::{decode_inbound, encode_push, encode_socket, ProtocolError};
pub use frames::{EventType, InboundMessage, OutboundMessage, PushFrame};
