//! # herald-core
//!
//! Core types and fan-out machinery for the Herald event-distribution server.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Event** - Immutable outbound notification (robot response or heartbeat)
//! - **Mailbox** - Bounded per-subscriber queue that drops the oldest event on overflow
//! - **Connection** - Live subscriber handle with a monotonic lifecycle
//! - **Registry** - Synchronized set of live connections
//! - **Broadcaster** - Copies each published event into every live mailbox
//! - **HeartbeatScheduler** - Keeps idle connections alive
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌─────────────┐     ┌──────────┐     ┌────────────┐
//! │ Producer │────▶│ Broadcaster │────▶│ Mailbox  │────▶│ Delivery   │
//! └──────────┘     └─────────────┘     │ (per     │     │ task       │
//!                         │            │  conn)   │     └────────────┘
//!                         ▼            └──────────┘
//!                  ┌─────────────┐           ▲
//!                  │  Registry   │           │
//!                  └─────────────┘     ┌──────────┐
//!                         ▲            │Heartbeat │
//!                         └────────────│Scheduler │
//!                                      └──────────┘
//! ```

pub mod broadcaster;
pub mod connection;
pub mod event;
pub mod heartbeat;
pub mod mailbox;
pub mod registry;

pub use broadcaster::{Broadcaster, BroadcasterStats};
pub use connection::{Connection, ConnectionHandle, ConnectionId, ConnectionState, TransportKind};
pub use event::{Event, EventKind};
pub use heartbeat::HeartbeatScheduler;
pub use mailbox::{Enqueued, Mailbox};
pub use registry::{Registry, RegistryConfig, RegistryError, RegistryStats};
