//! Pub/sub dispatch hub
//!
//! Routes [`Message`]s between an open-ended set of connections.
//!
//! # Architecture
//!
//! ```text
//!   Connection A        Connection B        Connection C
//!    outbound ─┐         outbound ─┐         outbound ─┐
//!              ▼                   ▼                   ▼
//!         [forwarder]         [forwarder]         [forwarder]
//!              │                   │                   │
//!              └─────────┬─────────┴───────────────────┘
//!                        ▼
//!   HubHandle::join ──► Hub loop ──► routing policy
//!   (control chan)       │
//!         ┌──────────────┼──────────────┐
//!         ▼              ▼              ▼
//!    A.inbound      B.inbound      C.inbound
//! ```
//!
//! # Routing
//!
//! | Message      | Delivered to                                         |
//! |--------------|------------------------------------------------------|
//! | Update       | every other connection subscribed to the object      |
//! | Subscription | nobody; recorded on the sender                       |
//! | Definition   | every other connection; sender becomes an owner      |
//! | Request      | the first connection (join order) owning the object  |
//!
//! Inbound queues are bounded. A full queue stalls the hub loop until the
//! consumer drains it, unless [`HubConfig::delivery_timeout`] is set.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod message;

pub use config::HubConfig;
pub use connection::{Connection, ConnectionId, ConnectionReceiver, ConnectionSender};
pub use dispatcher::{Hub, HubHandle, HubStats};
pub use message::{Message, Request, Subscription, Update};
