//! Flight controller link
//!
//! ```text
//!                       ┌──────────── Link ─────────────┐
//!   flight      read    │  FrameScanner ─► Packet ─►    │   outbound
//!   controller ────────►│  read_loop       decode   ────┼──────────► Hub
//!   (duplex     write   │                    │ ack      │   inbound
//!    stream)  ◄─────────┤  write_loop ◄──────┘ ◄────────┼─────────── Hub
//!                       │  Packet::encode               │
//!                       └───────────────────────────────┘
//! ```
//!
//! The link joins the hub like any other connection. On start it subscribes
//! to and announces every known object, so consumer updates flow down to the
//! flight controller and consumer requests are routed to it.

pub mod adapter;
pub mod config;
pub mod stats;

pub use adapter::Link;
pub use config::LinkConfig;
pub use stats::LinkStats;
