//! UAVTalk bridge
//!
//! Bridges a flight controller speaking UAVTalk to any number of consumer
//! connections through a pub/sub hub.
//!
//! - [`schema`]: object definitions, object ID derivation, registry, JSON loader
//! - [`codec`]: payload encode/decode against a definition
//! - [`protocol`]: frame layout, CRC-8, frame scanner
//! - [`hub`]: connection handles and the routing loop
//! - [`link`]: drives a flight controller byte stream as a hub connection
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio::net::TcpStream;
//! use uavtalk_bridge::hub::{Hub, HubConfig};
//! use uavtalk_bridge::link::{Link, LinkConfig};
//! use uavtalk_bridge::schema::load_registry;
//!
//! # async fn example() -> uavtalk_bridge::error::Result<()> {
//! let registry = Arc::new(load_registry("definitions").await?);
//! let (hub, _hub_task) = Hub::spawn(Arc::clone(&registry), HubConfig::default());
//!
//! let link = Link::new(Arc::clone(&registry), LinkConfig::default());
//! let link_conn = hub.join().await?;
//! let stream = TcpStream::connect("127.0.0.1:9000").await?;
//! tokio::spawn(async move { link.run(stream, link_conn).await });
//!
//! let mut consumer = hub.join().await?;
//! while let Some(message) = consumer.recv().await {
//!     println!("{:?}", message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod hub;
pub mod link;
pub mod protocol;
pub mod schema;

pub use codec::{ObjectData, Value};
pub use error::{Error, Result};
pub use hub::{Connection, Hub, HubConfig, HubHandle, Message};
pub use link::{Link, LinkConfig};
pub use protocol::{Cmd, FrameScanner, Packet};
pub use schema::{Definition, SchemaRegistry};
