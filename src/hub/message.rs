//! Dispatch messages

use std::sync::Arc;

use serde::Serialize;

use crate::codec::ObjectData;
use crate::schema::Definition;

/// Object data pushed by a connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    pub object_id: u32,
    pub instance_id: u16,
    pub data: ObjectData,
}

/// Interest in updates for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub object_id: u32,
}

/// Ask the owner of an object for its current data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Request {
    pub object_id: u32,
    pub instance_id: u16,
}

/// Message exchanged between a connection and the hub
///
/// The same variants flow in both directions. Serialized with a `type` tag
/// so consumers can emit them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Update(Update),
    Subscription(Subscription),
    Definition(Arc<Definition>),
    Request(Request),
}

impl Message {
    pub fn update(object_id: u32, instance_id: u16, data: ObjectData) -> Self {
        Message::Update(Update {
            object_id,
            instance_id,
            data,
        })
    }

    pub fn subscription(object_id: u32) -> Self {
        Message::Subscription(Subscription { object_id })
    }

    pub fn definition(definition: Arc<Definition>) -> Self {
        Message::Definition(definition)
    }

    pub fn request(object_id: u32, instance_id: u16) -> Self {
        Message::Request(Request {
            object_id,
            instance_id,
        })
    }

    /// Object the message refers to
    pub fn object_id(&self) -> u32 {
        match self {
            Message::Update(u) => u.object_id,
            Message::Subscription(s) => s.object_id,
            Message::Definition(d) => d.object_id(),
            Message::Request(r) => r.object_id,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Update(_) => "update",
            Message::Subscription(_) => "subscription",
            Message::Definition(_) => "definition",
            Message::Request(_) => "request",
        }
    }
}
