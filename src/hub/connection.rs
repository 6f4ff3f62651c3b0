//! Connection handles
//!
//! A [`Connection`] is the client side of one hub peer. Messages sent on it
//! enter the hub; messages the hub routes to this peer arrive on it.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use super::message::Message;
use crate::error::HubError;

/// Hub-assigned connection identifier, increasing in join order
pub type ConnectionId = u64;

/// Client handle for one hub peer
///
/// Dropping the handle (or both halves after [`split`](Self::split))
/// disconnects the peer.
#[derive(Debug)]
pub struct Connection {
    sender: ConnectionSender,
    receiver: ConnectionReceiver,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        outbound: mpsc::Sender<Message>,
        inbound: mpsc::Receiver<Message>,
    ) -> Self {
        Self {
            sender: ConnectionSender { id, outbound },
            receiver: ConnectionReceiver { id, inbound },
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.sender.id
    }

    /// Send a message to the hub
    ///
    /// Waits while the outbound queue is full.
    pub async fn send(&self, message: Message) -> Result<(), HubError> {
        self.sender.send(message).await
    }

    /// Receive the next message routed to this connection
    ///
    /// Returns `None` once the hub has dropped this connection.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Message, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Split into independently owned send and receive halves
    pub fn split(self) -> (ConnectionSender, ConnectionReceiver) {
        (self.sender, self.receiver)
    }
}

/// Sending half of a [`Connection`]
#[derive(Debug, Clone)]
pub struct ConnectionSender {
    id: ConnectionId,
    outbound: mpsc::Sender<Message>,
}

impl ConnectionSender {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn send(&self, message: Message) -> Result<(), HubError> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| HubError::Closed)
    }
}

/// Receiving half of a [`Connection`]
#[derive(Debug)]
pub struct ConnectionReceiver {
    id: ConnectionId,
    inbound: mpsc::Receiver<Message>,
}

impl ConnectionReceiver {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Message, TryRecvError> {
        self.inbound.try_recv()
    }
}

/// Hub-side state for one connection
#[derive(Debug)]
pub(crate) struct Peer {
    pub id: ConnectionId,
    /// Delivery queue into the client's [`Connection`]
    pub inbound: mpsc::Sender<Message>,
    /// Subscribed object IDs; repeats are kept
    pub subscriptions: Vec<u32>,
    /// Object IDs this peer has announced
    pub known: HashSet<u32>,
    /// Task draining the client's outbound queue into the hub
    forwarder: JoinHandle<()>,
}

impl Peer {
    pub fn new(id: ConnectionId, inbound: mpsc::Sender<Message>, forwarder: JoinHandle<()>) -> Self {
        Self {
            id,
            inbound,
            subscriptions: Vec::new(),
            known: HashSet::new(),
            forwarder,
        }
    }

    pub fn is_subscribed(&self, object_id: u32) -> bool {
        self.subscriptions.contains(&object_id)
    }

    pub fn owns(&self, object_id: u32) -> bool {
        self.known.contains(&object_id)
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}
