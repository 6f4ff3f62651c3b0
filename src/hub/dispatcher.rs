//! Dispatch hub
//!
//! The hub task owns every peer and applies routing policy. Each joined
//! connection gets a forwarder task that drains its outbound queue into one
//! merged event channel, so the hub loop only ever waits on two receivers no
//! matter how many peers are connected.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::config::HubConfig;
use super::connection::{Connection, ConnectionId, Peer};
use super::message::{Message, Request, Subscription, Update};
use crate::error::HubError;
use crate::schema::{Definition, SchemaRegistry};

enum Control {
    Join(oneshot::Sender<Connection>),
}

enum HubEvent {
    Message(ConnectionId, Message),
    Disconnected(ConnectionId),
}

/// Snapshot of hub counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Connections currently registered
    pub peers: usize,
    /// Messages received from peers
    pub messages: u64,
    /// Messages placed on peer inbound queues
    pub deliveries: u64,
    /// Requests with no owning peer
    pub requests_dropped: u64,
    /// Definitions newly added to the registry by peers
    pub definitions_added: u64,
    /// Announcements rejected as conflicting with the registry
    pub definitions_rejected: u64,
    /// Peers removed because their inbound queue was closed or stuck
    pub peers_dropped: u64,
}

#[derive(Debug, Default)]
struct HubCounters {
    peers: AtomicUsize,
    messages: AtomicU64,
    deliveries: AtomicU64,
    requests_dropped: AtomicU64,
    definitions_added: AtomicU64,
    definitions_rejected: AtomicU64,
    peers_dropped: AtomicU64,
}

impl HubCounters {
    fn snapshot(&self) -> HubStats {
        HubStats {
            peers: self.peers.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            requests_dropped: self.requests_dropped.load(Ordering::Relaxed),
            definitions_added: self.definitions_added.load(Ordering::Relaxed),
            definitions_rejected: self.definitions_rejected.load(Ordering::Relaxed),
            peers_dropped: self.peers_dropped.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Cloneable entry point to a running hub
#[derive(Debug, Clone)]
pub struct HubHandle {
    control: mpsc::Sender<Control>,
    counters: Arc<HubCounters>,
}

impl HubHandle {
    /// Register a new connection
    ///
    /// The connection is routable as soon as this returns.
    pub async fn join(&self) -> Result<Connection, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(Control::Join(reply_tx))
            .await
            .map_err(|_| HubError::Closed)?;
        reply_rx.await.map_err(|_| HubError::Closed)
    }

    pub fn stats(&self) -> HubStats {
        self.counters.snapshot()
    }
}

/// Pub/sub router between connections
///
/// Peers are kept in join order, which decides request ownership.
pub struct Hub {
    config: HubConfig,
    registry: Arc<SchemaRegistry>,
    control_rx: mpsc::Receiver<Control>,
    events_tx: mpsc::Sender<HubEvent>,
    events_rx: mpsc::Receiver<HubEvent>,
    peers: Vec<Peer>,
    next_id: ConnectionId,
    counters: Arc<HubCounters>,
}

impl Hub {
    /// Create a hub and its handle; drive it with [`run`](Self::run)
    pub fn new(registry: Arc<SchemaRegistry>, config: HubConfig) -> (Self, HubHandle) {
        let (control_tx, control_rx) = mpsc::channel(config.control_capacity);
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity);
        let counters = Arc::new(HubCounters::default());

        let hub = Self {
            config,
            registry,
            control_rx,
            events_tx,
            events_rx,
            peers: Vec::new(),
            next_id: 1,
            counters: Arc::clone(&counters),
        };
        let handle = HubHandle {
            control: control_tx,
            counters,
        };

        (hub, handle)
    }

    /// Create a hub and run it on a new task
    pub fn spawn(registry: Arc<SchemaRegistry>, config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(registry, config);
        (handle, tokio::spawn(hub.run()))
    }

    /// Run the hub loop
    ///
    /// Returns once every [`HubHandle`] is dropped and the last peer has
    /// disconnected.
    pub async fn run(mut self) {
        tracing::info!(definitions = self.registry.len(), "Hub started");

        let mut accepting = true;
        loop {
            if !accepting && self.peers.is_empty() {
                break;
            }

            tokio::select! {
                control = self.control_rx.recv(), if accepting => match control {
                    Some(Control::Join(reply)) => self.join(reply),
                    None => {
                        tracing::debug!(peers = self.peers.len(), "Hub handles dropped");
                        accepting = false;
                    }
                },
                Some(event) = self.events_rx.recv() => match event {
                    HubEvent::Message(from, message) => self.dispatch(from, message).await,
                    HubEvent::Disconnected(id) => {
                        if self.remove(id) {
                            tracing::info!(connection = id, "Connection closed");
                        }
                    }
                },
                else => break,
            }
        }

        tracing::info!("Hub stopped");
    }

    fn join(&mut self, reply: oneshot::Sender<Connection>) {
        let id = self.next_id;
        self.next_id += 1;

        let (outbound_tx, mut outbound_rx) = mpsc::channel(self.config.queue_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.queue_capacity);

        let events = self.events_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if events.send(HubEvent::Message(id, message)).await.is_err() {
                    return;
                }
            }
            let _ = events.send(HubEvent::Disconnected(id)).await;
        });
        let peer = Peer::new(id, inbound_tx, forwarder);

        if reply
            .send(Connection::new(id, outbound_tx, inbound_rx))
            .is_err()
        {
            tracing::debug!(connection = id, "Joiner went away before registration");
            return;
        }

        self.peers.push(peer);
        self.counters.peers.store(self.peers.len(), Ordering::Relaxed);
        tracing::info!(connection = id, peers = self.peers.len(), "Connection joined");
    }

    fn remove(&mut self, id: ConnectionId) -> bool {
        let Some(index) = self.peers.iter().position(|p| p.id == id) else {
            return false;
        };
        // Vec::remove keeps the remaining peers in join order
        self.peers.remove(index);
        self.counters.peers.store(self.peers.len(), Ordering::Relaxed);
        true
    }

    fn peer_mut(&mut self, id: ConnectionId) -> Option<&mut Peer> {
        self.peers.iter_mut().find(|p| p.id == id)
    }

    async fn dispatch(&mut self, from: ConnectionId, message: Message) {
        if !self.peers.iter().any(|p| p.id == from) {
            tracing::trace!(connection = from, kind = message.kind(), "Message from removed peer");
            return;
        }
        bump(&self.counters.messages);

        match message {
            Message::Update(update) => self.route_update(from, update).await,
            Message::Subscription(subscription) => self.subscribe(from, subscription),
            Message::Definition(definition) => self.announce(from, definition).await,
            Message::Request(request) => self.route_request(from, request).await,
        }
    }

    async fn route_update(&mut self, from: ConnectionId, update: Update) {
        let targets: Vec<_> = self
            .peers
            .iter()
            .filter(|p| p.id != from && p.is_subscribed(update.object_id))
            .map(|p| (p.id, p.inbound.clone()))
            .collect();

        tracing::trace!(
            connection = from,
            object_id = %format_id(update.object_id),
            targets = targets.len(),
            "Routing update"
        );

        self.deliver(targets, Message::Update(update)).await;
    }

    fn subscribe(&mut self, from: ConnectionId, subscription: Subscription) {
        if let Some(peer) = self.peer_mut(from) {
            peer.subscriptions.push(subscription.object_id);
            tracing::debug!(
                connection = from,
                object_id = %format_id(subscription.object_id),
                "Subscribed"
            );
        }
    }

    async fn announce(&mut self, from: ConnectionId, definition: Arc<Definition>) {
        let object_id = definition.object_id();

        match self.registry.add(Arc::clone(&definition)) {
            Ok(true) => {
                bump(&self.counters.definitions_added);
                tracing::info!(
                    connection = from,
                    object_id = %format_id(object_id),
                    name = definition.name(),
                    "Definition added"
                );
            }
            Ok(false) => {}
            Err(e) => {
                bump(&self.counters.definitions_rejected);
                tracing::warn!(
                    connection = from,
                    object_id = %format_id(object_id),
                    name = definition.name(),
                    error = %e,
                    "Conflicting definition dropped"
                );
                return;
            }
        }

        if let Some(peer) = self.peer_mut(from) {
            peer.known.insert(object_id);
        }

        let targets: Vec<_> = self
            .peers
            .iter()
            .filter(|p| p.id != from)
            .map(|p| (p.id, p.inbound.clone()))
            .collect();

        self.deliver(targets, Message::Definition(definition)).await;
    }

    async fn route_request(&mut self, from: ConnectionId, request: Request) {
        let owner = self
            .peers
            .iter()
            .find(|p| p.owns(request.object_id))
            .map(|p| (p.id, p.inbound.clone()));

        let Some(owner) = owner else {
            bump(&self.counters.requests_dropped);
            tracing::debug!(
                connection = from,
                object_id = %format_id(request.object_id),
                "Request has no owner, dropped"
            );
            return;
        };

        tracing::trace!(
            connection = from,
            owner = owner.0,
            object_id = %format_id(request.object_id),
            "Routing request"
        );

        self.deliver(vec![owner], Message::Request(request)).await;
    }

    /// Put `message` on each target's inbound queue, in order
    ///
    /// Blocks while a queue is full, up to `delivery_timeout` when set. Peers
    /// whose queue is closed or stays full are removed.
    async fn deliver(&mut self, targets: Vec<(ConnectionId, mpsc::Sender<Message>)>, message: Message) {
        let mut dead = Vec::new();

        for (id, inbound) in targets {
            let result = match self.config.delivery_timeout {
                Some(timeout) => inbound
                    .send_timeout(message.clone(), timeout)
                    .await
                    .map_err(|e| match e {
                        SendTimeoutError::Timeout(_) => "delivery timed out",
                        SendTimeoutError::Closed(_) => "inbound queue closed",
                    }),
                None => inbound
                    .send(message.clone())
                    .await
                    .map_err(|_| "inbound queue closed"),
            };

            match result {
                Ok(()) => bump(&self.counters.deliveries),
                Err(reason) => {
                    tracing::warn!(connection = id, kind = message.kind(), reason, "Dropping connection");
                    dead.push(id);
                }
            }
        }

        for id in dead {
            if self.remove(id) {
                bump(&self.counters.peers_dropped);
            }
        }
    }
}

fn format_id(object_id: u32) -> String {
    format!("0x{:08X}", object_id)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::codec::{ObjectData, Value};
    use crate::schema::{DefinitionSource, FieldSource};

    const HOME_LOCATION: u32 = 0xCA32_B032;

    fn home_location() -> Arc<Definition> {
        Arc::new(
            DefinitionSource::new("HomeLocation")
                .object_id(HOME_LOCATION)
                .single_instance(true)
                .field(FieldSource::new("Latitude", "float32"))
                .field(FieldSource::new("Longitude", "float32"))
                .field(FieldSource::new("Altitude", "float32"))
                .resolve()
                .unwrap(),
        )
    }

    fn home_data() -> ObjectData {
        let mut data = ObjectData::new();
        data.insert("Latitude".into(), Value::Float32(52.1));
        data.insert("Longitude".into(), Value::Float32(4.3));
        data.insert("Altitude".into(), Value::Float32(0.0));
        data
    }

    fn spawn_hub() -> (HubHandle, JoinHandle<()>, Arc<SchemaRegistry>) {
        spawn_hub_with(HubConfig::default())
    }

    fn spawn_hub_with(config: HubConfig) -> (HubHandle, JoinHandle<()>, Arc<SchemaRegistry>) {
        let registry = Arc::new(SchemaRegistry::new());
        let (handle, task) = Hub::spawn(Arc::clone(&registry), config);
        (handle, task, registry)
    }

    async fn recv(conn: &mut Connection) -> Message {
        tokio::time::timeout(Duration::from_secs(1), conn.recv())
            .await
            .expect("timed out waiting for message")
            .expect("connection closed")
    }

    /// Send a request for `object_id` from `from` and wait for `owner` to get
    /// it. Everything `from` sent earlier has been processed once this returns.
    async fn sync_via_request(from: &Connection, owner: &mut Connection, object_id: u32) {
        from.send(Message::request(object_id, 0)).await.unwrap();
        assert_eq!(recv(owner).await, Message::request(object_id, 0));
    }

    /// Same as `sync_via_request` with the owner asking itself
    async fn barrier(owner: &mut Connection, object_id: u32) {
        owner.send(Message::request(object_id, 0)).await.unwrap();
        assert_eq!(recv(owner).await, Message::request(object_id, 0));
    }

    #[tokio::test]
    async fn test_update_reaches_subscriber_not_sender() {
        let (hub, _task, registry) = spawn_hub();
        let mut a = hub.join().await.unwrap();
        let mut b = hub.join().await.unwrap();

        a.send(Message::definition(home_location())).await.unwrap();
        assert_eq!(recv(&mut b).await, Message::definition(home_location()));
        assert!(registry.contains(HOME_LOCATION));

        b.send(Message::subscription(HOME_LOCATION)).await.unwrap();
        a.send(Message::subscription(HOME_LOCATION)).await.unwrap();
        sync_via_request(&b, &mut a, HOME_LOCATION).await;

        a.send(Message::update(HOME_LOCATION, 0, home_data())).await.unwrap();
        assert_eq!(
            recv(&mut b).await,
            Message::update(HOME_LOCATION, 0, home_data())
        );

        // A's own subscription does not echo its update back
        sync_via_request(&b, &mut a, HOME_LOCATION).await;
        assert!(matches!(a.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(b.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_duplicate_subscription_delivers_once() {
        let (hub, _task, _registry) = spawn_hub();
        let mut a = hub.join().await.unwrap();
        let mut b = hub.join().await.unwrap();

        a.send(Message::definition(home_location())).await.unwrap();
        recv(&mut b).await;

        b.send(Message::subscription(HOME_LOCATION)).await.unwrap();
        b.send(Message::subscription(HOME_LOCATION)).await.unwrap();
        sync_via_request(&b, &mut a, HOME_LOCATION).await;

        a.send(Message::update(HOME_LOCATION, 0, home_data())).await.unwrap();
        a.send(Message::update(HOME_LOCATION, 1, home_data())).await.unwrap();

        assert_eq!(recv(&mut b).await, Message::update(HOME_LOCATION, 0, home_data()));
        assert_eq!(recv(&mut b).await, Message::update(HOME_LOCATION, 1, home_data()));

        sync_via_request(&b, &mut a, HOME_LOCATION).await;
        assert!(matches!(b.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_unsubscribed_peer_gets_nothing() {
        let (hub, _task, _registry) = spawn_hub();
        let mut a = hub.join().await.unwrap();
        let mut b = hub.join().await.unwrap();

        a.send(Message::definition(home_location())).await.unwrap();
        recv(&mut b).await;

        a.send(Message::update(HOME_LOCATION, 0, home_data())).await.unwrap();
        barrier(&mut a, HOME_LOCATION).await;
        assert!(matches!(b.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_request_goes_to_first_owner_only() {
        let (hub, _task, _registry) = spawn_hub();
        let mut a = hub.join().await.unwrap();
        let mut b = hub.join().await.unwrap();
        let mut c = hub.join().await.unwrap();

        a.send(Message::definition(home_location())).await.unwrap();
        recv(&mut b).await;
        recv(&mut c).await;

        b.send(Message::definition(home_location())).await.unwrap();
        recv(&mut a).await;
        recv(&mut c).await;

        c.send(Message::request(HOME_LOCATION, 0)).await.unwrap();
        assert_eq!(recv(&mut a).await, Message::request(HOME_LOCATION, 0));

        // Order barrier: a second request also lands on A, never on B
        c.send(Message::request(HOME_LOCATION, 0)).await.unwrap();
        assert_eq!(recv(&mut a).await, Message::request(HOME_LOCATION, 0));
        assert!(matches!(b.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_owner_disconnect_moves_ownership() {
        let (hub, _task, _registry) = spawn_hub();
        let a = hub.join().await.unwrap();
        let mut b = hub.join().await.unwrap();
        let mut c = hub.join().await.unwrap();

        a.send(Message::definition(home_location())).await.unwrap();
        recv(&mut b).await;
        recv(&mut c).await;
        b.send(Message::definition(home_location())).await.unwrap();
        recv(&mut c).await;

        drop(a);
        while hub.stats().peers != 2 {
            tokio::task::yield_now().await;
        }

        c.send(Message::request(HOME_LOCATION, 0)).await.unwrap();
        assert_eq!(recv(&mut b).await, Message::request(HOME_LOCATION, 0));
    }

    #[tokio::test]
    async fn test_request_without_owner_dropped() {
        let (hub, _task, _registry) = spawn_hub();
        let mut a = hub.join().await.unwrap();
        let mut b = hub.join().await.unwrap();

        b.send(Message::request(0x1234, 0)).await.unwrap();
        a.send(Message::definition(home_location())).await.unwrap();
        recv(&mut b).await;
        sync_via_request(&b, &mut a, HOME_LOCATION).await;

        assert_eq!(hub.stats().requests_dropped, 1);
    }

    #[tokio::test]
    async fn test_conflicting_definition_rejected() {
        let (hub, _task, registry) = spawn_hub();
        let mut a = hub.join().await.unwrap();
        let mut b = hub.join().await.unwrap();

        a.send(Message::definition(home_location())).await.unwrap();
        recv(&mut b).await;

        let impostor = Arc::new(
            DefinitionSource::new("HomeLocation")
                .object_id(HOME_LOCATION)
                .single_instance(true)
                .field(FieldSource::new("Latitude", "int32"))
                .resolve()
                .unwrap(),
        );
        b.send(Message::definition(impostor)).await.unwrap();
        sync_via_request(&b, &mut a, HOME_LOCATION).await;

        assert!(matches!(a.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(registry.get(HOME_LOCATION), Some(home_location()));
        let stats = hub.stats();
        assert_eq!(stats.definitions_added, 1);
        assert_eq!(stats.definitions_rejected, 1);
    }

    #[tokio::test]
    async fn test_closed_inbound_removes_peer() {
        let (hub, _task, _registry) = spawn_hub();
        let mut a = hub.join().await.unwrap();
        let b = hub.join().await.unwrap();

        // B keeps its sending half but stops receiving
        let (_b_tx, b_rx) = b.split();
        drop(b_rx);

        a.send(Message::definition(home_location())).await.unwrap();
        barrier(&mut a, HOME_LOCATION).await;

        assert_eq!(hub.stats().peers, 1);
        assert_eq!(hub.stats().peers_dropped, 1);
    }

    #[tokio::test]
    async fn test_stuck_peer_removed_after_timeout() {
        let config = HubConfig::default()
            .queue_capacity(1)
            .delivery_timeout(Duration::from_millis(20));
        let (hub, _task, _registry) = spawn_hub_with(config);
        let mut a = hub.join().await.unwrap();
        let mut b = hub.join().await.unwrap();

        a.send(Message::definition(home_location())).await.unwrap();
        recv(&mut b).await;
        b.send(Message::subscription(HOME_LOCATION)).await.unwrap();
        sync_via_request(&b, &mut a, HOME_LOCATION).await;

        // B never drains; the second update fills its queue and times out
        for i in 0..3 {
            a.send(Message::update(HOME_LOCATION, i, home_data())).await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(1), async {
            while hub.stats().peers_dropped == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(hub.stats().peers, 1);
    }

    #[tokio::test]
    async fn test_hub_stops_when_idle() {
        let (hub, task, _registry) = spawn_hub();
        let conn = hub.join().await.unwrap();

        drop(hub);
        assert!(!task.is_finished());
        drop(conn);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_join_after_stop() {
        let (hub, task, _registry) = spawn_hub();
        let extra = hub.clone();
        drop(hub);
        task.abort();
        let _ = task.await;

        assert_eq!(extra.join().await.unwrap_err(), HubError::Closed);
    }
}
