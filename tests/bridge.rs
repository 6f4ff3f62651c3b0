//! End-to-end bridge tests over an in-memory duplex stream

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc::error::TryRecvError;
use tokio_test::{assert_err, assert_ok};

use uavtalk_bridge::codec::{ObjectData, Value};
use uavtalk_bridge::hub::{Connection, Hub, HubConfig, HubHandle, Message};
use uavtalk_bridge::link::{Link, LinkConfig};
use uavtalk_bridge::protocol::{Cmd, FrameScanner, Packet, ScanEvent};
use uavtalk_bridge::schema::{load_registry, SchemaRegistry};

fn definitions_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/definitions")
}

struct Bridge {
    registry: Arc<SchemaRegistry>,
    hub: HubHandle,
    link: Link,
    fc: DuplexStream,
}

/// Start a hub with `consumers` connections joined ahead of the link
///
/// Each consumer has received every link announcement when this returns,
/// which also means the link's subscriptions are registered.
async fn start_bridge(consumers: usize) -> (Bridge, Vec<Connection>) {
    let registry = Arc::new(assert_ok!(load_registry(definitions_dir()).await));
    let (hub, _hub_task) = Hub::spawn(Arc::clone(&registry), HubConfig::default());

    let mut conns = Vec::with_capacity(consumers);
    for _ in 0..consumers {
        conns.push(assert_ok!(hub.join().await));
    }

    let (fc, link_side) = duplex(4096);
    let link = Link::new(Arc::clone(&registry), LinkConfig::default());
    let link_conn = assert_ok!(hub.join().await);
    let runner = link.clone();
    tokio::spawn(async move { runner.run(link_side, link_conn).await });

    for conn in &mut conns {
        for _ in 0..registry.len() {
            assert!(matches!(recv(conn).await, Message::Definition(_)));
        }
    }

    let bridge = Bridge {
        registry,
        hub,
        link,
        fc,
    };
    (bridge, conns)
}

async fn recv(conn: &mut Connection) -> Message {
    tokio::time::timeout(Duration::from_secs(1), conn.recv())
        .await
        .expect("timed out waiting for message")
        .expect("connection closed")
}

async fn read_packet(bridge: &mut Bridge, scanner: &mut FrameScanner) -> Packet {
    let mut chunk = [0u8; 64];
    loop {
        if let Some(event) = scanner.next_event() {
            match event {
                ScanEvent::Frame(frame) => {
                    return assert_ok!(Packet::decode(&frame, &bridge.registry));
                }
                ScanEvent::Corrupt(bytes) => panic!("link wrote a corrupt frame: {:?}", bytes),
            }
        }
        let n = tokio::time::timeout(Duration::from_secs(1), bridge.fc.read(&mut chunk))
            .await
            .expect("timed out waiting for frame")
            .unwrap();
        assert!(n > 0, "link closed the stream");
        scanner.push(&chunk[..n]);
    }
}

fn gyros_data(z: f32) -> ObjectData {
    let mut data = ObjectData::new();
    data.insert("x".into(), Value::Float32(0.5));
    data.insert("y".into(), Value::Float32(-0.5));
    data.insert("z".into(), Value::Float32(z));
    data.insert("temperature".into(), Value::Float32(31.0));
    data
}

#[tokio::test]
async fn loads_demo_definitions() {
    let registry = assert_ok!(load_registry(definitions_dir()).await);

    assert_eq!(registry.len(), 5);
    let home = registry.get(0xCA32_B032).unwrap();
    assert_eq!(home.name(), "HomeLocation");
    assert_eq!(home.byte_length(), 12);

    let actuator = registry.get_by_name("ActuatorCommand").unwrap();
    assert_eq!(actuator.byte_length(), 10 * 2 + 2 + 1 + 1);
    let order: Vec<&str> = actuator.fields().iter().map(|f| f.name()).collect();
    assert_eq!(
        order,
        vec!["Channel", "MaxUpdateTime", "UpdateTime", "NumFailedUpdates"]
    );

    let waypoint = registry.get_by_name("Waypoint").unwrap();
    let clone = waypoint.field("VelocityDesired").unwrap();
    assert_eq!(clone.elements(), 1);
    assert_eq!(clone.clone_of(), Some("Velocity"));
    assert!(!waypoint.single_instance());
    assert_eq!(waypoint.object_id() & 1, 0);
}

#[tokio::test]
async fn flight_controller_update_fans_out_to_subscribers() {
    let (mut bridge, mut conns) = start_bridge(2).await;
    let mut bystander = conns.pop().unwrap();
    let mut subscriber = conns.pop().unwrap();
    let gyros = bridge.registry.get_by_name("Gyros").unwrap();

    // The request round trip proves the subscription is registered
    assert_ok!(subscriber.send(Message::subscription(gyros.object_id())).await);
    assert_ok!(subscriber.send(Message::request(gyros.object_id(), 0)).await);
    let mut scanner = FrameScanner::default();
    let request = read_packet(&mut bridge, &mut scanner).await;
    assert_eq!(request.cmd(), Cmd::Request);

    let frame = assert_ok!(Packet::object(Arc::clone(&gyros), 0, gyros_data(1.25)).encode());
    assert_ok!(bridge.fc.write_all(&frame).await);

    assert_eq!(
        recv(&mut subscriber).await,
        Message::update(gyros.object_id(), 0, gyros_data(1.25))
    );
    assert!(matches!(bystander.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(bridge.link.stats().frames_received, 1);
    assert_eq!(bridge.hub.stats().peers, 3);
}

#[tokio::test]
async fn consumer_update_reaches_flight_controller() {
    let (mut bridge, conns) = start_bridge(1).await;
    let consumer = &conns[0];
    let waypoint = bridge.registry.get_by_name("Waypoint").unwrap();

    let mut data = ObjectData::new();
    data.insert("Position".into(), Value::from(vec![10.0f32, 20.0, -5.0]));
    data.insert("Velocity".into(), Value::Float32(3.0));
    data.insert("VelocityDesired".into(), Value::Float32(2.5));
    data.insert("Action".into(), Value::UInt8(1));
    assert_ok!(
        consumer
            .send(Message::update(waypoint.object_id(), 2, data.clone()))
            .await
    );

    let mut scanner = FrameScanner::default();
    let packet = read_packet(&mut bridge, &mut scanner).await;
    assert_eq!(packet.cmd(), Cmd::Cmd);
    assert_eq!(packet.object_id(), waypoint.object_id());
    assert_eq!(packet.instance_id(), 2);
    assert_eq!(packet.data(), &data);
}

#[tokio::test]
async fn consumer_request_reaches_flight_controller() {
    let (mut bridge, conns) = start_bridge(1).await;
    let consumer = &conns[0];
    let home = bridge.registry.get_by_name("HomeLocation").unwrap();

    assert_ok!(consumer.send(Message::request(home.object_id(), 0)).await);

    let mut scanner = FrameScanner::default();
    let packet = read_packet(&mut bridge, &mut scanner).await;
    assert_eq!(packet.cmd(), Cmd::Request);
    assert_eq!(packet.object_id(), home.object_id());
    assert!(packet.data().is_empty());
}

#[tokio::test]
async fn unencodable_update_is_skipped() {
    let (mut bridge, conns) = start_bridge(1).await;
    let consumer = &conns[0];
    let gyros = bridge.registry.get_by_name("Gyros").unwrap();
    let home = bridge.registry.get_by_name("HomeLocation").unwrap();

    // Missing fields: the link drops it and keeps going
    let mut partial = ObjectData::new();
    partial.insert("x".into(), Value::Float32(1.0));
    assert_ok!(
        consumer
            .send(Message::update(gyros.object_id(), 0, partial))
            .await
    );
    assert_ok!(consumer.send(Message::request(home.object_id(), 0)).await);

    let mut scanner = FrameScanner::default();
    let packet = read_packet(&mut bridge, &mut scanner).await;
    assert_eq!(packet.cmd(), Cmd::Request);
    assert_eq!(bridge.link.stats().encode_errors, 1);
}

#[tokio::test]
async fn hub_rejects_joins_after_shutdown() {
    let registry = Arc::new(SchemaRegistry::new());
    let (hub, task) = Hub::spawn(registry, HubConfig::default());
    let late = hub.clone();

    task.abort();
    let _ = task.await;
    drop(hub);

    assert_err!(late.join().await);
}
