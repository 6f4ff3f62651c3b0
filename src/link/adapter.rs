//! Flight controller link
//!
//! Drives one duplex byte stream against one hub connection. The read loop
//! turns frames into hub messages; the write loop turns hub messages (and
//! pending acks) into frames.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::config::LinkConfig;
use super::stats::{LinkCounters, LinkStats};
use crate::error::{FrameError, Result};
use crate::hub::{Connection, ConnectionReceiver, ConnectionSender, Message};
use crate::protocol::{hex_dump, Cmd, FrameScanner, Packet, ScanEvent};
use crate::schema::SchemaRegistry;

/// Capacity of the read loop to write loop ack queue
const ACK_QUEUE_CAPACITY: usize = 16;

enum Outgoing {
    Hub(Option<Message>),
    Ack(Packet),
}

/// Bridge between a flight controller byte stream and the hub
///
/// Cloning is cheap; clones share counters.
#[derive(Debug, Clone)]
pub struct Link {
    config: LinkConfig,
    registry: Arc<SchemaRegistry>,
    counters: Arc<LinkCounters>,
}

impl Link {
    pub fn new(registry: Arc<SchemaRegistry>, config: LinkConfig) -> Self {
        Self {
            config,
            registry,
            counters: Arc::new(LinkCounters::default()),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    /// Run both loops until the stream ends, the hub drops the connection,
    /// or an I/O error occurs
    ///
    /// End of stream and hub shutdown return `Ok`. I/O errors are returned
    /// and end the link; there is no reconnect.
    pub async fn run<S>(&self, stream: S, connection: Connection) -> Result<()>
    where
        S: AsyncRead + AsyncWrite,
    {
        tracing::info!(
            connection = connection.id(),
            definitions = self.registry.len(),
            "Link started"
        );

        let (reader, writer) = tokio::io::split(stream);
        let (hub_tx, hub_rx) = connection.split();
        let (ack_tx, ack_rx) = mpsc::channel(ACK_QUEUE_CAPACITY);

        let result = tokio::select! {
            result = self.read_loop(reader, hub_tx, ack_tx) => result,
            result = self.write_loop(writer, hub_rx, ack_rx) => result,
        };

        match &result {
            Ok(()) => tracing::info!("Link stopped"),
            Err(e) => tracing::error!(error = %e, "Link failed"),
        }
        result
    }

    /// Subscribe and announce on behalf of the flight controller
    ///
    /// Subscriptions go first so that a peer seeing the announcements knows
    /// the subscriptions are already registered.
    async fn bootstrap(&self, hub: &ConnectionSender) -> Result<()> {
        let definitions = self.registry.definitions();

        if self.config.subscribe_all {
            for definition in &definitions {
                hub.send(Message::subscription(definition.object_id())).await?;
            }
        }

        if self.config.announce_definitions {
            for definition in definitions {
                hub.send(Message::definition(definition)).await?;
            }
        }

        Ok(())
    }

    async fn read_loop<R>(
        &self,
        mut reader: R,
        hub: ConnectionSender,
        acks: mpsc::Sender<Packet>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.bootstrap(&hub).await?;

        let mut scanner = FrameScanner::new(self.config.max_buffer_size);
        let mut chunk = vec![0u8; self.config.read_chunk_size];

        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                tracing::info!("Flight controller closed the stream");
                return Ok(());
            }
            LinkCounters::add(&self.counters.bytes_received, n as u64);
            scanner.push(&chunk[..n]);

            while let Some(event) = scanner.next_event() {
                match event {
                    ScanEvent::Frame(frame) => self.handle_frame(&frame, &hub, &acks).await?,
                    ScanEvent::Corrupt(bytes) => {
                        LinkCounters::add(&self.counters.corrupt_frames, 1);
                        tracing::warn!(len = bytes.len(), bytes = %hex_dump(&bytes), "Corrupt frame skipped");
                    }
                }
            }
        }
    }

    async fn handle_frame(
        &self,
        frame: &[u8],
        hub: &ConnectionSender,
        acks: &mpsc::Sender<Packet>,
    ) -> Result<()> {
        let packet = match Packet::decode(frame, &self.registry) {
            Ok(packet) => packet,
            Err(FrameError::UnknownObjectId(object_id)) => {
                LinkCounters::add(&self.counters.unknown_objects, 1);
                tracing::warn!(
                    object_id = %format!("0x{:08X}", object_id),
                    bytes = %hex_dump(frame),
                    "Frame for unknown object dropped"
                );
                return Ok(());
            }
            Err(e) => {
                LinkCounters::add(&self.counters.decode_errors, 1);
                tracing::warn!(error = %e, bytes = %hex_dump(frame), "Frame dropped");
                return Ok(());
            }
        };
        LinkCounters::add(&self.counters.frames_received, 1);

        let object_id = packet.object_id();
        let instance_id = packet.instance_id();

        match packet.cmd() {
            Cmd::Cmd | Cmd::CmdWithAck => {
                if packet.cmd() == Cmd::CmdWithAck && self.config.acknowledge {
                    let ack = Packet::ack(Arc::clone(packet.definition()), instance_id);
                    // Closed only when the write loop has already ended
                    let _ = acks.send(ack).await;
                }
                hub.send(Message::update(object_id, instance_id, packet.into_data()))
                    .await?;
            }
            Cmd::Request => {
                hub.send(Message::request(object_id, instance_id)).await?;
            }
            Cmd::Ack | Cmd::Nack => {
                tracing::debug!(
                    cmd = ?packet.cmd(),
                    name = packet.definition().name(),
                    instance_id,
                    "Acknowledgement from flight controller"
                );
            }
        }

        Ok(())
    }

    async fn write_loop<W>(
        &self,
        mut writer: W,
        mut hub: ConnectionReceiver,
        mut acks: mpsc::Receiver<Packet>,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            let next = tokio::select! {
                message = hub.recv() => Outgoing::Hub(message),
                Some(ack) = acks.recv() => Outgoing::Ack(ack),
            };

            let packet = match next {
                Outgoing::Ack(ack) => ack,
                Outgoing::Hub(Some(message)) => match self.packet_for(message) {
                    Some(packet) => packet,
                    None => continue,
                },
                Outgoing::Hub(None) => {
                    tracing::info!("Hub closed the link connection");
                    return Ok(());
                }
            };

            self.write_packet(&mut writer, &packet).await?;
        }
    }

    /// Frame content for a hub message, if it has one
    fn packet_for(&self, message: Message) -> Option<Packet> {
        let (object_id, packet) = match message {
            Message::Update(update) => {
                let definition = self.registry.get(update.object_id);
                let packet = definition
                    .map(|d| Packet::object(d, update.instance_id, update.data));
                (update.object_id, packet)
            }
            Message::Request(request) => {
                let definition = self.registry.get(request.object_id);
                let packet = definition.map(|d| Packet::request(d, request.instance_id));
                (request.object_id, packet)
            }
            other => {
                tracing::debug!(kind = other.kind(), "Not forwarded to flight controller");
                return None;
            }
        };

        if packet.is_none() {
            LinkCounters::add(&self.counters.encode_errors, 1);
            tracing::warn!(
                object_id = %format!("0x{:08X}", object_id),
                "Message for unknown object not sent"
            );
        }
        packet
    }

    async fn write_packet<W>(&self, writer: &mut W, packet: &Packet) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = match packet.encode() {
            Ok(frame) => frame,
            Err(e) => {
                LinkCounters::add(&self.counters.encode_errors, 1);
                tracing::warn!(
                    name = packet.definition().name(),
                    error = %e,
                    "Message not encodable, skipped"
                );
                return Ok(());
            }
        };

        writer.write_all(&frame).await?;
        writer.flush().await?;

        LinkCounters::add(&self.counters.frames_sent, 1);
        if packet.cmd() == Cmd::Ack {
            LinkCounters::add(&self.counters.acks_sent, 1);
        }
        tracing::trace!(cmd = ?packet.cmd(), bytes = %hex_dump(&frame), "Frame sent");

        Ok(())
    }
}
