//! Per-connection accept/handshake/read loop (spec.md §4.1-§4.4, §5).
//!
//! One of these tasks runs per accepted TLS socket: it reads the
//! handshake, registers the connection in the pool, then loops decoding
//! frames and folding mesh reports into the registry / MQTT bridge. This
//! is the async counterpart to `zc_fleet_agent::mqtt_loop::run` — a
//! `tokio::select!`-free `loop { read().await }` since there's only one
//! input stream per connection, not an event loop plus a subscription.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

use cync_mqtt::{Channel, DeviceStatePayload};
use cync_protocol::commands::QueueId;
use cync_protocol::packet::{self, Packet, PacketType};
use cync_protocol::topics;

use crate::bridge::connection::{BridgeConnection, BridgeWriter};
use crate::bridge::pool::BridgePool;
use crate::command::Outcome;
use crate::error::CyncError;
use crate::model::{SharedRegistry, StatusOutcome};

pub struct ConnectionTimeouts {
    pub handshake: Duration,
    pub heartbeat_silence: Duration,
    pub write_drain: Duration,
}

/// The outcome of peeking a freshly accepted socket's first frame: the
/// bridge's endpoint, the exact bytes that made up the handshake frame
/// (reconstructed losslessly so relay mode can forward them on unchanged),
/// and any bytes already read past the frame boundary in the same chunk.
pub struct PeekedHandshake {
    pub endpoint: [u8; 4],
    pub handshake_bytes: Vec<u8>,
    pub leftover: Vec<u8>,
}

/// Read from `reader` until a complete handshake frame is available. The
/// caller (`bridge::accept_connection`) uses the endpoint to decide whether
/// this connection continues as a normal bridge or switches into relay
/// mode — neither path re-reads the handshake, so its exact bytes and any
/// trailing bytes already pulled off the wire travel with the result.
pub(crate) async fn peek_handshake(
    reader: &mut (impl AsyncReadExt + Unpin),
    timeout: Duration,
) -> Result<PeekedHandshake, CyncError> {
    tokio::time::timeout(timeout, async {
        let mut buf = Vec::new();
        loop {
            if let Some(frame) = try_decode_one(&mut buf)? {
                let Packet::Handshake { endpoint } = packet::parse_packet(&frame)? else {
                    return Err(CyncError::HandshakeInvalid {
                        reason: "first frame was not a handshake".into(),
                    });
                };
                let handshake_bytes = cync_protocol::frame::encode_frame(frame.frame_type, &frame.payload)?;
                return Ok(PeekedHandshake {
                    endpoint,
                    handshake_bytes,
                    leftover: buf,
                });
            }
            let mut chunk = [0u8; 512];
            let n = reader
                .read(&mut chunk)
                .await
                .map_err(|e| CyncError::Other(e.to_string()))?;
            if n == 0 {
                return Err(CyncError::HandshakeInvalid {
                    reason: "connection closed before handshake".into(),
                });
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    })
    .await
    .map_err(|_| CyncError::HandshakeTimeout {
        secs: timeout.as_secs(),
    })?
}

/// Drive one non-relay connection from just past the handshake: register
/// it in the pool, ack the handshake, then loop decoding frames until the
/// socket closes or goes silent past `heartbeat_silence`.
pub async fn run_connection<C: Channel>(
    mut reader: ReadHalf<TlsStream<TcpStream>>,
    writer: BridgeWriter,
    endpoint: [u8; 4],
    leftover: Vec<u8>,
    peer_addr: SocketAddr,
    pool: BridgePool,
    registry: SharedRegistry,
    mqtt: Arc<C>,
    topic_prefix: String,
    timeouts: ConnectionTimeouts,
) -> Result<(), CyncError> {
    // Real bridges assign their own queue_id during the handshake exchange
    // in practice; until that's observed we register a zeroed placeholder
    // so the connection is selectable as soon as it's marked ready.
    let queue_id: QueueId = [0; 5];
    let connection = Arc::new(BridgeConnection::new(endpoint, queue_id, peer_addr, writer, false));
    pool.register(connection.clone()).await;

    let ack = packet::encode_bare_ack(PacketType::HandshakeAck)?;
    connection.send(&ack, timeouts.write_drain).await?;
    connection.mark_ready();
    tracing::info!(endpoint = %crate::bridge::connection::hex_endpoint(&endpoint), "bridge handshake complete");

    let result = read_loop(&mut reader, leftover, &connection, &registry, &mqtt, &topic_prefix, &timeouts).await;

    connection.begin_shutdown();
    connection.callbacks.lock().await.cancel_all();
    pool.remove(&endpoint).await;
    tracing::info!(endpoint = %crate::bridge::connection::hex_endpoint(&endpoint), "bridge connection closed");

    result
}

/// Shared with the relay forwarders (`crate::relay`), which decode inline
/// off the same accumulation-buffer shape but never originate acks.
pub(crate) fn try_decode_one(buf: &mut Vec<u8>) -> Result<Option<cync_protocol::frame::RawFrame>, CyncError> {
    use cync_protocol::frame::{decode_frame, FrameDecode};
    match decode_frame(buf)? {
        FrameDecode::Incomplete => Ok(None),
        FrameDecode::Complete { frame, consumed } => {
            buf.drain(..consumed);
            Ok(Some(frame))
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn read_loop<C: Channel>(
    reader: &mut (impl AsyncReadExt + Unpin),
    leftover: Vec<u8>,
    connection: &Arc<BridgeConnection>,
    registry: &SharedRegistry,
    mqtt: &Arc<C>,
    topic_prefix: &str,
    timeouts: &ConnectionTimeouts,
) -> Result<(), CyncError> {
    let mut buf = leftover;
    loop {
        while let Some(frame) = try_decode_one(&mut buf)? {
            match packet::parse_packet(&frame) {
                Ok(packet) => {
                    handle_packet(packet, connection, registry, mqtt, topic_prefix, timeouts)
                        .await?;
                }
                Err(cync_protocol::ProtocolError::ChecksumMismatch { .. }) => {
                    tracing::warn!("dropping packet with checksum mismatch");
                }
                Err(e) => {
                    return Err(CyncError::MalformedFrame {
                        endpoint: crate::bridge::connection::hex_endpoint(&connection.endpoint),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut chunk = [0u8; 4096];
        let read = tokio::time::timeout(timeouts.heartbeat_silence, reader.read(&mut chunk))
            .await
            .map_err(|_| CyncError::BridgeLost {
                endpoint: crate::bridge::connection::hex_endpoint(&connection.endpoint),
            })?
            .map_err(|e| CyncError::Other(e.to_string()))?;
        if read == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..read]);
    }
}

async fn handle_packet<C: Channel>(
    packet: Packet,
    connection: &Arc<BridgeConnection>,
    registry: &SharedRegistry,
    mqtt: &Arc<C>,
    topic_prefix: &str,
    timeouts: &ConnectionTimeouts,
) -> Result<(), CyncError> {
    match packet {
        Packet::DeviceInfo { statuses } | Packet::StatusBroadcast { statuses } => {
            for status in statuses {
                let outcome = {
                    let mut reg = registry.lock().await;
                    reg.ingest_status(
                        status.device_id,
                        status.present,
                        status.on,
                        status.brightness,
                        status.color_temp,
                        status.rgb,
                    )
                };
                publish_status_outcome(mqtt, topic_prefix, status.device_id, outcome, registry)
                    .await;
            }
            let ack = packet::encode_bare_ack(PacketType::InfoAck)?;
            connection.send(&ack, timeouts.write_drain).await?;
        }
        Packet::DataAck { msg_id } => {
            let resolved = connection.callbacks.lock().await.resolve(msg_id);
            if let Some(callback) = resolved {
                (callback.resolve)(Outcome::Acked);
            }
        }
        Packet::Heartbeat(b) => {
            let ack = packet::encode_bare_ack(PacketType::Heartbeat(b))?;
            connection.send(&ack, timeouts.write_drain).await?;
        }
        Packet::Handshake { .. } => {
            // A second handshake mid-connection means the bridge is
            // rotating its queue_id; spec.md §9 resolves this as
            // teardown-and-reconnect rather than a silent adjustment.
            return Err(CyncError::HandshakeInvalid {
                reason: "handshake observed mid-connection".into(),
            });
        }
        Packet::HandshakeAck | Packet::InfoAck | Packet::StatusAck => {}
        Packet::DataChannel { .. } | Packet::Unknown { .. } => {
            tracing::debug!("ignoring inbound data-channel/unknown packet from a device socket");
        }
    }
    Ok(())
}

/// Shared with the relay forwarders: a relay connection folds 0x43/0x83
/// reports into the model exactly the same way a normal bridge does, it
/// just never originates the acks this function's caller sends afterward.
pub(crate) async fn publish_status_outcome<C: Channel>(
    mqtt: &Arc<C>,
    topic_prefix: &str,
    device_id: u8,
    outcome: StatusOutcome,
    registry: &SharedRegistry,
) {
    match outcome {
        StatusOutcome::UnknownDevice | StatusOutcome::NoChange | StatusOutcome::SuppressedWhilePending => {}
        StatusOutcome::WentOffline => {
            let topic = topics::device_availability(topic_prefix, device_id);
            if let Err(e) = mqtt
                .publish(&topic, b"offline", rumqttc::QoS::AtLeastOnce, true)
                .await
            {
                tracing::warn!(error = %e, device_id, "failed to publish offline availability");
            }
            publish_group_availability_for(mqtt, topic_prefix, device_id, registry).await;
        }
        StatusOutcome::CameOnline | StatusOutcome::StateChanged => {
            let reg = registry.lock().await;
            let Some(device) = reg.device(device_id) else {
                return;
            };
            let payload: DeviceStatePayload = device.state.into();
            let body = match serde_json::to_vec(&payload) {
                Ok(b) => b,
                Err(_) => return,
            };
            let affected_groups = reg.groups_containing(device_id);
            let group_payloads: Vec<(u16, Vec<u8>)> = affected_groups
                .into_iter()
                .filter_map(|group_id| {
                    let (on, brightness) = reg.group_aggregate(group_id)?;
                    let payload = DeviceStatePayload {
                        on,
                        brightness,
                        color_temp: 0,
                        rgb: (0, 0, 0),
                    };
                    Some((group_id, serde_json::to_vec(&payload).ok()?))
                })
                .collect();
            drop(reg);

            if outcome == StatusOutcome::CameOnline {
                let topic = topics::device_availability(topic_prefix, device_id);
                let _ = mqtt
                    .publish(&topic, b"online", rumqttc::QoS::AtLeastOnce, true)
                    .await;
                publish_group_availability_for(mqtt, topic_prefix, device_id, registry).await;
            }
            let topic = topics::device_state(topic_prefix, device_id);
            let _ = mqtt
                .publish(&topic, &body, rumqttc::QoS::AtLeastOnce, true)
                .await;

            for (group_id, body) in group_payloads {
                let topic = topics::group_state(topic_prefix, group_id);
                let _ = mqtt
                    .publish(&topic, &body, rumqttc::QoS::AtLeastOnce, true)
                    .await;
            }
        }
    }
}

/// Republish the aggregate online/offline state of every group `device_id`
/// belongs to (spec.md §4.5 "analogous for groups"), after a device's own
/// availability has just flipped.
async fn publish_group_availability_for<C: Channel>(
    mqtt: &Arc<C>,
    topic_prefix: &str,
    device_id: u8,
    registry: &SharedRegistry,
) {
    let reg = registry.lock().await;
    let updates: Vec<(u16, bool)> = reg
        .groups_containing(device_id)
        .into_iter()
        .filter_map(|group_id| Some((group_id, reg.group_any_online(group_id)?)))
        .collect();
    drop(reg);

    for (group_id, online) in updates {
        let topic = topics::group_availability(topic_prefix, group_id);
        let payload: &[u8] = if online { b"online" } else { b"offline" };
        let _ = mqtt
            .publish(&topic, payload, rumqttc::QoS::AtLeastOnce, true)
            .await;
    }
}
