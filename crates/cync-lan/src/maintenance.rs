//! Periodic background tasks (spec.md §4.7 "Periodic Maintenance").
//!
//! Two independent `tokio::time::interval` loops, spawned once at startup
//! and run for the process lifetime — the same shape as
//! `zc_fleet_agent::heartbeat::run`'s single interval loop, just two of
//! them side by side under `tokio::select!` in `app.rs`.

use std::sync::Arc;
use std::time::Duration;

use cync_protocol::commands::Command as WireCommand;

use crate::bridge::connection::{hex_endpoint, BridgeConnection};
use crate::bridge::pool::BridgePool;
use crate::error::CyncResult;
use crate::model::SharedRegistry;

/// No specific device/group is addressed by a mesh-info probe; `0x0000` is
/// never a valid device id (1 byte) or a valid group id (`GROUP_ID_BASE`
/// and above), so it reads unambiguously as "broadcast" on the wire.
const MESH_REFRESH_TARGET: u16 = 0x0000;

/// Send one `QUERY_STATUS` probe directly on `bridge`, bypassing the
/// command pipeline: this isn't addressed at a single device/group, so
/// there is no `pending_command` to set and no ack to correlate — replies
/// arrive as an ordinary 0x43/0x83 status report through the normal read
/// loop.
pub async fn send_mesh_refresh_probe(bridge: &BridgeConnection, write_drain_timeout: Duration) -> CyncResult<()> {
    let msg_id = bridge.allocate_msg_id();
    let frame = cync_protocol::commands::encode_command(
        MESH_REFRESH_TARGET,
        bridge.queue_id,
        msg_id,
        &WireCommand::QueryStatus,
    )?;
    bridge.send(&frame, write_drain_timeout).await
}

/// Every 300 s (configurable), probe each ready bridge in turn with a 1 s
/// spacing between them (spec.md §4.7). Devices that don't answer
/// accumulate `offline_count` through the normal ingestion path the next
/// time a status report (or its absence) is processed.
pub async fn run_mesh_refresh(pool: BridgePool, interval_secs: u64, write_drain_timeout: Duration) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        for bridge in pool.ready_bridges().await {
            if let Err(e) = send_mesh_refresh_probe(&bridge, write_drain_timeout).await {
                tracing::warn!(
                    endpoint = %hex_endpoint(&bridge.endpoint),
                    error = %e,
                    "mesh refresh probe failed"
                );
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

/// Every 30 s (configurable), log the pool's vital counts (spec.md §4.7:
/// "total connections, ready bridges, pending commands, MQTT connected").
pub async fn run_pool_logger(pool: BridgePool, registry: SharedRegistry, interval_secs: u64, mqtt_connected: Arc<std::sync::atomic::AtomicBool>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        let total = pool.len().await;
        let ready = pool.ready_count().await;
        let reconnects = pool.total_reconnects().await;
        let pending = {
            let reg = registry.lock().await;
            reg.devices().filter(|d| d.pending.is_some()).count()
        };
        tracing::info!(
            total_connections = total,
            ready_bridges = ready,
            pending_commands = pending,
            reconnects,
            mqtt_connected = mqtt_connected.load(std::sync::atomic::Ordering::Relaxed),
            "pool status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_refresh_target_is_outside_both_id_spaces() {
        assert!(MESH_REFRESH_TARGET < 1);
        assert_ne!(MESH_REFRESH_TARGET, cync_protocol::device::GROUP_ID_BASE);
    }
}
