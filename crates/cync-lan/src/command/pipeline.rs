//! Command dispatch pipeline (spec.md §4.3 "command pipeline & ack
//! correlator").
//!
//! `dispatch` is the single entry point commands reach the mesh through,
//! whether they originate from an MQTT `/set` topic or from relay-mode
//! injection. It: looks up the target, deterministically picks a ready
//! bridge, applies the busy-guard (coalesce vs reject), marks
//! `pending_command`, sends the encoded packet, and awaits the ack with a
//! bounded timeout.

use std::time::Duration;

use chrono::Utc;

use cync_protocol::commands::Command;

use crate::bridge::callback::Callback;
use crate::bridge::pool::BridgePool;
use crate::command::Outcome;
use crate::error::{CyncError, CyncResult};
use crate::model::SharedRegistry;

/// Target of a dispatched command: either a single device (id fits in a
/// `u8`) or a group (spec.md §4.3 "group commands follow the identical
/// path").
#[derive(Debug, Clone, Copy)]
pub enum Target {
    Device(u8),
    Group(u16),
}

impl Target {
    fn as_u32(&self) -> u32 {
        match self {
            Target::Device(id) => *id as u32,
            Target::Group(id) => *id as u32,
        }
    }
}

pub struct CommandPipeline {
    pool: BridgePool,
    registry: SharedRegistry,
    ack_timeout: Duration,
    write_drain_timeout: Duration,
}

impl CommandPipeline {
    pub fn new(
        pool: BridgePool,
        registry: SharedRegistry,
        ack_timeout: Duration,
        write_drain_timeout: Duration,
    ) -> Self {
        CommandPipeline {
            pool,
            registry,
            ack_timeout,
            write_drain_timeout,
        }
    }

    /// Dispatch `command` at `target`, returning once it's acked,
    /// superseded, timed out, or the bridge shuts down mid-flight.
    pub async fn dispatch(&self, target: Target, command: Command) -> CyncResult<Outcome> {
        dispatch(
            &self.pool,
            &self.registry,
            target,
            command,
            self.ack_timeout,
            self.write_drain_timeout,
        )
        .await
    }
}

pub async fn dispatch(
    pool: &BridgePool,
    registry: &SharedRegistry,
    target: Target,
    command: Command,
    ack_timeout: Duration,
    write_drain_timeout: Duration,
) -> CyncResult<Outcome> {
    let target_id = target.as_u32();

    // Validate the target exists before touching any bridge state.
    let member_ids: Vec<u8> = {
        let reg = registry.lock().await;
        match target {
            Target::Device(id) => {
                if reg.device(id).is_none() {
                    return Err(CyncError::UnknownTarget { target: target_id });
                }
                vec![id]
            }
            Target::Group(id) => match reg.group(id) {
                Some(group) => group.member_ids.clone(),
                None => return Err(CyncError::UnknownTarget { target: target_id }),
            },
        }
    };

    let bridge = pool
        .select_for_target(target_id)
        .await
        .ok_or(CyncError::NoBridgesAvailable { target: target_id })?;

    // Busy guard (spec.md §4.3): power/fan/mode commands coalesce by
    // cancelling the prior in-flight callback for this target; everything
    // else (brightness/color/rgb) is rejected outright while one is
    // pending.
    let already_pending = {
        let reg = registry.lock().await;
        member_ids.iter().any(|id| {
            reg.device(*id)
                .map(|d| d.pending.is_some())
                .unwrap_or(false)
        })
    };

    if already_pending {
        if command.coalesces() {
            bridge.callbacks.lock().await.supersede(target_id);
        } else {
            return Err(CyncError::Busy { target: target_id });
        }
    }

    let msg_id = bridge.allocate_msg_id();

    let frame = cync_protocol::commands::encode_command(
        target_id_for_wire(target),
        bridge.queue_id,
        msg_id,
        &command,
    )?;

    {
        let mut reg = registry.lock().await;
        for id in &member_ids {
            if let Some(device) = reg.device_mut(*id) {
                device.begin_pending(command, msg_id, Utc::now());
            }
        }
    }

    let (tx, rx) = tokio::sync::oneshot::channel();
    bridge.callbacks.lock().await.register(Callback {
        msg_id,
        target: target_id,
        deadline: Utc::now() + chrono::Duration::from_std(ack_timeout).unwrap_or_default(),
        resolve: Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
    });

    bridge.send(&frame, write_drain_timeout).await?;

    match tokio::time::timeout(ack_timeout, rx).await {
        Ok(Ok(Outcome::Acked)) => {
            // Only a real ack folds the optimistic value into state (spec.md
            // §7 "a failed command does not modify device state").
            resolve_pending(registry, &member_ids).await;
            Ok(Outcome::Acked)
        }
        Ok(Ok(outcome)) => {
            discard_pending(registry, &member_ids).await;
            Ok(outcome)
        }
        Ok(Err(_)) => {
            // Sender dropped without resolving (bridge torn down mid-flight).
            discard_pending(registry, &member_ids).await;
            Ok(Outcome::Shutdown)
        }
        Err(_) => {
            bridge.callbacks.lock().await.remove(msg_id);
            discard_pending(registry, &member_ids).await;
            Err(CyncError::AckTimeout { target: target_id })
        }
    }
}

async fn resolve_pending(registry: &SharedRegistry, device_ids: &[u8]) {
    let mut reg = registry.lock().await;
    for id in device_ids {
        if let Some(device) = reg.device_mut(*id) {
            device.resolve_pending();
        }
    }
}

async fn discard_pending(registry: &SharedRegistry, device_ids: &[u8]) {
    let mut reg = registry.lock().await;
    for id in device_ids {
        if let Some(device) = reg.device_mut(*id) {
            device.discard_pending();
        }
    }
}

/// The wire target id carried in a `0x73` payload: the device id for a
/// direct command, or the group id for a group command (spec.md §9 "single
/// bridge-level ack authoritative" — the bridge resolves group fan-out on
/// its own side of the mesh).
fn target_id_for_wire(target: Target) -> u16 {
    match target {
        Target::Device(id) => id as u16,
        Target::Group(id) => id,
    }
}
