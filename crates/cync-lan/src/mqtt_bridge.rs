//! MQTT orchestration: discovery publishing and the incoming-message
//! router (spec.md §4.5).
//!
//! This is the async counterpart to `zc_fleet_agent::mqtt_loop::run` — it
//! drives the `rumqttc` event loop, classifies each incoming publish, and
//! routes it onward. Unlike the teacher, a disconnect here isn't retried
//! with a fixed sleep: the bridge's own availability LWT already tells
//! Home Assistant the service is down, so this loop just logs and keeps
//! polling, relying on `rumqttc`'s internal reconnect.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{Event, EventLoop, Packet as MqttPacket};

use cync_mqtt::discovery::{build_bridge_entity_discovery, build_device_discovery, build_group_discovery};
use cync_mqtt::{classify, Channel, IncomingMessage, MqttChannel};
use cync_protocol::device::DeviceState;

use crate::bridge::pool::BridgePool;
use crate::command::{commands_from_payload, dispatch, Target};
use crate::config::ExporterConfig;
use crate::entities::{self, BridgeEntityAction};
use crate::error::CyncError;
use crate::model::SharedRegistry;

/// Everything the bridge-entity action handlers need beyond the message
/// itself: where to launch the exporter, and how to ask the root
/// orchestrator for a restart. `shutdown` is a `Notify` rather than a bool
/// flag because "restart" (spec.md §6) is edge-triggered — the orchestrator
/// owns deciding what "re-startup" means (process exit, supervisor
/// restart) once notified.
#[derive(Clone)]
pub struct EntityContext {
    pub exporter: ExporterConfig,
    pub shutdown: Arc<tokio::sync::Notify>,
    pub write_drain_timeout: Duration,
}

/// Publish retained discovery documents for every device, every group, and
/// the bridge's own operational entities. Called once at startup and again
/// whenever the roster introduces a new entity (spec.md §4.5 "on startup
/// and on every model change that introduces a new entity").
pub async fn publish_discovery(mqtt: &MqttChannel, registry: &SharedRegistry) -> Result<(), CyncError> {
    let reg = registry.lock().await;

    for device in reg.devices() {
        for (component, object_id, document) in build_device_discovery(mqtt.topic_prefix(), device) {
            mqtt.publish_discovery(&component, &object_id, &document).await?;
        }
    }

    for group in reg.groups() {
        let members: Vec<_> = group
            .member_ids
            .iter()
            .filter_map(|id| reg.device(*id))
            .collect();
        for (component, object_id, document) in build_group_discovery(mqtt.topic_prefix(), group, &members) {
            mqtt.publish_discovery(&component, &object_id, &document).await?;
        }
    }

    for (component, object_id, document) in build_bridge_entity_discovery(mqtt.topic_prefix()) {
        mqtt.publish_discovery(&component, &object_id, &document).await?;
    }

    Ok(())
}

/// Subscribe to every topic the bridge needs to act on: device/group `set`
/// wildcards and each bridge operational entity's `set` topic.
pub async fn subscribe_all(mqtt: &MqttChannel) -> Result<(), CyncError> {
    mqtt.subscribe_device_set().await?;
    mqtt.subscribe_group_set().await?;
    for entity in entities::ENTITY_NAMES {
        mqtt.subscribe_bridge_entity_set(entity).await?;
    }
    Ok(())
}

/// Publish the bridge's own `online` availability and the retained last-
/// known state of every device/group, so a restarted Home Assistant sees
/// current state immediately rather than waiting for the next mesh report.
pub async fn republish_retained_state(mqtt: &MqttChannel, registry: &SharedRegistry) -> Result<(), CyncError> {
    mqtt.publish_bridge_availability(true).await?;

    let reg = registry.lock().await;
    for device in reg.devices() {
        mqtt.publish_device_availability(device.id, device.online).await?;
        mqtt.publish_device_state(device.id, device.state).await?;
    }
    for group in reg.groups() {
        if let Some(online) = reg.group_any_online(group.id) {
            mqtt.publish_group_availability(group.id, online).await?;
        }
        if let Some((on, brightness)) = reg.group_aggregate(group.id) {
            let state = DeviceState {
                on,
                brightness,
                ..DeviceState::default()
            };
            mqtt.publish_group_state(group.id, state).await?;
        }
    }
    Ok(())
}

/// Publish `offline` availability for every device, every group, and
/// finally the bridge itself, then disconnect (spec.md §5 "flush MQTT
/// (publish availability=offline for all entities, then bridge
/// availability=offline) → disconnect MQTT"). Called once, after every
/// bridge connection has been torn down.
pub async fn shutdown_flush(mqtt: &MqttChannel, registry: &SharedRegistry) {
    let (device_ids, group_ids): (Vec<u8>, Vec<u16>) = {
        let reg = registry.lock().await;
        (
            reg.devices().map(|d| d.id).collect(),
            reg.groups().map(|g| g.id).collect(),
        )
    };
    for device_id in device_ids {
        if let Err(e) = mqtt.publish_device_availability(device_id, false).await {
            tracing::warn!(error = %e, device_id, "failed to publish offline availability on shutdown");
        }
    }
    for group_id in group_ids {
        if let Err(e) = mqtt.publish_group_availability(group_id, false).await {
            tracing::warn!(error = %e, group_id, "failed to publish offline group availability on shutdown");
        }
    }
    if let Err(e) = mqtt.publish_bridge_availability(false).await {
        tracing::warn!(error = %e, "failed to publish bridge offline availability on shutdown");
    }
    if let Err(e) = mqtt.disconnect().await {
        tracing::warn!(error = %e, "mqtt disconnect failed during shutdown");
    }
}

/// Drive the MQTT event loop forever, dispatching every `/set` publish it
/// sees. Runs until the process shuts down; a broker disconnect is logged
/// and retried by `rumqttc` itself rather than unwinding this task.
pub async fn run(
    mut eventloop: EventLoop,
    topic_prefix: String,
    pool: BridgePool,
    registry: SharedRegistry,
    ack_timeout: Duration,
    write_drain_timeout: Duration,
    entity_ctx: EntityContext,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(MqttPacket::Publish(publish))) => {
                let msg = classify(&topic_prefix, &publish);
                handle_incoming(msg, &pool, &registry, ack_timeout, write_drain_timeout, &entity_ctx).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "mqtt event loop error");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn handle_incoming(
    msg: IncomingMessage,
    pool: &BridgePool,
    registry: &SharedRegistry,
    ack_timeout: Duration,
    write_drain_timeout: Duration,
    entity_ctx: &EntityContext,
) {
    match msg {
        IncomingMessage::DeviceSet { device_id, payload } => {
            dispatch_all(pool, registry, Target::Device(device_id), &payload, ack_timeout, write_drain_timeout).await;
        }
        IncomingMessage::GroupSet { group_id, payload } => {
            dispatch_all(pool, registry, Target::Group(group_id), &payload, ack_timeout, write_drain_timeout).await;
        }
        IncomingMessage::BridgeEntitySet { entity, payload } => {
            handle_bridge_entity(&entity, &payload, pool, entity_ctx).await;
        }
        IncomingMessage::Unknown { topic, .. } => {
            tracing::debug!(topic, "ignoring unrecognized mqtt publish");
        }
    }
}

async fn handle_bridge_entity(entity: &str, payload: &serde_json::Value, pool: &BridgePool, ctx: &EntityContext) {
    match BridgeEntityAction::parse(entity, payload) {
        Some(BridgeEntityAction::Restart) => {
            tracing::info!("restart requested via bridge entity");
            ctx.shutdown.notify_one();
        }
        Some(BridgeEntityAction::RequestMeshRefresh) => {
            tracing::info!("on-demand mesh refresh requested via bridge entity");
            entities::request_mesh_refresh(pool, ctx.write_drain_timeout).await;
        }
        Some(BridgeEntityAction::StartExport) => {
            tracing::info!("roster export requested via bridge entity");
            if let Err(e) = entities::start_export(&ctx.exporter).await {
                tracing::warn!(error = %e, "roster export failed");
            }
        }
        Some(BridgeEntityAction::SubmitOtp(otp)) => {
            tracing::info!("OTP submitted via bridge entity");
            if let Err(e) = entities::submit_otp(&ctx.exporter, &otp).await {
                tracing::warn!(error = %e, "failed to write OTP input");
            }
        }
        None => tracing::debug!(entity, "unrecognized bridge entity or payload"),
    }
}

async fn dispatch_all(
    pool: &BridgePool,
    registry: &SharedRegistry,
    target: Target,
    payload: &serde_json::Value,
    ack_timeout: Duration,
    write_drain_timeout: Duration,
) {
    for command in commands_from_payload(payload) {
        match dispatch(pool, registry, target, command, ack_timeout, write_drain_timeout).await {
            Ok(outcome) => tracing::debug!(?outcome, ?command, "command dispatched"),
            Err(e) => tracing::warn!(error = %e, ?command, "command dispatch failed"),
        }
    }
}
