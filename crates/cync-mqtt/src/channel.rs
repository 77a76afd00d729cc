//! MQTT channel connected to the local broker, mirroring
//! `zc_mqtt_channel::channel`'s split between a mockable `Channel` trait and
//! the concrete `rumqttc`-backed implementation.

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS};
use serde::Serialize;

use cync_protocol::device::DeviceState;
use cync_protocol::topics;

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};
use crate::tls;

#[async_trait]
pub trait Channel: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool)
        -> MqttResult<()>;
    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()>;
    /// Disconnect from the broker (spec.md §5 "flush MQTT ... then
    /// disconnect MQTT"), the last step of an orderly shutdown.
    async fn disconnect(&self) -> MqttResult<()>;
}

/// State serialized to each `<prefix>/device/<id>/state` topic.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatePayload {
    pub on: bool,
    pub brightness: u8,
    pub color_temp: u8,
    pub rgb: (u8, u8, u8),
}

impl From<DeviceState> for DeviceStatePayload {
    fn from(state: DeviceState) -> Self {
        DeviceStatePayload {
            on: state.on,
            brightness: state.brightness,
            color_temp: state.color_temp,
            rgb: state.rgb,
        }
    }
}

pub struct MqttChannel {
    client: AsyncClient,
    topic_prefix: String,
    discovery_prefix: String,
}

impl MqttChannel {
    /// Build the channel and its eventloop. The bridge's LWT is set on
    /// `bridge/availability` so a crash is visible to Home Assistant
    /// without an explicit disconnect publish (spec.md §4.5 "LWT").
    pub fn new(config: &MqttConfig) -> MqttResult<(Self, EventLoop)> {
        let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(std::time::Duration::from_secs(config.keepalive_secs.into()));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let transport = tls::load_transport(config)?;
        options.set_transport(transport);

        let will_topic = topics::bridge_availability(&config.topic_prefix);
        options.set_last_will(LastWill::new(will_topic, "offline", QoS::AtLeastOnce, true));

        let (client, eventloop) = AsyncClient::new(options, 64);

        Ok((
            Self {
                client,
                topic_prefix: config.topic_prefix.clone(),
                discovery_prefix: config.discovery_prefix.clone(),
            },
            eventloop,
        ))
    }

    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    // ── Typed publish helpers ─────────────────────────────────

    pub async fn publish_device_state(&self, device_id: u8, state: DeviceState) -> MqttResult<()> {
        let topic = topics::device_state(&self.topic_prefix, device_id);
        self.publish_json(&topic, &DeviceStatePayload::from(state), true)
            .await
    }

    pub async fn publish_device_availability(&self, device_id: u8, online: bool) -> MqttResult<()> {
        let topic = topics::device_availability(&self.topic_prefix, device_id);
        let payload = if online { "online" } else { "offline" };
        self.publish(topic.as_str(), payload.as_bytes(), QoS::AtLeastOnce, true)
            .await
    }

    pub async fn publish_group_state(&self, group_id: u16, state: DeviceState) -> MqttResult<()> {
        let topic = topics::group_state(&self.topic_prefix, group_id);
        self.publish_json(&topic, &DeviceStatePayload::from(state), true)
            .await
    }

    pub async fn publish_group_availability(&self, group_id: u16, online: bool) -> MqttResult<()> {
        let topic = topics::group_availability(&self.topic_prefix, group_id);
        let payload = if online { "online" } else { "offline" };
        self.publish(topic.as_str(), payload.as_bytes(), QoS::AtLeastOnce, true)
            .await
    }

    pub async fn publish_bridge_availability(&self, online: bool) -> MqttResult<()> {
        let topic = topics::bridge_availability(&self.topic_prefix);
        let payload = if online { "online" } else { "offline" };
        self.publish(topic.as_str(), payload.as_bytes(), QoS::AtLeastOnce, true)
            .await
    }

    pub async fn publish_discovery(&self, component: &str, object_id: &str, document: &serde_json::Value) -> MqttResult<()> {
        let topic = topics::discovery_config(&self.discovery_prefix, component, object_id);
        self.publish_json(&topic, document, true).await
    }

    // ── Subscriptions ──────────────────────────────────────────

    pub async fn subscribe_device_set(&self) -> MqttResult<()> {
        self.subscribe(&topics::device_set_wildcard(&self.topic_prefix), QoS::AtLeastOnce)
            .await
    }

    pub async fn subscribe_group_set(&self) -> MqttResult<()> {
        self.subscribe(&topics::group_set_wildcard(&self.topic_prefix), QoS::AtLeastOnce)
            .await
    }

    pub async fn subscribe_bridge_entity_set(&self, entity: &str) -> MqttResult<()> {
        let topic = topics::bridge_entity_set(&self.topic_prefix, entity);
        self.subscribe(&topic, QoS::AtLeastOnce).await
    }

    async fn publish_json<T: Serialize>(&self, topic: &str, payload: &T, retain: bool) -> MqttResult<()> {
        let bytes = serde_json::to_vec(payload).map_err(|e| MqttError::Serialization(e.to_string()))?;
        self.publish(topic, &bytes, QoS::AtLeastOnce, retain).await
    }
}

#[async_trait]
impl Channel for MqttChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> MqttResult<()> {
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        self.client
            .subscribe(filter, qos)
            .await
            .map_err(|e| MqttError::Subscribe(e.to_string()))
    }

    async fn disconnect(&self) -> MqttResult<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))
    }
}
