//! In-memory `Channel` for tests, mirroring `zc_mqtt_channel::mock`.

use async_trait::async_trait;
use rumqttc::QoS;
use std::sync::Mutex;

use crate::channel::Channel;
use crate::error::MqttResult;

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

pub struct MockChannel {
    published: Mutex<Vec<PublishedMessage>>,
    subscriptions: Mutex<Vec<(String, QoS)>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn last_published(&self) -> Option<PublishedMessage> {
        self.published.lock().unwrap().last().cloned()
    }

    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn is_subscribed_to(&self, filter: &str) -> bool {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .any(|(f, _)| f == filter)
    }

    pub fn reset(&self) {
        self.published.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> MqttResult<()> {
        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((filter.to_string(), qos));
        Ok(())
    }

    async fn disconnect(&self) -> MqttResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_records_messages() {
        let mock = MockChannel::new();
        mock.publish("cync_lan/device/1/state", b"{}", QoS::AtLeastOnce, true)
            .await
            .unwrap();

        let msgs = mock.published();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].retain);
    }

    #[tokio::test]
    async fn subscribe_records_filters() {
        let mock = MockChannel::new();
        mock.subscribe("cync_lan/device/+/set", QoS::AtLeastOnce)
            .await
            .unwrap();
        assert!(mock.is_subscribed_to("cync_lan/device/+/set"));
        assert!(!mock.is_subscribed_to("cync_lan/group/+/set"));
    }

    #[tokio::test]
    async fn published_to_filters_by_topic() {
        let mock = MockChannel::new();
        mock.publish("a", b"1", QoS::AtMostOnce, false).await.unwrap();
        mock.publish("b", b"2", QoS::AtMostOnce, false).await.unwrap();
        mock.publish("a", b"3", QoS::AtMostOnce, false).await.unwrap();
        assert_eq!(mock.published_to("a").len(), 2);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let mock = MockChannel::new();
        mock.publish("a", b"1", QoS::AtMostOnce, false).await.unwrap();
        mock.subscribe("b", QoS::AtMostOnce).await.unwrap();
        mock.reset();
        assert!(mock.published().is_empty());
        assert!(mock.subscriptions().is_empty());
    }
}
