//! MQTT connection configuration (spec.md §6 "External interfaces").
//!
//! Unlike the teacher's AWS IoT Core config — always mTLS, always a cloud
//! endpoint — a Cync bridge's MQTT broker is typically a local Home
//! Assistant/Mosquitto instance, so TLS defaults off and username/password
//! auth is the common case. The `serde(default = ...)` idiom is kept as-is.

use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    1883
}

fn default_keepalive() -> u16 {
    30
}

fn default_topic_prefix() -> String {
    "cync_lan".to_string()
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

fn default_discovery_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MqttConfig {
    pub broker_host: String,
    #[serde(default = "default_port")]
    pub broker_port: u16,
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub ca_cert_path: Option<String>,
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    #[serde(default = "default_discovery_enabled")]
    pub discovery_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_config_with_defaults() {
        let toml = r#"
broker_host = "localhost"
client_id = "cync-lan-bridge"
"#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker_port, 1883);
        assert!(!config.use_tls);
        assert_eq!(config.keepalive_secs, 30);
        assert_eq!(config.topic_prefix, "cync_lan");
        assert_eq!(config.discovery_prefix, "homeassistant");
        assert!(config.discovery_enabled);
        assert!(config.username.is_none());
    }

    #[test]
    fn deserializes_explicit_overrides() {
        let toml = r#"
broker_host = "mqtt.local"
broker_port = 8883
client_id = "bridge-1"
username = "cync"
password = "hunter2"
use_tls = true
ca_cert_path = "/etc/cync-lan/ca.pem"
discovery_enabled = false
"#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker_port, 8883);
        assert!(config.use_tls);
        assert_eq!(config.username.as_deref(), Some("cync"));
        assert!(!config.discovery_enabled);
    }
}
