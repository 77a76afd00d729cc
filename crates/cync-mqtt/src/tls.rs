//! Transport selection for the broker connection, mirroring
//! `zc_mqtt_channel::tls` but for a broker that is plaintext-by-default and,
//! when TLS is enabled, verifies a CA without presenting a client
//! certificate (no mTLS — the bridge authenticates with username/password
//! instead, which `channel::MqttChannel::new` sets on `MqttOptions`
//! directly).

use rumqttc::Transport;

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};

pub fn load_transport(config: &MqttConfig) -> MqttResult<Transport> {
    if !config.use_tls {
        return Ok(Transport::Tcp);
    }

    let ca = match &config.ca_cert_path {
        Some(path) => std::fs::read(path)
            .map_err(|e| MqttError::Tls(format!("failed to read CA cert '{path}': {e}")))?,
        None => Vec::new(),
    };

    Ok(Transport::tls_with_config(rumqttc::TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> MqttConfig {
        MqttConfig {
            broker_host: "localhost".into(),
            broker_port: 1883,
            client_id: "test".into(),
            username: None,
            password: None,
            use_tls: false,
            ca_cert_path: None,
            keepalive_secs: 30,
            topic_prefix: "cync_lan".into(),
            discovery_prefix: "homeassistant".into(),
            discovery_enabled: true,
        }
    }

    #[test]
    fn plaintext_by_default() {
        let config = base_config();
        assert!(matches!(load_transport(&config).unwrap(), Transport::Tcp));
    }

    #[test]
    fn missing_ca_cert_file_is_an_error() {
        let mut config = base_config();
        config.use_tls = true;
        config.ca_cert_path = Some("/nonexistent/ca.pem".into());
        let err = load_transport(&config).unwrap_err();
        assert!(err.to_string().contains("CA cert"));
    }

    #[test]
    fn tls_without_ca_path_uses_empty_ca_bundle() {
        let mut config = base_config();
        config.use_tls = true;
        assert!(load_transport(&config).is_ok());
    }
}
