//! MQTT bridge for cync-lan.
//!
//! - `Channel` trait for publish/subscribe (mockable in tests)
//! - `MqttChannel` for the real broker connection
//! - `MockChannel` for testing without a broker
//! - `discovery` for Home Assistant MQTT-discovery documents
//! - `handler::classify` for dispatching incoming `set`/command messages

pub mod channel;
pub mod config;
pub mod discovery;
pub mod error;
pub mod handler;
pub mod mock;
pub mod tls;

pub use channel::{Channel, DeviceStatePayload, MqttChannel};
pub use config::MqttConfig;
pub use error::{MqttError, MqttResult};
pub use handler::{classify, IncomingMessage};
pub use mock::MockChannel;
