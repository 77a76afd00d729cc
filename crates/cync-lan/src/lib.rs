//! Local mesh-lighting bridge: TLS device listener, bridge pool, command
//! pipeline, and MQTT bridge for the Cync family of Wi-Fi mesh devices.
//!
//! This crate is both a library (so `cync-e2e-tests` can drive the
//! accept loop, command pipeline, and registry through their public
//! APIs) and a binary (`src/main.rs`) that wires everything into a
//! running process.

pub mod app;
pub mod bridge;
pub mod command;
pub mod config;
pub mod entities;
pub mod error;
pub mod logging;
pub mod maintenance;
pub mod model;
pub mod mqtt_bridge;
pub mod relay;
pub mod roster;
pub mod tls;

pub use app::App;
pub use error::{CyncError, CyncResult};
