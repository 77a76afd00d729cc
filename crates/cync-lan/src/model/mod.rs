//! Shared model state: the device/group registry and its mutation rules.

pub mod registry;

pub use registry::{Registry, StatusOutcome};

use std::sync::Arc;

use tokio::sync::Mutex;

/// The single serialization point for all state mutations (spec.md §5).
pub type SharedRegistry = Arc<Mutex<Registry>>;

pub fn shared_registry() -> SharedRegistry {
    Arc::new(Mutex::new(Registry::new()))
}
