//! S4: dispatching a command to a known target with no ready bridge in the
//! pool fails fast with `NoBridgesAvailable`, and never marks anything
//! pending on the way there.

use std::time::Duration;

use cync_lan::bridge::pool::BridgePool;
use cync_lan::command::{dispatch, Target};
use cync_lan::model::shared_registry;
use cync_lan::CyncError;
use cync_protocol::commands::Command;
use cync_protocol::device::{Device, DeviceKind};

#[tokio::test]
async fn dispatch_with_an_empty_pool_fails_without_touching_device_state() {
    let registry = shared_registry();
    {
        let mut reg = registry.lock().await;
        reg.add_device(Device::new(1, "Lamp", DeviceKind::Bulb)).unwrap();
    }

    let pool = BridgePool::new();
    assert_eq!(pool.ready_count().await, 0);

    let result = dispatch(
        &pool,
        &registry,
        Target::Device(1),
        Command::Power(true),
        Duration::from_millis(50),
        Duration::from_millis(50),
    )
    .await;

    assert!(matches!(result, Err(CyncError::NoBridgesAvailable { target: 1 })));

    let reg = registry.lock().await;
    assert!(reg.device(1).unwrap().pending.is_none());
}

#[tokio::test]
async fn dispatch_to_an_unknown_target_fails_before_even_checking_the_pool() {
    let registry = shared_registry();
    let pool = BridgePool::new();

    let result = dispatch(
        &pool,
        &registry,
        Target::Device(99),
        Command::Power(true),
        Duration::from_millis(50),
        Duration::from_millis(50),
    )
    .await;

    assert!(matches!(result, Err(CyncError::UnknownTarget { target: 99 })));
}
