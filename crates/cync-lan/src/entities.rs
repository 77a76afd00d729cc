//! The bridge's own operational MQTT entities (spec.md §4.5 "a single
//! bridge entity", §6 "Operational entities"): three buttons, three
//! binary-sensor status flags, and the OTP input `number`.
//!
//! `start_export` shells out to the external exporter the same way
//! `zc_fleet_agent::shell::run_allowed` invokes an external program —
//! `tokio::process::Command`, no shell interpretation, output captured
//! under a timeout — since the exporter's HTTPS+OTP flow is explicitly
//! out of scope here (spec.md §1).

use std::time::Duration;

use tokio::process::Command;

use crate::bridge::connection::hex_endpoint;
use crate::bridge::pool::BridgePool;
use crate::config::ExporterConfig;
use crate::error::{CyncError, CyncResult};
use crate::maintenance::send_mesh_refresh_probe;

/// The bridge-entity object ids subscribed at startup, matching the
/// `command_topic` suffixes `build_bridge_entity_discovery` publishes.
pub const ENTITY_NAMES: [&str; 4] = ["restart", "request_mesh_refresh", "start_export", "submit_otp"];

const EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEntityAction {
    Restart,
    RequestMeshRefresh,
    StartExport,
    SubmitOtp(String),
}

impl BridgeEntityAction {
    /// Parse an incoming bridge-entity `/set` payload into the action it
    /// requests. Buttons arrive as Home Assistant's conventional `PRESS`
    /// payload (bare text or `{"state":"PRESS"}`); `submit_otp` carries the
    /// OTP value itself as a `number` payload (a bare numeric/text string).
    pub fn parse(entity: &str, payload: &serde_json::Value) -> Option<Self> {
        match entity {
            "restart" => is_press(payload).then_some(BridgeEntityAction::Restart),
            "request_mesh_refresh" => is_press(payload).then_some(BridgeEntityAction::RequestMeshRefresh),
            "start_export" => is_press(payload).then_some(BridgeEntityAction::StartExport),
            "submit_otp" => payload
                .as_str()
                .or_else(|| payload.get("state").and_then(|v| v.as_str()))
                .map(|s| BridgeEntityAction::SubmitOtp(s.to_string())),
            _ => None,
        }
    }
}

fn is_press(payload: &serde_json::Value) -> bool {
    match payload.as_str() {
        Some(s) => s.eq_ignore_ascii_case("press"),
        None => payload
            .get("state")
            .and_then(|v| v.as_str())
            .map(|s| s.eq_ignore_ascii_case("press"))
            .unwrap_or(false),
    }
}

/// Broadcast a `QUERY_STATUS`-equivalent mesh-info request on every bridge
/// currently `ready_to_control`, right now rather than waiting for the next
/// periodic tick (spec.md §6 "button: request_mesh_refresh"). Reuses the
/// same per-bridge probe the periodic maintenance task runs on a timer.
pub async fn request_mesh_refresh(pool: &BridgePool, write_drain_timeout: Duration) {
    for bridge in pool.ready_bridges().await {
        if let Err(e) = send_mesh_refresh_probe(&bridge, write_drain_timeout).await {
            tracing::warn!(
                endpoint = %hex_endpoint(&bridge.endpoint),
                error = %e,
                "on-demand mesh refresh probe failed"
            );
        }
    }
}

/// Invoke the external exporter binary to refresh the roster (spec.md §6
/// "button: start_export"). The exporter's own HTTPS+OTP conversation with
/// the vendor cloud is out of scope; this only launches it and reports
/// whether it exited successfully.
pub async fn start_export(config: &ExporterConfig) -> CyncResult<()> {
    let output = tokio::time::timeout(EXPORT_TIMEOUT, Command::new(&config.command).output())
        .await
        .map_err(|_| CyncError::Other(format!("exporter '{}' timed out", config.command)))?
        .map_err(|e| CyncError::Other(format!("failed to launch exporter '{}': {e}", config.command)))?;

    if !output.status.success() {
        return Err(CyncError::Other(format!(
            "exporter '{}' exited with {}",
            config.command, output.status
        )));
    }
    Ok(())
}

/// Write the OTP value to the exporter's one-shot input file (spec.md §6
/// "number: submit_otp — writes the OTP to the exporter's one-shot
/// input"). Overwrites any previous value; the exporter is responsible for
/// consuming and clearing it.
pub async fn submit_otp(config: &ExporterConfig, otp: &str) -> CyncResult<()> {
    tokio::fs::write(&config.otp_input_path, otp)
        .await
        .map_err(|e| CyncError::Other(format!("failed to write OTP input '{}': {e}", config.otp_input_path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_press_string_parses_as_restart() {
        let action = BridgeEntityAction::parse("restart", &json!("PRESS"));
        assert_eq!(action, Some(BridgeEntityAction::Restart));
    }

    #[test]
    fn json_press_object_also_parses() {
        let action = BridgeEntityAction::parse("request_mesh_refresh", &json!({"state": "press"}));
        assert_eq!(action, Some(BridgeEntityAction::RequestMeshRefresh));
    }

    #[test]
    fn non_press_payload_is_ignored() {
        let action = BridgeEntityAction::parse("restart", &json!("OFF"));
        assert_eq!(action, None);
    }

    #[test]
    fn submit_otp_carries_the_numeric_value() {
        let action = BridgeEntityAction::parse("submit_otp", &json!("123456"));
        assert_eq!(action, Some(BridgeEntityAction::SubmitOtp("123456".to_string())));
    }

    #[test]
    fn unknown_entity_parses_to_none() {
        assert_eq!(BridgeEntityAction::parse("unknown", &json!("PRESS")), None);
    }
}
