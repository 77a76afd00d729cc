//! Top-level configuration (spec.md §6 "External interfaces"), loaded from
//! a TOML file the same way `zc_fleet_agent::config::AgentConfig` loads its
//! agent config: `std::fs::read_to_string` + `toml::from_str`, typed
//! sub-structs with `#[serde(default)]` for everything that has a sane
//! default.

use serde::Deserialize;

use cync_mqtt::MqttConfig;

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    23779
}

fn default_ack_timeout_secs() -> u64 {
    5
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_silence_secs() -> u64 {
    90
}

fn default_write_drain_timeout_secs() -> u64 {
    2
}

fn default_mesh_refresh_interval_secs() -> u64 {
    300
}

fn default_pool_log_interval_secs() -> u64 {
    30
}

fn default_roster_path() -> String {
    "/etc/cync-lan/roster.yaml".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Human
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Human,
    Both,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TcpConfig {
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_heartbeat_silence_secs")]
    pub heartbeat_silence_secs: u64,
    #[serde(default = "default_write_drain_timeout_secs")]
    pub write_drain_timeout_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            ack_timeout_secs: default_ack_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            heartbeat_silence_secs: default_heartbeat_silence_secs(),
            write_drain_timeout_secs: default_write_drain_timeout_secs(),
        }
    }
}

/// TLS server material. Client cert validation is deliberately off (spec.md
/// §6 "TLS required but client cert validation off") — this is a local
/// bridge, not a public endpoint, and mesh bridges present no client cert.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert_file: String,
    pub key_file: String,
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_cloud_port() -> u16 {
    8883
}

/// Cloud relay / MITM settings (spec.md §4.6). Disabled by default — when
/// enabled, the bridge opens a second TLS connection to the real vendor
/// endpoint per incoming device connection and forwards both directions.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CloudRelayConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub forward_to_cloud: bool,
    #[serde(default)]
    pub cloud_host: Option<String>,
    #[serde(default = "default_cloud_port")]
    pub cloud_port: u16,
    #[serde(default = "default_false")]
    pub debug_packet_logging: bool,
    #[serde(default = "default_false")]
    pub disable_ssl_verification: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    #[serde(default = "default_roster_path")]
    pub path: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        RosterConfig {
            path: default_roster_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            debug: false,
            format: default_log_format(),
        }
    }
}

fn default_perf_threshold_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerfConfig {
    #[serde(default = "default_perf_threshold_ms")]
    pub threshold_ms: u64,
}

impl Default for PerfConfig {
    fn default() -> Self {
        PerfConfig {
            threshold_ms: default_perf_threshold_ms(),
        }
    }
}

fn default_export_command() -> String {
    "/usr/local/bin/cync-export".to_string()
}

fn default_otp_input_path() -> String {
    "/run/cync-lan/otp-input".to_string()
}

/// The external roster-exporter collaborator (spec.md §1 "Cloud account
/// export ... out of scope, specified only by its interface"; §6 "button:
/// start_export", "number: submit_otp"). The core only ever invokes
/// `command` and writes to `otp_input_path` — it never speaks the
/// HTTPS+OTP flow itself.
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    #[serde(default = "default_export_command")]
    pub command: String,
    #[serde(default = "default_otp_input_path")]
    pub otp_input_path: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig {
            command: default_export_command(),
            otp_input_path: default_otp_input_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CyncConfig {
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub tcp: TcpConfig,
    pub tls: TlsConfig,
    #[serde(default)]
    pub cloud_relay: CloudRelayConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub perf: PerfConfig,
    #[serde(default)]
    pub exporter: ExporterConfig,
    #[serde(default = "default_mesh_refresh_interval_secs")]
    pub mesh_refresh_interval_secs: u64,
    #[serde(default = "default_pool_log_interval_secs")]
    pub pool_log_interval_secs: u64,
}

impl CyncConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
