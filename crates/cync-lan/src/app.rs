//! Top-level orchestrator: load config and roster, stand up the TLS
//! listener, the MQTT channel, and the periodic maintenance tasks, then
//! run them all side by side until shutdown (spec.md §5 "Concurrency
//! model").
//!
//! This is the `cync-lan` counterpart to `zc_fleet_agent::main`'s
//! `tokio::select!` of the MQTT loop, the heartbeat loop, and
//! `ctrl_c()` — generalized to the larger set of concurrent tasks a
//! mesh bridge needs: one accept loop, one task per live connection, the
//! MQTT event loop, and two maintenance tickers.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use cync_mqtt::MqttChannel;

use crate::bridge::handler::ConnectionTimeouts;
use crate::bridge::pool::BridgePool;
use crate::config::CyncConfig;
use crate::error::{CyncError, CyncResult};
use crate::model::{shared_registry, SharedRegistry};
use crate::mqtt_bridge::EntityContext;
use crate::roster::ExpectedBridge;

/// Everything `App::run` needs that was built before the process can
/// start accepting connections: the parsed config, the roster-seeded
/// registry, the list of bridges the roster expects to see dial in, and
/// the TLS acceptor for the device-facing listener.
pub struct App {
    config: CyncConfig,
    registry: SharedRegistry,
    expected_bridges: Arc<Vec<ExpectedBridge>>,
    acceptor: TlsAcceptor,
}

impl App {
    /// Load the config file, read the roster, and build the TLS acceptor.
    /// Nothing is bound or connected yet — that happens in `run`.
    pub fn bootstrap(config_path: &str) -> CyncResult<Self> {
        let config = CyncConfig::from_file(config_path).map_err(|e| CyncError::ConfigInvalid(e.to_string()))?;

        let roster = crate::roster::load(&config.roster.path)?;
        let registry = shared_registry();
        {
            let built = crate::roster::build_registry(&roster)?;
            // Swap the freshly built registry into the shared cell rather
            // than constructing `Arc<Mutex<_>>` twice — `shared_registry`
            // exists so callers never build a bare `Registry` themselves.
            let mut guard = registry.try_lock().expect("uncontended at startup");
            *guard = built;
        }
        let expected_bridges = Arc::new(crate::roster::expected_bridges(&roster)?);

        let acceptor = crate::tls::build_acceptor(&config.tls)?;

        Ok(App {
            config,
            registry,
            expected_bridges,
            acceptor,
        })
    }

    /// Run the bridge until a shutdown is requested (via the `restart`
    /// bridge entity) or a SIGINT/SIGTERM arrives. Returns once every
    /// concurrent task has been asked to stop; a caller that wants a
    /// process restart should re-invoke `bootstrap` + `run` in a loop.
    pub async fn run(self) -> CyncResult<()> {
        crate::logging::init(&self.config.log);
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "cync-lan starting");

        let (mqtt, eventloop) =
            MqttChannel::new(&self.config.mqtt).map_err(CyncError::Mqtt)?;
        let mqtt = Arc::new(mqtt);

        crate::mqtt_bridge::publish_discovery(&mqtt, &self.registry).await?;
        crate::mqtt_bridge::subscribe_all(&mqtt).await?;
        crate::mqtt_bridge::republish_retained_state(&mqtt, &self.registry).await?;

        let pool = BridgePool::new();
        let mqtt_connected = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(tokio::sync::Notify::new());

        let write_drain_timeout = Duration::from_secs(self.config.tcp.write_drain_timeout_secs);
        let ack_timeout = Duration::from_secs(self.config.tcp.ack_timeout_secs);

        let entity_ctx = EntityContext {
            exporter: self.config.exporter.clone(),
            shutdown: shutdown.clone(),
            write_drain_timeout,
        };

        let listener = TcpListener::bind((self.config.tcp.listen_host.as_str(), self.config.tcp.listen_port))
            .await
            .map_err(|e| CyncError::Other(format!("failed to bind {}:{}: {e}", self.config.tcp.listen_host, self.config.tcp.listen_port)))?;
        tracing::info!(host = %self.config.tcp.listen_host, port = self.config.tcp.listen_port, "listening for device connections");

        tokio::select! {
            () = accept_loop(
                listener,
                self.acceptor.clone(),
                pool.clone(),
                self.registry.clone(),
                mqtt.clone(),
                self.config.mqtt.topic_prefix.clone(),
                self.expected_bridges.clone(),
                self.config.cloud_relay.clone(),
                ConnectionTimeouts {
                    handshake: Duration::from_secs(self.config.tcp.handshake_timeout_secs),
                    heartbeat_silence: Duration::from_secs(self.config.tcp.heartbeat_silence_secs),
                    write_drain: write_drain_timeout,
                },
            ) => {
                tracing::error!("accept loop exited unexpectedly");
            }
            () = crate::mqtt_bridge::run(
                eventloop,
                self.config.mqtt.topic_prefix.clone(),
                pool.clone(),
                self.registry.clone(),
                ack_timeout,
                write_drain_timeout,
                entity_ctx,
            ) => {
                tracing::error!("mqtt event loop exited unexpectedly");
            }
            () = crate::maintenance::run_mesh_refresh(pool.clone(), self.config.mesh_refresh_interval_secs, write_drain_timeout) => {
                tracing::error!("mesh refresh loop exited unexpectedly");
            }
            () = crate::maintenance::run_pool_logger(pool.clone(), self.registry.clone(), self.config.pool_log_interval_secs, mqtt_connected.clone()) => {
                tracing::error!("pool logger exited unexpectedly");
            }
            () = shutdown.notified() => {
                tracing::info!("restart requested via bridge entity");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
            }
        }

        // Orderly shutdown (spec.md §5 "stop accept → close all bridges
        // (each bridge's teardown cancels its pending callbacks with
        // `shutdown`) → flush MQTT ... → disconnect MQTT"). The accept
        // loop and connection tasks are dropped with the runtime on return
        // from `run`; closing bridges and flushing MQTT first still lets
        // Home Assistant observe a clean offline transition rather than an
        // LWT firing on an already-dead connection.
        pool.shutdown_all().await;
        crate::mqtt_bridge::shutdown_flush(&mqtt, &self.registry).await;

        tracing::info!("cync-lan stopped");
        Ok(())
    }
}

/// Accept connections forever, spawning one task per socket so a slow or
/// wedged device can never block new connections from being accepted
/// (spec.md §5 "one task per connection").
#[allow(clippy::too_many_arguments)]
async fn accept_loop<C: cync_mqtt::Channel + 'static>(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    pool: BridgePool,
    registry: SharedRegistry,
    mqtt: Arc<C>,
    topic_prefix: String,
    expected_bridges: Arc<Vec<ExpectedBridge>>,
    cloud_relay: crate::config::CloudRelayConfig,
    timeouts_template: ConnectionTimeouts,
) {
    loop {
        let (tcp, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let pool = pool.clone();
        let registry = registry.clone();
        let mqtt = mqtt.clone();
        let topic_prefix = topic_prefix.clone();
        let expected_bridges = expected_bridges.clone();
        let cloud_relay = cloud_relay.clone();
        let timeouts = ConnectionTimeouts {
            handshake: timeouts_template.handshake,
            heartbeat_silence: timeouts_template.heartbeat_silence,
            write_drain: timeouts_template.write_drain,
        };

        tokio::spawn(async move {
            let stream = match acceptor.accept(tcp).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(error = %e, peer = %peer_addr, "tls accept failed");
                    return;
                }
            };

            if let Err(e) = crate::bridge::accept_connection(
                stream,
                peer_addr,
                expected_bridges,
                cloud_relay,
                pool,
                registry,
                mqtt,
                topic_prefix,
                timeouts,
            )
            .await
            {
                tracing::warn!(error = %e, peer = %peer_addr, "connection ended with error");
            }
        });
    }
}
