//! Transparent MITM relay (spec.md §4.6 "Relay Mode (MITM)").
//!
//! Instead of running the handshake and ack logic locally the way
//! `bridge::handler::run_connection` does, a relay connection dials the real
//! vendor endpoint and runs two independent forwarders, device→cloud and
//! cloud→device. Each decodes frames inline, best-effort, purely to feed
//! status reports into the model and the MQTT bridge the normal way — it
//! never constructs an outbound command or an ack of its own. Bytes are
//! always written to their destination before being inspected, so a
//! malformed frame still crosses the wire unmodified; only the inline
//! parse's accounting is affected.
//!
//! The relay registers an ordinary `BridgeConnection` with `is_relay=true`
//! in the same pool a normal bridge uses, purely so pool-wide logging
//! (`maintenance::run_pool_logger`) counts it; `mark_ready`/`is_ready`
//! already guarantee the command pipeline's selection step
//! (`bridge::pool::select_for_target`) can never pick it.

pub mod injection;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::net::SocketAddr;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream as ClientTlsStream, server::TlsStream as ServerTlsStream, TlsConnector};

use cync_mqtt::Channel;
use cync_protocol::frame::RawFrame;
use cync_protocol::packet::{self, Packet};

use crate::bridge::connection::{hex_endpoint, BridgeConnection, BridgeWriter};
use crate::bridge::handler::{publish_status_outcome, try_decode_one};
use crate::bridge::pool::BridgePool;
use crate::config::CloudRelayConfig;
use crate::error::{CyncError, CyncResult};
use crate::model::SharedRegistry;

/// Malformed-packet counters for one relay connection, per direction
/// (spec.md §4.6 "malformed packets are forwarded as raw bytes and
/// counted").
#[derive(Default)]
pub struct RelayStats {
    pub malformed_device_to_cloud: AtomicU64,
    pub malformed_cloud_to_device: AtomicU64,
}

/// Handle one accepted device connection in relay mode from just past the
/// handshake: dial the real vendor endpoint, forward the handshake bytes
/// and anything already read past them, register a never-ready bridge
/// entry under the bridge's real (handshake-observed) endpoint, then run
/// both forwarders plus the injection watcher until either side closes.
///
/// `endpoint`/`handshake_bytes`/`leftover` all come from
/// `bridge::handler::peek_handshake`, run once by the accept dispatcher
/// before it decides relay vs. normal mode — this function never re-reads
/// or re-derives the handshake, it only forwards what was already peeked.
#[allow(clippy::too_many_arguments)]
pub async fn run_relay_connection<C: Channel>(
    device_read: ReadHalf<ServerTlsStream<TcpStream>>,
    device_write: BridgeWriter,
    endpoint: [u8; 4],
    handshake_bytes: Vec<u8>,
    leftover: Vec<u8>,
    peer_addr: SocketAddr,
    pool: BridgePool,
    registry: SharedRegistry,
    mqtt: Arc<C>,
    topic_prefix: String,
    config: CloudRelayConfig,
    write_drain_timeout: Duration,
) -> CyncResult<()> {
    let cloud_host = config.cloud_host.clone().ok_or_else(|| {
        CyncError::ConfigInvalid("cloud_relay.enabled but cloud_relay.cloud_host is unset".into())
    })?;

    if config.disable_ssl_verification {
        tracing::warn!(
            cloud_host = %cloud_host,
            peer = %peer_addr,
            "relay dialing vendor cloud with TLS certificate verification DISABLED"
        );
    }

    let cloud_stream = dial_cloud(&cloud_host, config.cloud_port, config.disable_ssl_verification).await?;
    let (cloud_read, mut cloud_write) = tokio::io::split(cloud_stream);

    // Forward the already-peeked handshake frame, then whatever trailing
    // bytes arrived in the same chunk, before either forwarder starts —
    // this preserves TCP order without re-reading anything off the device
    // socket.
    cloud_write
        .write_all(&handshake_bytes)
        .await
        .map_err(|e| CyncError::Other(e.to_string()))?;
    if !leftover.is_empty() {
        cloud_write
            .write_all(&leftover)
            .await
            .map_err(|e| CyncError::Other(e.to_string()))?;
    }
    cloud_write.flush().await.map_err(|e| CyncError::Other(e.to_string()))?;

    let connection = Arc::new(BridgeConnection::new(endpoint, [0; 5], peer_addr, device_write, true));
    pool.register(connection.clone()).await;
    tracing::info!(endpoint = %hex_endpoint(&endpoint), peer = %peer_addr, cloud_host = %cloud_host, "relay connection established");

    let stats = Arc::new(RelayStats::default());

    let result = tokio::select! {
        r = forward_device_to_cloud(device_read, cloud_write, registry.clone(), mqtt.clone(), topic_prefix.clone(), stats.clone(), leftover) => r,
        r = forward_cloud_to_device(cloud_read, connection.clone(), registry.clone(), mqtt.clone(), topic_prefix.clone(), stats.clone(), write_drain_timeout) => r,
        r = injection::watch(connection.clone(), write_drain_timeout) => r,
    };

    connection.begin_shutdown();
    pool.remove(&connection.endpoint).await;
    tracing::info!(endpoint = %hex_endpoint(&connection.endpoint), "relay connection closed");
    result
}

async fn dial_cloud(
    host: &str,
    port: u16,
    disable_verification: bool,
) -> CyncResult<ClientTlsStream<TcpStream>> {
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| CyncError::Other(format!("relay failed to dial cloud {host}:{port}: {e}")))?;

    let client_config = if disable_verification {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };

    let connector = TlsConnector::from(Arc::new(client_config));
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| CyncError::ConfigInvalid(format!("invalid cloud_relay.cloud_host '{host}': {e}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| CyncError::Other(format!("relay TLS handshake with cloud failed: {e}")))
}

/// `cloud_relay.disable_ssl_verification` opts out of validating the
/// vendor's certificate entirely — every method here unconditionally
/// accepts, matching rustls's own documented pattern for a deliberately
/// insecure verifier.
#[derive(Debug)]
struct NoVerification;

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// Device→cloud forwarder. Every chunk read is written to the cloud socket
/// immediately, before any parsing happens — forwarding never waits on, or
/// is skipped by, a decode failure.
async fn forward_device_to_cloud<C: Channel>(
    mut reader: ReadHalf<ServerTlsStream<TcpStream>>,
    mut writer: tokio::io::WriteHalf<ClientTlsStream<TcpStream>>,
    registry: SharedRegistry,
    mqtt: Arc<C>,
    topic_prefix: String,
    stats: Arc<RelayStats>,
    mut decode_buf: Vec<u8>,
) -> CyncResult<()> {
    while let Some(frame) = try_decode_one(&mut decode_buf)? {
        ingest_frame(&frame, &registry, &mqtt, &topic_prefix, &stats.malformed_device_to_cloud).await;
    }

    let mut chunk = [0u8; 4096];
    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| CyncError::Other(e.to_string()))?;
        if n == 0 {
            return Ok(());
        }

        writer
            .write_all(&chunk[..n])
            .await
            .map_err(|e| CyncError::Other(e.to_string()))?;
        writer.flush().await.map_err(|e| CyncError::Other(e.to_string()))?;

        decode_buf.extend_from_slice(&chunk[..n]);
        while let Some(frame) = try_decode_one(&mut decode_buf)? {
            ingest_frame(&frame, &registry, &mqtt, &topic_prefix, &stats.malformed_device_to_cloud).await;
        }
    }
}

/// Cloud→device forwarder. Writes go through `BridgeConnection::send`, the
/// same mutex-guarded path a normal bridge's outbound commands use, so a
/// concurrent injection (spec.md §4.6 "Injection") can never interleave a
/// partial frame with a forwarded one.
async fn forward_cloud_to_device<C: Channel>(
    mut reader: ReadHalf<ClientTlsStream<TcpStream>>,
    connection: Arc<BridgeConnection>,
    registry: SharedRegistry,
    mqtt: Arc<C>,
    topic_prefix: String,
    stats: Arc<RelayStats>,
    write_drain_timeout: Duration,
) -> CyncResult<()> {
    let mut decode_buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| CyncError::Other(e.to_string()))?;
        if n == 0 {
            return Ok(());
        }

        connection.send(&chunk[..n], write_drain_timeout).await?;

        decode_buf.extend_from_slice(&chunk[..n]);
        while let Some(frame) = try_decode_one(&mut decode_buf)? {
            ingest_frame(&frame, &registry, &mqtt, &topic_prefix, &stats.malformed_cloud_to_device).await;
        }
    }
}

/// Fold a 0x43/0x83 report into the model and publish its effect, exactly
/// like `bridge::handler::handle_packet` does for a normal bridge, minus
/// the ack this function's caller never sends. Any other packet type is
/// ignored; a parse failure is counted but the bytes were already
/// forwarded by the caller.
async fn ingest_frame<C: Channel>(
    frame: &RawFrame,
    registry: &SharedRegistry,
    mqtt: &Arc<C>,
    topic_prefix: &str,
    malformed: &AtomicU64,
) {
    match packet::parse_packet(frame) {
        Ok(Packet::DeviceInfo { statuses } | Packet::StatusBroadcast { statuses }) => {
            for status in statuses {
                let outcome = {
                    let mut reg = registry.lock().await;
                    reg.ingest_status(
                        status.device_id,
                        status.present,
                        status.on,
                        status.brightness,
                        status.color_temp,
                        status.rgb,
                    )
                };
                publish_status_outcome(mqtt, topic_prefix, status.device_id, outcome, registry).await;
            }
        }
        Ok(_) => {}
        Err(cync_protocol::ProtocolError::ChecksumMismatch { .. }) => {
            tracing::debug!("relay: dropping a checksum-mismatched frame's parse (bytes already forwarded)");
        }
        Err(e) => {
            malformed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(error = %e, "relay: frame failed to parse, forwarded raw and counted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_stats_start_at_zero() {
        let stats = RelayStats::default();
        assert_eq!(stats.malformed_device_to_cloud.load(Ordering::Relaxed), 0);
        assert_eq!(stats.malformed_cloud_to_device.load(Ordering::Relaxed), 0);
    }
}
