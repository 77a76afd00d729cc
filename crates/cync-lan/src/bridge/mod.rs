//! Bridge connection lifecycle: per-socket state, the callback/ack
//! correlator, the pool of live connections, and the accept-and-handshake
//! handler.

pub mod callback;
pub mod connection;
pub mod handler;
pub mod pool;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

use cync_mqtt::Channel;

pub use connection::BridgeConnection;
pub use pool::BridgePool;

use crate::config::CloudRelayConfig;
use crate::error::CyncResult;
use crate::model::SharedRegistry;
use crate::roster::ExpectedBridge;

/// Decide relay vs. normal mode for one accepted socket and hand it off to
/// the matching connection driver (spec.md §4.6 "For a configured
/// device..."). Routing is keyed on the endpoint observed in the 0x23
/// handshake, not the peer's raw socket address — a NAT'd or proxied
/// device's source IP tells us nothing about which vendor-assigned bridge
/// it is.
#[allow(clippy::too_many_arguments)]
pub async fn accept_connection<C: Channel>(
    stream: TlsStream<TcpStream>,
    peer_addr: SocketAddr,
    expected: Arc<Vec<ExpectedBridge>>,
    cloud_relay: CloudRelayConfig,
    pool: BridgePool,
    registry: SharedRegistry,
    mqtt: Arc<C>,
    topic_prefix: String,
    timeouts: handler::ConnectionTimeouts,
) -> CyncResult<()> {
    let (mut reader, writer) = tokio::io::split(stream);
    let peeked = handler::peek_handshake(&mut reader, timeouts.handshake).await?;

    let relay_mode = cloud_relay.enabled
        && expected
            .iter()
            .any(|b| b.endpoint == peeked.endpoint && b.relay);

    if relay_mode {
        crate::relay::run_relay_connection(
            reader,
            writer,
            peeked.endpoint,
            peeked.handshake_bytes,
            peeked.leftover,
            peer_addr,
            pool,
            registry,
            mqtt,
            topic_prefix,
            cloud_relay,
            timeouts.write_drain,
        )
        .await
    } else {
        handler::run_connection(
            reader,
            writer,
            peeked.endpoint,
            peeked.leftover,
            peer_addr,
            pool,
            registry,
            mqtt,
            topic_prefix,
            timeouts,
        )
        .await
    }
}
