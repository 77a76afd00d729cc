//! Per-connection bridge state (spec.md §3 "Bridge connection").
//!
//! One `BridgeConnection` exists per accepted TLS socket. It owns the
//! write half of the stream behind `write_lock` (so the read task and the
//! command pipeline never interleave partial frames), the msg_id counter,
//! and the callback table that correlates outgoing commands with their
//! acks.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::server::TlsStream;

use cync_protocol::commands::{MsgId, QueueId};

use crate::bridge::callback::CallbackTable;
use crate::error::{CyncError, CyncResult};

pub type BridgeWriter = WriteHalf<TlsStream<TcpStream>>;

/// 24-bit msg_id space (spec.md §8 "msg_id strictly increasing mod wrap
/// within a 2^24 window").
const MSG_ID_MODULUS: u32 = 1 << 24;

pub struct BridgeConnection {
    pub endpoint: [u8; 4],
    pub queue_id: QueueId,
    pub peer_addr: SocketAddr,
    pub is_relay: bool,

    msg_counter: AtomicU32,
    pub callbacks: Mutex<CallbackTable>,
    writer: Mutex<BridgeWriter>,

    ready_to_control: AtomicBool,
    shutting_down: AtomicBool,
}

impl BridgeConnection {
    pub fn new(
        endpoint: [u8; 4],
        queue_id: QueueId,
        peer_addr: SocketAddr,
        writer: BridgeWriter,
        is_relay: bool,
    ) -> Self {
        BridgeConnection {
            endpoint,
            queue_id,
            peer_addr,
            is_relay,
            msg_counter: AtomicU32::new(0),
            callbacks: Mutex::new(CallbackTable::new()),
            writer: Mutex::new(writer),
            ready_to_control: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Allocate the next msg_id, wrapping within the 24-bit window (spec.md
    /// §8). Safe to call concurrently — the counter is the only mutable
    /// state, so allocation never needs the write lock.
    pub fn allocate_msg_id(&self) -> MsgId {
        let id = self
            .msg_counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some((v + 1) % MSG_ID_MODULUS)
            })
            .unwrap_or(0);
        [(id >> 16) as u8, (id >> 8) as u8, id as u8]
    }

    /// True only after the 0x23 handshake has been observed and the 0x28
    /// ack emitted (spec.md §3 "ready_to_control goes true exactly once per
    /// connection"). Relay-mode bridges never become ready (spec.md §4.6).
    pub fn mark_ready(&self) {
        if !self.is_relay {
            self.ready_to_control.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready_to_control.load(Ordering::SeqCst) && !self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.ready_to_control.store(false, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Write a fully encoded frame, serialized against concurrent writers
    /// by `write_lock` (spec.md §5). Bounded by the configured write-drain
    /// timeout so a wedged socket can't block the whole pool forever.
    pub async fn send(&self, bytes: &[u8], drain_timeout: std::time::Duration) -> CyncResult<()> {
        let mut writer = self.writer.lock().await;
        tokio::time::timeout(drain_timeout, async {
            writer.write_all(bytes).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| CyncError::BridgeLost {
            endpoint: hex_endpoint(&self.endpoint),
        })?
        .map_err(|e| CyncError::Other(e.to_string()))
    }
}

pub fn hex_endpoint(endpoint: &[u8; 4]) -> String {
    endpoint.iter().map(|b| format!("{b:02x}")).collect()
}
