//! Bridge pool (spec.md §3, §4.3 "deterministic bridge selection").
//!
//! Holds every live `BridgeConnection`, keyed by its 4-byte endpoint.
//! Command dispatch doesn't get to pick a bridge arbitrarily — it hashes
//! the target id over the sorted, currently-ready endpoint list, so the
//! same target always lands on the same bridge while that bridge stays
//! ready, and only moves on the next ready candidate when it isn't.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::bridge::connection::BridgeConnection;

#[derive(Clone, Default)]
pub struct BridgePool {
    inner: Arc<RwLock<HashMap<[u8; 4], Arc<BridgeConnection>>>>,
    /// Total times each endpoint has registered over the process lifetime
    /// (spec.md §2 "pool supervisor ... reconnect accounting"). The first
    /// registration counts as the initial connect, not a reconnect — see
    /// `reconnects_for`.
    connect_counts: Arc<RwLock<HashMap<[u8; 4], u32>>>,
}

impl BridgePool {
    pub fn new() -> Self {
        BridgePool::default()
    }

    pub async fn register(&self, connection: Arc<BridgeConnection>) {
        let endpoint = connection.endpoint;
        self.inner.write().await.insert(endpoint, connection);
        *self.connect_counts.write().await.entry(endpoint).or_insert(0) += 1;
    }

    /// How many times `endpoint` has reconnected since the process started
    /// (0 the first time it connects).
    pub async fn reconnects_for(&self, endpoint: &[u8; 4]) -> u32 {
        self.connect_counts
            .read()
            .await
            .get(endpoint)
            .map(|n| n.saturating_sub(1))
            .unwrap_or(0)
    }

    /// Sum of reconnects across every endpoint ever seen, for the periodic
    /// pool-status log line (spec.md §4.7).
    pub async fn total_reconnects(&self) -> u32 {
        self.connect_counts
            .read()
            .await
            .values()
            .map(|n| n.saturating_sub(1))
            .sum()
    }

    pub async fn remove(&self, endpoint: &[u8; 4]) -> Option<Arc<BridgeConnection>> {
        self.inner.write().await.remove(endpoint)
    }

    /// Tear down every live connection (spec.md §5 "close all bridges (each
    /// bridge's teardown cancels its pending callbacks with `shutdown`)").
    /// Each connection's read loop observes `is_shutting_down` and exits on
    /// its own; this only needs to flip the flag and resolve callbacks that
    /// are already in flight, not touch the socket directly.
    pub async fn shutdown_all(&self) {
        let connections: Vec<Arc<BridgeConnection>> =
            self.inner.read().await.values().cloned().collect();
        for connection in connections {
            connection.begin_shutdown();
            connection.callbacks.lock().await.cancel_all();
        }
    }

    pub async fn get(&self, endpoint: &[u8; 4]) -> Option<Arc<BridgeConnection>> {
        self.inner.read().await.get(endpoint).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn ready_count(&self) -> usize {
        self.inner
            .read()
            .await
            .values()
            .filter(|c| c.is_ready())
            .count()
    }

    /// Every currently ready bridge, sorted by endpoint for deterministic
    /// iteration order (spec.md §4.7 "1 s spacing between bridges" reads
    /// more sensibly against a stable order than an arbitrary hash-map one).
    pub async fn ready_bridges(&self) -> Vec<Arc<BridgeConnection>> {
        let mut bridges: Vec<Arc<BridgeConnection>> = self
            .inner
            .read()
            .await
            .values()
            .filter(|c| c.is_ready())
            .cloned()
            .collect();
        bridges.sort_by_key(|c| c.endpoint);
        bridges
    }

    /// Select the bridge responsible for `target`, deterministically, among
    /// the currently ready (handshaken, not shutting down, non-relay)
    /// bridges. `NoBridgesAvailable` if none qualify.
    pub async fn select_for_target(&self, target: u32) -> Option<Arc<BridgeConnection>> {
        let connections = self.inner.read().await;
        let mut ready: Vec<&Arc<BridgeConnection>> =
            connections.values().filter(|c| c.is_ready()).collect();
        if ready.is_empty() {
            return None;
        }
        ready.sort_by_key(|c| c.endpoint);

        let mut hasher = DefaultHasher::new();
        target.hash(&mut hasher);
        let index = (hasher.finish() as usize) % ready.len();
        Some(ready[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // BridgeConnection::new needs a real TlsStream write-half, which
    // requires an actual socket — selection logic is exercised instead
    // through the pure hash-and-sort routine it reuses.

    fn deterministic_index(endpoints: &mut Vec<[u8; 4]>, target: u32) -> [u8; 4] {
        endpoints.sort();
        let mut hasher = DefaultHasher::new();
        target.hash(&mut hasher);
        let index = (hasher.finish() as usize) % endpoints.len();
        endpoints[index]
    }

    #[test]
    fn selection_is_deterministic_for_the_same_target_and_endpoint_set() {
        let mut endpoints = vec![[0x60, 0xb1, 0x7c, 0x4a], [0x01, 0x02, 0x03, 0x04]];
        let first = deterministic_index(&mut endpoints.clone(), 42);
        let second = deterministic_index(&mut endpoints, 42);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_pool_has_no_ready_bridges() {
        let pool = BridgePool::new();
        assert_eq!(pool.ready_count().await, 0);
        assert!(pool.select_for_target(1).await.is_none());
    }

    #[tokio::test]
    async fn reconnects_for_an_unseen_endpoint_is_zero() {
        let pool = BridgePool::new();
        assert_eq!(pool.reconnects_for(&[1, 2, 3, 4]).await, 0);
        assert_eq!(pool.total_reconnects().await, 0);
    }
}
