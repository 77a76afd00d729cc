//! ACK correlator (spec.md §4.3 "command pipeline", §9 "msg_id echo
//! matching"). One of these lives per bridge connection; the write side
//! registers a callback before sending a command, the read side resolves it
//! when a matching `0x7B` data-ack arrives.
//!
//! Primary match is by echoed `msg_id`. When a bridge firmware echoes a
//! mismatched or empty msg_id, we fall back to FIFO — resolving the oldest
//! still-pending callback — and count it, per the open-question decision
//! recorded in DESIGN.md.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use cync_protocol::commands::MsgId;

use crate::command::Outcome;

pub struct Callback {
    pub msg_id: MsgId,
    pub target: u32,
    pub deadline: DateTime<Utc>,
    pub resolve: Box<dyn FnOnce(Outcome) + Send>,
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("msg_id", &self.msg_id)
            .field("target", &self.target)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// FIFO-ordered table of in-flight callbacks for one bridge connection.
#[derive(Default)]
pub struct CallbackTable {
    pending: VecDeque<Callback>,
    pub fallback_ack_matches: u64,
}

impl CallbackTable {
    pub fn new() -> Self {
        CallbackTable::default()
    }

    pub fn register(&mut self, callback: Callback) {
        self.pending.push_back(callback);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Resolve the callback matching `msg_id`, if any. On a mismatch, falls
    /// back to resolving the oldest pending callback instead, counting the
    /// fallback in `fallback_ack_matches`.
    pub fn resolve(&mut self, msg_id: Option<MsgId>) -> Option<Callback> {
        if let Some(msg_id) = msg_id {
            if let Some(pos) = self.pending.iter().position(|c| c.msg_id == msg_id) {
                return self.pending.remove(pos);
            }
        }
        if self.pending.is_empty() {
            return None;
        }
        self.fallback_ack_matches += 1;
        self.pending.pop_front()
    }

    /// Remove one callback by msg_id without resolving it — used when the
    /// caller itself already timed out waiting and is about to resolve the
    /// outcome directly, so the table doesn't hold a stale entry.
    pub fn remove(&mut self, msg_id: MsgId) -> Option<Callback> {
        let pos = self.pending.iter().position(|c| c.msg_id == msg_id)?;
        self.pending.remove(pos)
    }

    /// Cancel every callback currently registered for `target`, resolving
    /// each with `Outcome::Superseded` (spec.md §4.3 "coalesce" policy for
    /// power/fan/mode commands).
    pub fn supersede(&mut self, target: u32) {
        let (matching, rest): (VecDeque<_>, VecDeque<_>) =
            self.pending.drain(..).partition(|c| c.target == target);
        self.pending = rest;
        for callback in matching {
            (callback.resolve)(Outcome::Superseded);
        }
    }

    /// Drain every callback whose deadline has passed, for the caller to
    /// resolve with `Outcome::Timeout`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<Callback> {
        let (expired, rest): (VecDeque<_>, VecDeque<_>) =
            self.pending.drain(..).partition(|c| c.deadline <= now);
        self.pending = rest;
        expired.into_iter().collect()
    }

    /// Drain and resolve every pending callback with `Outcome::Shutdown`
    /// (spec.md §5 "exactly-once callback resolution on teardown").
    pub fn cancel_all(&mut self) {
        for callback in self.pending.drain(..) {
            (callback.resolve)(Outcome::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<Outcome>>>, impl Fn() -> Box<dyn FnOnce(Outcome) + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = log.clone();
            move || -> Box<dyn FnOnce(Outcome) + Send> {
                let log = log.clone();
                Box::new(move |outcome| log.lock().unwrap().push(outcome))
            }
        };
        (log, make)
    }

    fn cb(msg_id: MsgId, target: u32, resolve: Box<dyn FnOnce(Outcome) + Send>) -> Callback {
        Callback {
            msg_id,
            target,
            deadline: Utc::now() + chrono::Duration::seconds(5),
            resolve,
        }
    }

    #[test]
    fn resolves_by_matching_msg_id() {
        let (log, make) = recorder();
        let mut table = CallbackTable::new();
        table.register(cb([0, 0, 1], 1, make()));
        table.register(cb([0, 0, 2], 1, make()));

        let resolved = table.resolve(Some([0, 0, 2])).unwrap();
        (resolved.resolve)(Outcome::Acked);
        assert_eq!(*log.lock().unwrap(), vec![Outcome::Acked]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.fallback_ack_matches, 0);
    }

    #[test]
    fn falls_back_to_fifo_on_mismatch() {
        let (_log, make) = recorder();
        let mut table = CallbackTable::new();
        table.register(cb([0, 0, 1], 1, make()));
        table.register(cb([0, 0, 2], 1, make()));

        let resolved = table.resolve(Some([9, 9, 9])).unwrap();
        assert_eq!(resolved.msg_id, [0, 0, 1]);
        assert_eq!(table.fallback_ack_matches, 1);
    }

    #[test]
    fn falls_back_to_fifo_when_ack_carries_no_msg_id() {
        let (_log, make) = recorder();
        let mut table = CallbackTable::new();
        table.register(cb([0, 0, 1], 1, make()));

        let resolved = table.resolve(None).unwrap();
        assert_eq!(resolved.msg_id, [0, 0, 1]);
        assert_eq!(table.fallback_ack_matches, 1);
    }

    #[test]
    fn supersede_cancels_only_callbacks_for_the_target() {
        let (log, make) = recorder();
        let mut table = CallbackTable::new();
        table.register(cb([0, 0, 1], 1, make()));
        table.register(cb([0, 0, 2], 2, make()));

        table.supersede(1);
        assert_eq!(*log.lock().unwrap(), vec![Outcome::Superseded]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn expire_drains_only_past_deadlines() {
        let (_log, make) = recorder();
        let mut table = CallbackTable::new();
        let now = Utc::now();
        table.register(Callback {
            msg_id: [0, 0, 1],
            target: 1,
            deadline: now - chrono::Duration::seconds(1),
            resolve: make(),
        });
        table.register(cb([0, 0, 2], 2, make()));

        let expired = table.expire(now);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].msg_id, [0, 0, 1]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_drops_a_callback_without_resolving_it() {
        let (log, make) = recorder();
        let mut table = CallbackTable::new();
        table.register(cb([0, 0, 1], 1, make()));

        let removed = table.remove([0, 0, 1]);
        assert!(removed.is_some());
        assert!(table.is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_all_resolves_every_pending_callback_with_shutdown() {
        let (log, make) = recorder();
        let mut table = CallbackTable::new();
        table.register(cb([0, 0, 1], 1, make()));
        table.register(cb([0, 0, 2], 2, make()));

        table.cancel_all();
        assert_eq!(*log.lock().unwrap(), vec![Outcome::Shutdown, Outcome::Shutdown]);
        assert!(table.is_empty());
    }
}
