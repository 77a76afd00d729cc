//! End-to-end scenario tests live under `tests/`, one file per scenario
//! from the testable-properties list. This crate has no runtime code of
//! its own — it only exists so the workspace has somewhere to hang
//! integration tests that cross `cync-protocol`/`cync-mqtt`/`cync-lan`
//! crate boundaries, the same role `zc-e2e-tests` played for the crates
//! it wired together.
