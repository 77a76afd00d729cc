//! Command dispatch pipeline (spec.md §4.3).

pub mod pipeline;
pub mod set_payload;

pub use pipeline::{dispatch, CommandPipeline, Target};
pub use set_payload::commands_from_payload;

/// What eventually happened to a dispatched command, delivered to the
/// caller's callback (spec.md §3 "callback record").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acked,
    Superseded,
    Timeout,
    Shutdown,
}
