//! Offline analyses over decision-log snapshots.
//!
//! Everything here operates on an owned [`DecisionLog`](crate::DecisionLog)
//! snapshot and never touches live engine state: aggregation of recorded
//! traffic against known ranges, greedy block-list compilation, candidate
//! replay, and windowed statistics.

pub mod aggregate;
pub mod compile;
pub mod stats;

pub use aggregate::{aggregate, Aggregation, CidrCount, DedupPolicy};
pub use compile::{compile, simulate, BlockListPlan, CompileError};
pub use stats::{windowed, Stats, StatsSample};
