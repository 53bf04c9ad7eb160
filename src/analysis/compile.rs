//! Block-list compilation and candidate replay.
//!
//! Compilation is a greedy pass over the aggregated per-range counts:
//! block the heaviest ranges until the unblocked unique-address total
//! drops to the target. Not an optimal minimum-ranges selection — ranges
//! contribute additively and "few enough, good enough" is the goal.

use super::aggregate::{aggregate, Aggregation, DedupPolicy};
use crate::engine::verdict;
use crate::log::DecisionLog;
use ipnet::IpNet;
use std::net::IpAddr;
use thiserror::Error;
use tracing::debug;

/// A compiled candidate block list.
#[derive(Debug, Clone)]
pub struct BlockListPlan {
    /// Ranges to block, heaviest first, in canonical string form.
    pub block_list: Vec<String>,
    /// Recorded addresses outside every known range, ascending.
    pub unknown: Vec<IpAddr>,
}

/// Why compilation produced no applicable result.
///
/// The informational variants carry what was computed anyway: the caller
/// of a [`TargetNotReached`](CompileError::TargetNotReached) may still
/// apply the partial plan.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Traffic is below the level that justifies blocking at all.
    #[error("{unique} unique addresses is below the excessive threshold {excessive}")]
    NotExcessive {
        /// Unique addresses actually recorded.
        unique: usize,
        /// The configured excessive threshold.
        excessive: usize,
        /// Addresses outside every known range, still reported.
        unknown: Vec<IpAddr>,
    },

    /// The trigger level must exceed the goal level.
    #[error("excessive threshold {excessive} must exceed the target {target}")]
    InconsistentThresholds {
        /// The requested traffic goal.
        target: usize,
        /// The configured excessive threshold.
        excessive: usize,
    },

    /// Even blocking every counted range leaves traffic above the target.
    #[error("{remaining} unique addresses remain above the target {target}")]
    TargetNotReached {
        /// The exhaustive (but insufficient) plan, still usable.
        plan: BlockListPlan,
        /// Unique addresses left unblocked.
        remaining: usize,
        /// The requested traffic goal.
        target: usize,
    },
}

/// Compile a block list that brings unique-address traffic down to `target`.
///
/// `excessive` is the traffic level at which blocking becomes warranted;
/// below it compilation refuses with
/// [`NotExcessive`](CompileError::NotExcessive). Walks the aggregated
/// counts from heaviest range down, accumulating until the unblocked
/// total reaches the target or the counts run out.
pub fn compile(
    log: &mut DecisionLog,
    ranges: &[IpNet],
    policy: DedupPolicy,
    target: usize,
    excessive: usize,
) -> Result<BlockListPlan, CompileError> {
    let Aggregation {
        counts,
        total_unique,
        unknown,
    } = aggregate(log, ranges, policy);

    if total_unique < excessive {
        return Err(CompileError::NotExcessive {
            unique: total_unique,
            excessive,
            unknown,
        });
    }

    if excessive <= target {
        return Err(CompileError::InconsistentThresholds { target, excessive });
    }

    let mut blocked_ips = 0;
    let mut block_list = Vec::new();
    for entry in &counts {
        if total_unique - blocked_ips <= target {
            break;
        }
        blocked_ips += entry.count;
        block_list.push(entry.cidr.clone());
    }

    debug!(
        total_unique,
        blocked = blocked_ips,
        ranges = block_list.len(),
        target,
        "block list compiled"
    );

    let remaining = total_unique - blocked_ips;
    if remaining > target {
        return Err(CompileError::TargetNotReached {
            plan: BlockListPlan {
                block_list,
                unknown,
            },
            remaining,
            target,
        });
    }

    Ok(BlockListPlan {
        block_list,
        unknown,
    })
}

/// Replay every recorded decision against a candidate configuration.
///
/// Rewrites each event's `blocked` flag in the snapshot with the outcome
/// the candidate lists would have produced, under the same
/// allow-takes-precedence rule as the live engine. Touches nothing but
/// the snapshot.
pub fn simulate(log: &mut DecisionLog, blocked: &[IpNet], allowed: &[IpNet]) {
    for event in log.events_mut() {
        let decision = verdict(event.ip, allowed, Some(blocked));
        event.blocked = !decision.allowed;
    }
}
