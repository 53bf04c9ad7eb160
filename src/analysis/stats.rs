//! Windowed traffic statistics.

use super::aggregate::{unique_events, DedupPolicy};
use crate::log::{DecisionEvent, DecisionLog};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Unique and blocked address counts for one time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSample {
    /// Unique addresses seen in the window.
    pub unique_ips: usize,
    /// Of those, how many were blocked.
    pub blocked_ips: usize,
}

/// A windowed statistics report.
#[derive(Debug, Clone)]
pub struct Stats {
    /// Start of the first window.
    pub start: DateTime<Utc>,
    /// Width of each window.
    pub duration: TimeDelta,
    /// One sample per consecutive window; `samples[i]` covers
    /// `start + i*duration` onwards.
    pub samples: Vec<StatsSample>,
}

fn sample_of(bucket: &[DecisionEvent], policy: DedupPolicy) -> StatsSample {
    let mut sample = StatsSample::default();
    for event in unique_events(bucket, policy) {
        sample.unique_ips += 1;
        if event.blocked {
            sample.blocked_ips += 1;
        }
    }
    sample
}

/// Fold the events at or after `start` into consecutive windows of
/// `duration` each.
///
/// Sorts the snapshot by time (lazily), seeks to the first event at or
/// after `start`, then buckets. Interior windows with no events produce
/// zero samples so that sample positions stay aligned to the time axis; a
/// trailing partial window is emitted if it holds anything. Deduplication
/// within a window is by adjacent comparison over the time-ordered
/// events. A non-positive duration yields no samples.
pub fn windowed(
    log: &mut DecisionLog,
    start: DateTime<Utc>,
    duration: TimeDelta,
    policy: DedupPolicy,
) -> Stats {
    let mut samples = Vec::new();
    if duration <= TimeDelta::zero() {
        return Stats {
            start,
            duration,
            samples,
        };
    }

    log.sort_by_time();
    let events = log.events();
    let first = events.partition_point(|e| e.created_at < start);

    let mut bucket: Vec<DecisionEvent> = Vec::new();
    let mut bucket_start = start;
    for event in &events[first..] {
        while event.created_at - bucket_start > duration {
            samples.push(sample_of(&bucket, policy));
            bucket.clear();
            bucket_start += duration;
        }
        bucket.push(event.clone());
    }
    if !bucket.is_empty() {
        samples.push(sample_of(&bucket, policy));
    }

    Stats {
        start,
        duration,
        samples,
    }
}
