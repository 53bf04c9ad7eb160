//! Per-range traffic aggregation.
//!
//! Joins the sorted unique addresses of a log snapshot against the sorted
//! known-range universe in one merge pass: O(ranges + unique addresses).

use crate::log::{DecisionEvent, DecisionLog};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// How unique-address extraction treats the first entry of the sorted log.
///
/// The historical extraction scanned from index 1 twice over, so the
/// earliest address never participated in aggregation. Which behavior is
/// wanted is an operator-facing choice, so both are available; counts
/// differ observably between the two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    /// Deduplicate the whole sorted sequence.
    #[default]
    Full,
    /// Begin both the dedup scan and the extraction at the second entry,
    /// dropping the earliest address from every computation.
    SkipFirst,
}

/// How many unique addresses hit one known range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CidrCount {
    /// The range in canonical `address/prefix-length` form.
    pub cidr: String,
    /// Unique addresses the range contained.
    pub count: usize,
}

/// The result of one aggregation pass.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Per-range counts, sorted descending by count. Ranges past the last
    /// recorded address are absent; equal counts keep range order.
    pub counts: Vec<CidrCount>,
    /// Total unique addresses extracted from the log.
    pub total_unique: usize,
    /// Addresses not covered by any known range, ascending.
    pub unknown: Vec<IpAddr>,
}

/// Deduplicate an address-sorted event sequence by adjacent comparison.
///
/// Under [`DedupPolicy::SkipFirst`] the scan starts at the second entry
/// and the first never survives.
pub(crate) fn unique_events<'a>(
    events: &'a [DecisionEvent],
    policy: DedupPolicy,
) -> Vec<&'a DecisionEvent> {
    let mut unique = Vec::with_capacity(events.len());
    for (i, event) in events.iter().enumerate() {
        if i == 0 {
            if policy == DedupPolicy::Full {
                unique.push(event);
            }
            continue;
        }
        if event.ip != events[i - 1].ip {
            unique.push(event);
        }
    }
    unique
}

fn unique_ips(events: &[DecisionEvent], policy: DedupPolicy) -> Vec<IpAddr> {
    let unique = unique_events(events, policy);
    let skip = match policy {
        DedupPolicy::Full => 0,
        DedupPolicy::SkipFirst => 1,
    };
    unique.iter().skip(skip).map(|e| e.ip).collect()
}

/// Aggregate a log snapshot against the known ranges.
///
/// Sorts the snapshot by address (lazily), extracts unique addresses, and
/// merges them against `ranges`, which must be sorted ascending by base
/// address and non-overlapping. Addresses falling before the next range
/// are emitted as unknown, as is everything past the final range.
pub fn aggregate(log: &mut DecisionLog, ranges: &[IpNet], policy: DedupPolicy) -> Aggregation {
    log.sort_by_ip();
    let ips = unique_ips(log.events(), policy);

    let mut counts = Vec::with_capacity(ranges.len());
    let mut unknown = Vec::new();
    let mut ip_index = 0;
    for net in ranges {
        if ip_index >= ips.len() {
            break;
        }
        let mut count = 0;
        while ip_index < ips.len() {
            let ip = ips[ip_index];
            if net.contains(&ip) {
                count += 1;
            } else if ip < net.addr() {
                unknown.push(ip);
            } else {
                break;
            }
            ip_index += 1;
        }
        counts.push(CidrCount {
            cidr: net.to_string(),
            count,
        });
    }
    unknown.extend_from_slice(&ips[ip_index..]);

    counts.sort_by(|a, b| b.count.cmp(&a.count));

    Aggregation {
        counts,
        total_unique: ips.len(),
        unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::ActivityLog;

    fn log_of(ips: &[&str]) -> DecisionLog {
        let log = ActivityLog::new(ips.len().max(1));
        for ip in ips {
            log.record(ip.parse().unwrap(), false);
        }
        log.snapshot(false)
    }

    fn ranges(cidrs: &[&str]) -> Vec<IpNet> {
        cidrs.iter().map(|c| c.parse().unwrap()).collect()
    }

    const KNOWN: [&str; 3] = ["1.2.3.0/24", "1.4.3.0/24", "10.5.0.0/16"];

    // 12 recorded decisions: 2 unique in the first range, 1 in the second,
    // 3 in the third, 2 outside every range.
    const TRAFFIC: [&str; 12] = [
        "1.2.3.1", "1.2.3.1", "1.2.3.1", "1.2.3.2", "1.3.0.2", "1.4.3.2", "1.4.3.2", "10.5.0.2",
        "10.5.0.3", "10.5.0.4", "10.5.0.4", "20.10.0.5",
    ];

    #[test]
    fn test_aggregate_counts_and_unknown() {
        let mut log = log_of(&TRAFFIC);
        let agg = aggregate(&mut log, &ranges(&KNOWN), DedupPolicy::Full);

        assert_eq!(agg.total_unique, 8);
        assert_eq!(agg.counts[0], CidrCount { cidr: "10.5.0.0/16".into(), count: 3 });
        assert_eq!(agg.counts[1], CidrCount { cidr: "1.2.3.0/24".into(), count: 2 });
        assert_eq!(agg.counts[2], CidrCount { cidr: "1.4.3.0/24".into(), count: 1 });
        assert_eq!(
            agg.unknown,
            vec!["1.3.0.2".parse::<IpAddr>().unwrap(), "20.10.0.5".parse().unwrap()]
        );
    }

    #[test]
    fn test_aggregate_skip_first_drops_earliest_address() {
        let mut log = log_of(&TRAFFIC);
        let agg = aggregate(&mut log, &ranges(&KNOWN), DedupPolicy::SkipFirst);

        // 1.2.3.1 falls to the dedup scan, 1.2.3.2 to the extraction skip
        assert_eq!(agg.total_unique, 6);
        assert_eq!(agg.counts[0], CidrCount { cidr: "10.5.0.0/16".into(), count: 3 });
        assert_eq!(agg.counts[1], CidrCount { cidr: "1.4.3.0/24".into(), count: 1 });
        assert_eq!(agg.counts[2], CidrCount { cidr: "1.2.3.0/24".into(), count: 0 });
    }

    #[test]
    fn test_aggregate_empty_log() {
        let mut log = log_of(&[]);
        let agg = aggregate(&mut log, &ranges(&KNOWN), DedupPolicy::Full);
        assert!(agg.counts.is_empty());
        assert_eq!(agg.total_unique, 0);
        assert!(agg.unknown.is_empty());
    }

    #[test]
    fn test_aggregate_no_ranges() {
        let mut log = log_of(&["5.5.5.5", "4.4.4.4"]);
        let agg = aggregate(&mut log, &[], DedupPolicy::Full);
        assert!(agg.counts.is_empty());
        assert_eq!(agg.total_unique, 2);
        // everything is unknown, in ascending order
        assert_eq!(
            agg.unknown,
            vec!["4.4.4.4".parse::<IpAddr>().unwrap(), "5.5.5.5".parse().unwrap()]
        );
    }

    #[test]
    fn test_aggregate_trailing_ranges_absent_from_counts() {
        let mut log = log_of(&["1.2.3.9"]);
        let agg = aggregate(&mut log, &ranges(&KNOWN), DedupPolicy::Full);
        // addresses ran out after the first range; later ranges get no entry
        assert_eq!(agg.counts.len(), 1);
        assert_eq!(agg.counts[0].cidr, "1.2.3.0/24");
    }

    #[test]
    fn test_equal_counts_keep_range_order() {
        let mut log = log_of(&["1.2.3.1", "1.4.3.1"]);
        let agg = aggregate(&mut log, &ranges(&KNOWN), DedupPolicy::Full);
        assert_eq!(agg.counts[0].cidr, "1.2.3.0/24");
        assert_eq!(agg.counts[1].cidr, "1.4.3.0/24");
    }

    #[test]
    fn test_unique_events_policies() {
        let events = log_of(&["1.1.1.1", "1.1.1.1", "2.2.2.2"]);
        let full = unique_events(events.events(), DedupPolicy::Full);
        assert_eq!(full.len(), 2);

        let skipped = unique_events(events.events(), DedupPolicy::SkipFirst);
        // the first entry never survives the scan
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].ip, "2.2.2.2".parse::<IpAddr>().unwrap());
    }
}
