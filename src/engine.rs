//! The admission engine: swappable allow/block lists plus the hot
//! decision path.
//!
//! # Locking
//!
//! Two independent reader-writer locks partition the shared state: the
//! list store's lock and the activity log's lock. The ordering rule,
//! everywhere in this crate, is **store before log** — `decide` reads the
//! lists under the store lock, releases it, then appends under the log
//! lock. List queries and log snapshots therefore never block each other.

use crate::analysis::{
    self, Aggregation, BlockListPlan, CidrCount, CompileError, DedupPolicy, Stats,
};
use crate::config::AdmissionConfig;
use crate::error::ParseError;
use crate::log::{ActivityLog, DecisionLog};
use crate::matcher;
use crate::provider::{RangeSource, RangeSourceError};
use chrono::{DateTime, TimeDelta, Utc};
use ipnet::IpNet;
use parking_lot::RwLock;
use std::net::IpAddr;
use tracing::{debug, info};

/// The outcome of one admission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the address is admitted.
    pub allowed: bool,
    /// For a denial, the matched range and its list index
    /// (`"<cidr> <index>"`); empty otherwise.
    pub reason: String,
}

impl Decision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }
}

/// The two active prefix lists.
///
/// `blocked` distinguishes "never configured" (`None`, admit everything
/// unconditionally) from an empty list (`Some(vec![])`, normal path with
/// nothing to match).
#[derive(Debug, Default)]
struct PrefixLists {
    allowed: Vec<IpNet>,
    blocked: Option<Vec<IpNet>>,
}

/// Evaluate one address against the candidate lists.
///
/// Allow-list membership takes precedence over block-list membership.
/// Both lists must be sorted ascending by base address and
/// non-overlapping, or lookups silently misbehave (see [`matcher::find`]).
pub(crate) fn verdict(ip: IpAddr, allowed: &[IpNet], blocked: Option<&[IpNet]>) -> Decision {
    let Some(blocked) = blocked else {
        return Decision::allow();
    };
    if matcher::find(allowed, ip).is_ok() {
        return Decision::allow();
    }
    if let Ok(n) = matcher::find(blocked, ip) {
        return Decision {
            allowed: false,
            reason: format!("{} {}", blocked[n], n),
        };
    }
    Decision::allow()
}

/// The admission-control engine.
///
/// Explicitly constructed and passed to call sites — created once at
/// process start, shared by reference, torn down at shutdown. All methods
/// take `&self`; interior locking makes concurrent use safe.
pub struct Limiter {
    ranges: Box<dyn RangeSource>,
    lists: RwLock<PrefixLists>,
    log: ActivityLog,
    dedup: DedupPolicy,
}

impl Limiter {
    /// Build an engine from its settings and a known-ranges provider.
    pub fn new(config: &AdmissionConfig, ranges: Box<dyn RangeSource>) -> Self {
        Self {
            ranges,
            lists: RwLock::new(PrefixLists::default()),
            log: ActivityLog::new(config.max_entries),
            dedup: config.dedup_policy,
        }
    }

    /// Refresh the known-ranges provider.
    pub fn init(&self) -> Result<(), RangeSourceError> {
        self.ranges.load()
    }

    /// Replace the decision log with an empty one of the given capacity.
    pub fn set_max_entries(&self, n: usize) {
        self.log.resize(n);
    }

    /// Current decision-log capacity.
    pub fn max_entries(&self) -> usize {
        self.log.capacity()
    }

    fn parse_prefixes(cidrs: &[String]) -> Result<Vec<IpNet>, ParseError> {
        let mut list = Vec::with_capacity(cidrs.len());
        for cidr in cidrs {
            list.push(cidr.parse::<IpNet>()?);
        }
        Ok(list)
    }

    fn render_prefixes(list: &[IpNet]) -> Vec<String> {
        list.iter().map(|net| net.to_string()).collect()
    }

    /// Replace the block list wholesale.
    ///
    /// The whole input is parsed before the store is touched, so a
    /// malformed entry fails the call without partial application. The
    /// caller supplies the list sorted ascending by base address and
    /// non-overlapping; the store does not sort or merge.
    pub fn set_block_list(&self, cidrs: &[String]) -> Result<(), ParseError> {
        let parsed = Self::parse_prefixes(cidrs)?;
        self.lists.write().blocked = Some(parsed);
        info!(entries = cidrs.len(), "block list replaced");
        Ok(())
    }

    /// The current block list in canonical string form. Empty when
    /// blocking has never been configured.
    pub fn get_block_list(&self) -> Vec<String> {
        match &self.lists.read().blocked {
            Some(list) => Self::render_prefixes(list),
            None => Vec::new(),
        }
    }

    /// Replace the allow list wholesale. Same parsing and ordering
    /// contract as [`set_block_list`](Self::set_block_list).
    pub fn set_allow_list(&self, cidrs: &[String]) -> Result<(), ParseError> {
        let parsed = Self::parse_prefixes(cidrs)?;
        self.lists.write().allowed = parsed;
        info!(entries = cidrs.len(), "allow list replaced");
        Ok(())
    }

    /// The current allow list in canonical string form.
    pub fn get_allow_list(&self) -> Vec<String> {
        Self::render_prefixes(&self.lists.read().allowed)
    }

    /// Decide whether to admit `ip`, recording the outcome.
    ///
    /// Hot path: parse, one shared-lock list lookup, one exclusive-lock
    /// log append. Never blocks on I/O. A parse failure is returned
    /// without touching the log.
    pub fn decide(&self, ip: &str) -> Result<Decision, ParseError> {
        let addr: IpAddr = ip.parse()?;

        // store lock first, released before the log lock is taken
        let decision = {
            let lists = self.lists.read();
            verdict(addr, &lists.allowed, lists.blocked.as_deref())
        };

        self.log.record(addr, !decision.allowed);

        if !decision.allowed {
            debug!(ip = %addr, reason = %decision.reason, "address denied");
        }
        Ok(decision)
    }

    /// Copy out the recorded decisions, leaving the live log untouched.
    pub fn get_log(&self) -> DecisionLog {
        self.log.snapshot(false)
    }

    /// Copy out the recorded decisions and atomically clear the live log.
    pub fn reset_log(&self) -> DecisionLog {
        self.log.snapshot(true)
    }

    /// Aggregate a snapshot against the known ranges.
    pub fn aggregate(&self, log: &mut DecisionLog) -> Aggregation {
        analysis::aggregate(log, &self.ranges.get(), self.dedup)
    }

    /// The `top` heaviest known ranges in a snapshot, with the addresses
    /// no known range covers.
    pub fn most_used_cidrs(
        &self,
        log: &mut DecisionLog,
        top: usize,
    ) -> (Vec<CidrCount>, Vec<IpAddr>) {
        let mut agg = self.aggregate(log);
        agg.counts.truncate(top);
        (agg.counts, agg.unknown)
    }

    /// Replay a snapshot against candidate lists, rewriting its `blocked`
    /// flags. Live engine state is never touched.
    pub fn simulate(
        &self,
        log: &mut DecisionLog,
        blocked: &[String],
        allowed: &[String],
    ) -> Result<(), ParseError> {
        let blocked = Self::parse_prefixes(blocked)?;
        let allowed = Self::parse_prefixes(allowed)?;
        analysis::simulate(log, &blocked, &allowed);
        Ok(())
    }

    /// Windowed unique/blocked statistics over a snapshot.
    pub fn get_stats(
        &self,
        log: &mut DecisionLog,
        start: DateTime<Utc>,
        duration: TimeDelta,
    ) -> Stats {
        analysis::windowed(log, start, duration, self.dedup)
    }

    /// Compile a candidate block list from a snapshot (see
    /// [`analysis::compile()`]).
    pub fn compile_block_list(
        &self,
        log: &mut DecisionLog,
        target: usize,
        excessive: usize,
    ) -> Result<BlockListPlan, CompileError> {
        analysis::compile(log, &self.ranges.get(), self.dedup, target, excessive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticRanges;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn limiter() -> Limiter {
        Limiter::new(
            &AdmissionConfig::default(),
            Box::new(StaticRanges::default()),
        )
    }

    #[test]
    fn test_set_get_round_trip() {
        let l = limiter();
        let blocked = strings(&["1.2.3.0/24", "5.6.7.0/10"]);
        let allowed = strings(&["1.2.3.0/24", "5.6.7.0/10"]);

        l.set_block_list(&blocked).unwrap();
        assert_eq!(l.get_block_list(), blocked);
        l.set_allow_list(&allowed).unwrap();
        assert_eq!(l.get_allow_list(), allowed);

        l.set_max_entries(200);
        assert_eq!(l.max_entries(), 200);
    }

    #[test]
    fn test_unset_block_list_allows_everything() {
        let l = limiter();
        // an allow list alone never denies; blocking was never configured
        l.set_allow_list(&strings(&["10.0.0.0/8"])).unwrap();
        for ip in ["1.2.3.4", "10.1.1.1", "255.255.255.255", "::1"] {
            let d = l.decide(ip).unwrap();
            assert!(d.allowed, "{ip}");
            assert!(d.reason.is_empty());
        }
    }

    #[test]
    fn test_empty_block_list_is_not_unset() {
        let l = limiter();
        l.set_block_list(&[]).unwrap();
        assert!(l.get_block_list().is_empty());
        // still admits, but through the normal matching path
        assert!(l.decide("1.2.3.4").unwrap().allowed);
    }

    #[test]
    fn test_decide_precedence_and_reason() {
        let l = limiter();
        l.set_block_list(&strings(&["1.2.0.0/16", "5.6.7.0/10"]))
            .unwrap();
        l.set_allow_list(&strings(&["1.2.1.0/24", "7.8.9.0/16"]))
            .unwrap();

        for (name, ip, allowed, reason) in [
            ("match and blocked", "1.2.0.1", false, "1.2.0.0/16 0"),
            ("allowed has precedence over blocked", "1.2.1.1", true, ""),
            ("no match is allowed", "50.10.20.30", true, ""),
        ] {
            let d = l.decide(ip).unwrap();
            assert_eq!(d.allowed, allowed, "{name}");
            assert_eq!(d.reason, reason, "{name}");
        }
    }

    #[test]
    fn test_decide_blocked_reason_carries_index() {
        let l = limiter();
        l.set_block_list(&strings(&["1.2.0.0/16", "5.6.0.0/16"]))
            .unwrap();
        let d = l.decide("5.6.1.1").unwrap();
        assert!(!d.allowed);
        assert_eq!(d.reason, "5.6.0.0/16 1");
    }

    #[test]
    fn test_decide_records_outcome() {
        let l = limiter();
        l.set_block_list(&strings(&["1.2.0.0/16"])).unwrap();
        l.decide("1.2.0.1").unwrap();
        l.decide("9.9.9.9").unwrap();

        let snap = l.get_log();
        assert_eq!(snap.len(), 2);
        assert!(snap.events()[0].blocked);
        assert!(!snap.events()[1].blocked);
    }

    #[test]
    fn test_decide_parse_error_not_logged() {
        let l = limiter();
        assert!(matches!(
            l.decide("not-an-address"),
            Err(ParseError::Address(_))
        ));
        assert!(l.get_log().is_empty());
    }

    #[test]
    fn test_set_block_list_rejects_malformed_without_partial_apply() {
        let l = limiter();
        l.set_block_list(&strings(&["1.2.0.0/16"])).unwrap();
        let err = l.set_block_list(&strings(&["2.0.0.0/8", "bogus/99"]));
        assert!(matches!(err, Err(ParseError::Prefix(_))));
        // the previous list survived intact
        assert_eq!(l.get_block_list(), strings(&["1.2.0.0/16"]));
    }

    #[test]
    fn test_reset_log_drains() {
        let l = limiter();
        l.decide("1.1.1.1").unwrap();
        let drained = l.reset_log();
        assert_eq!(drained.len(), 1);
        assert!(l.get_log().is_empty());
    }

    #[test]
    fn test_log_capacity_wraps_oldest_first() {
        let l = limiter();
        l.set_max_entries(3);
        for ip in ["1.1.1.1", "1.1.1.2", "1.1.1.3", "1.1.1.4"] {
            l.decide(ip).unwrap();
        }
        let snap = l.get_log();
        assert_eq!(snap.len(), 3);
        // oldest surviving decision first; "1.1.1.1" was overwritten
        assert_eq!(snap.events()[0].ip, "1.1.1.2".parse::<IpAddr>().unwrap());
        assert_eq!(snap.events()[2].ip, "1.1.1.4".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_simulate_does_not_touch_live_state() {
        let l = limiter();
        l.set_block_list(&strings(&["9.0.0.0/8"])).unwrap();
        l.decide("1.2.3.4").unwrap();

        let mut snap = l.get_log();
        l.simulate(&mut snap, &strings(&["1.2.0.0/16"]), &[]).unwrap();
        assert!(snap.events()[0].blocked);

        // live log and live lists are unchanged
        assert!(!l.get_log().events()[0].blocked);
        assert_eq!(l.get_block_list(), strings(&["9.0.0.0/8"]));
        assert_eq!(l.get_log().len(), 1);
    }

    #[test]
    fn test_simulate_rejects_malformed_candidates() {
        let l = limiter();
        l.decide("1.2.3.4").unwrap();
        let mut snap = l.get_log();
        assert!(l
            .simulate(&mut snap, &strings(&["nope"]), &[])
            .is_err());
    }

    #[test]
    fn test_most_used_cidrs_truncates_to_top() {
        let config = AdmissionConfig::default();
        let ranges =
            StaticRanges::parse(&["1.2.3.0/24", "1.4.3.0/24", "10.5.0.0/16"]).unwrap();
        let l = Limiter::new(&config, Box::new(ranges));

        for ip in [
            "1.2.3.1", "1.2.3.1", "1.2.3.1", "1.2.3.2", "1.3.0.2", "1.4.3.2", "1.4.3.2",
            "10.5.0.2", "10.5.0.3", "10.5.0.4", "10.5.0.4", "20.10.0.5",
        ] {
            l.decide(ip).unwrap();
        }

        let mut snap = l.get_log();
        let (counts, unknown) = l.most_used_cidrs(&mut snap, 2);
        assert_eq!(
            counts,
            vec![
                CidrCount { cidr: "10.5.0.0/16".into(), count: 3 },
                CidrCount { cidr: "1.2.3.0/24".into(), count: 2 },
            ]
        );
        assert_eq!(
            unknown,
            vec![
                "1.3.0.2".parse::<IpAddr>().unwrap(),
                "20.10.0.5".parse().unwrap()
            ]
        );
    }
}
