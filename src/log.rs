//! Bounded decision history.
//!
//! Every admission decision is appended to a fixed-capacity ring of
//! [`DecisionEvent`]s. The log tracks its sort order lazily: analyses ask
//! for time or address order, and a request matching the current tag is a
//! no-op. Sorting rearranges the ring's raw storage and therefore destroys
//! the write-order bookkeeping — a sorted log must be reset before it is
//! recorded into again.

use crate::ring::RingBuffer;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::net::IpAddr;

/// One admission decision: which address, when, and whether it was blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionEvent {
    /// The client address the decision was made for.
    pub ip: IpAddr,
    /// When the decision was recorded.
    pub created_at: DateTime<Utc>,
    /// Whether the address was denied.
    pub blocked: bool,
}

/// The ordering currently imposed on the log contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending creation time (the natural push order).
    ByTime,
    /// Ascending address order, equal addresses adjacent.
    ByIp,
}

/// An owned, lock-free view of recorded decisions.
///
/// Obtained from [`ActivityLog::snapshot`]; also the working set for the
/// offline analyses, which sort it in place without touching live state.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    begin: DateTime<Utc>,
    events: RingBuffer<DecisionEvent>,
    order: SortOrder,
}

impl DecisionLog {
    fn new(capacity: usize) -> Self {
        Self {
            begin: Utc::now(),
            events: RingBuffer::new(capacity),
            order: SortOrder::ByTime,
        }
    }

    /// When recording into this log began (reset on every [`reset`](Self::reset)).
    pub fn begin(&self) -> DateTime<Utc> {
        self.begin
    }

    /// Maximum number of retained events.
    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing has been recorded since the last reset.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The current lazily-tracked sort order.
    pub fn sort_order(&self) -> SortOrder {
        self.order
    }

    /// The recorded events.
    ///
    /// A fresh snapshot is in write order, oldest first; after
    /// [`sort_by_ip`](Self::sort_by_ip) or a later
    /// [`sort_by_time`](Self::sort_by_time) it is the sorted sequence.
    pub fn events(&self) -> &[DecisionEvent] {
        self.events.as_slice()
    }

    pub(crate) fn events_mut(&mut self) -> &mut [DecisionEvent] {
        self.events.as_mut_slice()
    }

    fn record(&mut self, ip: IpAddr, blocked: bool) {
        self.events.push(DecisionEvent {
            ip,
            created_at: Utc::now(),
            blocked,
        });
    }

    fn reset(&mut self) {
        self.events.reset();
        self.begin = Utc::now();
        // a cleared buffer refills in chronological push order
        self.order = SortOrder::ByTime;
    }

    /// A copy whose event sequence honors the sort-order tag.
    ///
    /// In `ByTime` state the live ring's raw storage is rotated, so the
    /// copy is rebuilt in write order (which is chronological); in `ByIp`
    /// state the storage is already the sorted sequence and is cloned
    /// as-is.
    fn normalized_copy(&self) -> DecisionLog {
        match self.order {
            SortOrder::ByTime => {
                let mut events = RingBuffer::new(self.events.capacity());
                for event in self.events.snapshot() {
                    events.push(event);
                }
                DecisionLog {
                    begin: self.begin,
                    events,
                    order: self.order,
                }
            }
            SortOrder::ByIp => self.clone(),
        }
    }

    /// Sort events by ascending creation time. No-op if already time-ordered.
    pub fn sort_by_time(&mut self) {
        if self.order == SortOrder::ByTime {
            return;
        }
        self.events
            .as_mut_slice()
            .sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.order = SortOrder::ByTime;
    }

    /// Sort events by ascending address. No-op if already address-ordered.
    pub fn sort_by_ip(&mut self) {
        if self.order == SortOrder::ByIp {
            return;
        }
        self.events.as_mut_slice().sort_by(|a, b| a.ip.cmp(&b.ip));
        self.order = SortOrder::ByIp;
    }
}

/// The live, shared decision history.
///
/// All access goes through one reader-writer lock, independent from the
/// allow/block store's lock. Lock ordering across the engine is Store
/// before Log; nothing here ever acquires the store's lock.
#[derive(Debug)]
pub struct ActivityLog {
    inner: RwLock<DecisionLog>,
}

impl ActivityLog {
    /// Create an empty log retaining at most `capacity` decisions.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(DecisionLog::new(capacity)),
        }
    }

    /// Append a decision under the exclusive lock.
    pub fn record(&self, ip: IpAddr, blocked: bool) {
        self.inner.write().record(ip, blocked);
    }

    /// Maximum number of retained decisions.
    pub fn capacity(&self) -> usize {
        self.inner.read().capacity()
    }

    /// Replace the buffer with a fresh one of the given capacity,
    /// discarding all recorded decisions.
    pub fn resize(&self, capacity: usize) {
        *self.inner.write() = DecisionLog::new(capacity);
    }

    /// Copy out the recorded decisions, oldest first.
    ///
    /// With `reset`, the copy and the wipe of the live buffer happen in one
    /// critical section, so no event is both copied and retained. Without
    /// it, only the shared lock is taken and concurrent snapshots never
    /// block each other.
    pub fn snapshot(&self, reset: bool) -> DecisionLog {
        if reset {
            let mut inner = self.inner.write();
            let copy = inner.normalized_copy();
            inner.reset();
            copy
        } else {
            self.inner.read().normalized_copy()
        }
    }

    /// Sort the live buffer by ascending creation time.
    ///
    /// Holds the exclusive lock for the whole O(n log n) pass. A sorted
    /// live log must not be recorded into again before a reset.
    pub fn sort_by_time(&self) {
        self.inner.write().sort_by_time();
    }

    /// Sort the live buffer by ascending address.
    ///
    /// Same locking and reset caveats as [`sort_by_time`](Self::sort_by_time).
    pub fn sort_by_ip(&self) {
        self.inner.write().sort_by_ip();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_record_and_snapshot() {
        let log = ActivityLog::new(10);
        log.record(addr("1.1.1.1"), false);
        log.record(addr("2.2.2.2"), true);

        let snap = log.snapshot(false);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.events()[0].ip, addr("1.1.1.1"));
        assert!(!snap.events()[0].blocked);
        assert!(snap.events()[1].blocked);

        // the live log is untouched by a plain snapshot
        assert_eq!(log.snapshot(false).len(), 2);
    }

    #[test]
    fn test_snapshot_reset_drains_live_buffer() {
        let log = ActivityLog::new(5);
        log.record(addr("1.1.1.1"), false);

        let snap = log.snapshot(true);
        assert_eq!(snap.len(), 1);

        let after = log.snapshot(false);
        assert!(after.is_empty());
        // begin moved forward with the reset
        assert!(after.begin() >= snap.begin());
    }

    #[test]
    fn test_capacity_bounds_history() {
        let log = ActivityLog::new(3);
        for ip in ["1.1.1.1", "1.1.1.2", "1.1.1.3", "1.1.1.4"] {
            log.record(addr(ip), false);
        }
        let snap = log.snapshot(false);
        assert_eq!(snap.len(), 3);
        // the last three pushes survive, oldest first
        let ips: Vec<IpAddr> = snap.events().iter().map(|e| e.ip).collect();
        assert_eq!(ips, vec![addr("1.1.1.2"), addr("1.1.1.3"), addr("1.1.1.4")]);
    }

    #[test]
    fn test_sort_by_ip_orders_addresses() {
        let log = ActivityLog::new(10);
        for ip in ["9.9.9.9", "1.1.1.1", "5.5.5.5", "1.1.1.1"] {
            log.record(addr(ip), false);
        }
        let mut snap = log.snapshot(false);
        snap.sort_by_ip();
        let ips: Vec<IpAddr> = snap.events().iter().map(|e| e.ip).collect();
        assert_eq!(
            ips,
            vec![
                addr("1.1.1.1"),
                addr("1.1.1.1"),
                addr("5.5.5.5"),
                addr("9.9.9.9")
            ]
        );
        assert_eq!(snap.sort_order(), SortOrder::ByIp);
    }

    #[test]
    fn test_repeated_sort_is_noop() {
        let log = ActivityLog::new(10);
        for ip in ["3.3.3.3", "1.1.1.1", "2.2.2.2"] {
            log.record(addr(ip), false);
        }
        let mut snap = log.snapshot(false);
        snap.sort_by_ip();

        // scramble behind the tag's back; a second sort must not run
        snap.events_mut().swap(0, 2);
        let scrambled: Vec<IpAddr> = snap.events().iter().map(|e| e.ip).collect();
        snap.sort_by_ip();
        let after: Vec<IpAddr> = snap.events().iter().map(|e| e.ip).collect();
        assert_eq!(scrambled, after);
    }

    #[test]
    fn test_sort_by_time_restores_chronology_after_wrap() {
        let log = ActivityLog::new(3);
        for ip in ["1.1.1.1", "1.1.1.2", "1.1.1.3", "1.1.1.4", "1.1.1.5"] {
            log.record(addr(ip), false);
        }
        let mut snap = log.snapshot(false);
        // force a real pass through both sorts
        snap.sort_by_ip();
        snap.sort_by_time();
        let created: Vec<_> = snap.events().iter().map(|e| e.created_at).collect();
        let mut sorted = created.clone();
        sorted.sort();
        assert_eq!(created, sorted);
        assert_eq!(snap.sort_order(), SortOrder::ByTime);
    }

    #[test]
    fn test_live_sort_orders_under_the_log_lock() {
        let log = ActivityLog::new(3);
        for ip in ["1.1.1.1", "1.1.1.2", "1.1.1.3", "1.1.1.4"] {
            log.record(addr(ip), false);
        }
        // raw ring order is rotated after the wrap
        log.sort_by_ip();
        let snap = log.snapshot(false);
        let ips: Vec<IpAddr> = snap.events().iter().map(|e| e.ip).collect();
        assert_eq!(
            ips,
            vec![addr("1.1.1.2"), addr("1.1.1.3"), addr("1.1.1.4")]
        );
        // a sorted live log is reset before recording resumes
        log.resize(3);
        assert!(log.snapshot(false).is_empty());
    }

    #[test]
    fn test_resize_discards_and_rebounds() {
        let log = ActivityLog::new(2);
        log.record(addr("1.1.1.1"), false);
        log.resize(4);
        assert_eq!(log.capacity(), 4);
        assert!(log.snapshot(false).is_empty());
    }
}
