//! # ipgate
//!
//! An in-memory IP admission-control engine: decide in real time whether
//! to admit each client address against dynamically swappable allow/block
//! CIDR lists, while recording a bounded history of decisions for offline
//! analysis.
//!
//! ## Features
//!
//! - Hot `decide()` path: O(log n) binary search over sorted,
//!   non-overlapping prefix lists, allow taking precedence over block
//! - Bounded decision history in a fixed-capacity ring buffer with lazy
//!   time/address sorting and consistent snapshotting
//! - Per-range traffic aggregation against a pluggable known-ranges
//!   universe
//! - Greedy block-list compilation toward a traffic target, with a replay
//!   simulator to score candidate lists before committing them
//! - SQLite-backed persistence for settings and named CIDR lists
//!
//! ## Quick Start
//!
//! ```rust
//! use ipgate::{AdmissionConfig, Limiter, StaticRanges};
//!
//! let config = AdmissionConfig::default();
//! let limiter = Limiter::new(&config, Box::new(StaticRanges::default()));
//!
//! limiter
//!     .set_block_list(&["1.2.0.0/16".to_string()])
//!     .expect("valid CIDR");
//! limiter
//!     .set_allow_list(&["1.2.1.0/24".to_string()])
//!     .expect("valid CIDR");
//!
//! assert!(!limiter.decide("1.2.0.1").unwrap().allowed);
//! assert!(limiter.decide("1.2.1.1").unwrap().allowed); // allow wins
//! assert!(limiter.decide("50.10.20.30").unwrap().allowed);
//!
//! // three decisions are now in the log, ready for aggregation
//! assert_eq!(limiter.get_log().len(), 3);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod log;
pub mod matcher;
pub mod provider;
pub mod ring;
pub mod store;

pub use self::analysis::{
    Aggregation, BlockListPlan, CidrCount, CompileError, DedupPolicy, Stats, StatsSample,
};
pub use self::config::{AdmissionConfig, ConfigError};
pub use self::engine::{Decision, Limiter};
pub use self::error::ParseError;
pub use self::log::{ActivityLog, DecisionEvent, DecisionLog, SortOrder};
pub use self::provider::{FileRanges, RangeSource, RangeSourceError, StaticRanges};
pub use self::ring::RingBuffer;
pub use self::store::{RangePurpose, SettingsStore, StoreError};
