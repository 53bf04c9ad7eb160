//! Known-ranges providers.
//!
//! The aggregation pass joins recorded traffic against a universe of known
//! network ranges supplied by an external collaborator. [`RangeSource`]
//! abstracts that collaborator: `load` refreshes from wherever the ranges
//! live, `get` hands back the current snapshot. The engine treats the
//! ranges as read-only and does not own the refresh cadence.

use ipnet::IpNet;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors refreshing a range source.
#[derive(Debug, Error)]
pub enum RangeSourceError {
    /// The backing source could not be read.
    #[error("failed to read range list: {0}")]
    Io(#[from] std::io::Error),
}

/// A provider of known network ranges.
///
/// `get` must return prefixes sorted ascending by base address and
/// mutually non-overlapping — the invariant the aggregator's merge pass
/// and the matcher's binary search rely on.
pub trait RangeSource: Send + Sync {
    /// Populate or refresh the range list from its external source.
    fn load(&self) -> Result<(), RangeSourceError>;

    /// The current range snapshot, sorted ascending, non-overlapping.
    fn get(&self) -> Vec<IpNet>;
}

/// A fixed in-memory range list.
///
/// `load` is a no-op; the list is whatever it was constructed with.
#[derive(Debug, Clone, Default)]
pub struct StaticRanges {
    ranges: Vec<IpNet>,
}

impl StaticRanges {
    /// Wrap an already sorted, non-overlapping list.
    pub fn new(ranges: Vec<IpNet>) -> Self {
        Self { ranges }
    }

    /// Parse and wrap a list of CIDR strings, sorting by base address.
    pub fn parse(cidrs: &[&str]) -> Result<Self, ipnet::AddrParseError> {
        let mut ranges = cidrs
            .iter()
            .map(|c| c.parse())
            .collect::<Result<Vec<IpNet>, _>>()?;
        ranges.sort_by_key(|net| net.addr());
        Ok(Self { ranges })
    }
}

impl RangeSource for StaticRanges {
    fn load(&self) -> Result<(), RangeSourceError> {
        Ok(())
    }

    fn get(&self) -> Vec<IpNet> {
        self.ranges.clone()
    }
}

/// Ranges read from a text file, one CIDR per line.
///
/// Blank lines and `#` comments are skipped; malformed entries are logged
/// and ignored rather than failing the whole load. Entries are sorted
/// ascending by base address after parsing. Overlap elimination is the
/// file author's responsibility.
#[derive(Debug)]
pub struct FileRanges {
    path: PathBuf,
    ranges: RwLock<Vec<IpNet>>,
}

impl FileRanges {
    /// Create a provider backed by `path`. Nothing is read until `load`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ranges: RwLock::new(Vec::new()),
        }
    }
}

impl RangeSource for FileRanges {
    fn load(&self) -> Result<(), RangeSourceError> {
        let content = std::fs::read_to_string(&self.path)?;

        let mut parsed = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.parse::<IpNet>() {
                Ok(net) => parsed.push(net),
                Err(e) => {
                    warn!(entry = %line, error = %e, "ignoring invalid range entry");
                }
            }
        }
        parsed.sort_by_key(|net| net.addr());

        info!(path = %self.path.display(), ranges = parsed.len(), "range list loaded");
        *self.ranges.write() = parsed;
        Ok(())
    }

    fn get(&self) -> Vec<IpNet> {
        self.ranges.read().clone()
    }
}
