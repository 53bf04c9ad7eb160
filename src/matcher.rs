//! Binary search over sorted, non-overlapping network prefixes.

use ipnet::IpNet;
use std::cmp::Ordering;
use std::net::IpAddr;

/// Locate the prefix containing `ip` in a list sorted ascending by base
/// address with mutually non-overlapping entries.
///
/// Returns `Ok(index)` of the containing prefix, or `Err(insertion_point)`
/// when no prefix contains the address. O(log n).
///
/// The sorted/non-overlapping precondition is the caller's responsibility;
/// violating it silently yields a wrong result, not an error.
pub fn find(prefixes: &[IpNet], ip: IpAddr) -> Result<usize, usize> {
    prefixes.binary_search_by(|net| {
        if net.contains(&ip) {
            Ordering::Equal
        } else if net.addr() < ip {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    })
}
