//! Shared error types for the admission engine.
//!
//! Analysis- and persistence-specific errors live next to their modules
//! (`analysis::compile::CompileError`, `store::StoreError`); this module
//! holds the parse failures surfaced by every list- and address-accepting
//! entry point.

use thiserror::Error;

/// A malformed IP address or CIDR string.
///
/// Surfaced immediately to the caller; list replacement is all-or-nothing,
/// so a single bad entry leaves the previous list untouched.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The string is not a valid IP address.
    #[error("invalid IP address: {0}")]
    Address(#[from] std::net::AddrParseError),

    /// The string is not a valid CIDR network prefix.
    #[error("invalid network prefix: {0}")]
    Prefix(#[from] ipnet::AddrParseError),
}
