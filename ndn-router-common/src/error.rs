//! Failure types shared across the router's crates.

use thiserror::Error;

/// Everything that can go wrong inside the router itself. Transport-level
/// I/O converts in via `From`; the rest are built at the point of failure.
#[derive(Error, Debug)]
pub enum Error {
    /// A TLV field could not be read or contradicted itself.
    #[error("bad TLV encoding: {0}")]
    Tlv(String),

    /// Bytes decoded, but not into a valid Interest or Data.
    #[error("malformed NDN packet: {0}")]
    NdnPacket(String),

    /// A face or the transport behind it became unusable.
    #[error("face unusable: {0}")]
    Face(String),

    /// Socket-level failure surfaced by the runtime.
    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
