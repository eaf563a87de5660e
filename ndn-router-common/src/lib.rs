//! Common types and utilities for the NDN name router.
//!
//! This crate provides the packet codec and shared plumbing used by the
//! router daemon, the face layer and the operator CLI.

pub mod error;
pub mod keychain;
pub mod metrics;
pub mod ndn;
pub mod tlv;

pub use error::Error;

/// Crate-wide result alias over [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
