//! An NDN name router.
//!
//! Forwards Interests towards producers by longest name-prefix match,
//! aggregates duplicates in a Pending Interest Table and carries Data back
//! along the reverse path. Prefix registrations can be checked against an
//! out-of-band manager, and a UDP JSON command channel drives faces, routes
//! and configuration at runtime.

pub mod command;
pub mod config;
pub mod fib;
pub mod pending;
pub mod pit;
pub mod router;

pub use config::Settings;
pub use router::Router;
