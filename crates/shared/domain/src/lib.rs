//! # Domain Models
//!
//! Plain data shared between the CastShelf binaries and libraries. Only `serde` is allowed
//! here: no I/O, no networking, no policy.

pub mod config;
