//! Kernel utilities shared by the CastShelf binaries.
//! Keep this crate lightweight: configuration loading and credential checks, nothing stateful.
//!
//! ## Config loading
//! ```rust,no_run
//! use shelf_kernel::config::load_config;
//! use shelf_kernel::domain::config::AppConfig;
//!
//! let cfg: AppConfig = load_config(Some("server")).unwrap_or_default();
//! ```
//!
//! ## Basic credentials
//! ```rust
//! use shelf_kernel::security::BasicCredentials;
//!
//! let creds = BasicCredentials::from_header("Basic YWxpY2U6czNjcmV0").unwrap();
//! assert_eq!(creds.username(), "alice");
//! assert!(creds.matches("alice", "s3cret"));
//! ```
pub mod config;
pub mod security;

pub use shelf_domain as domain;
