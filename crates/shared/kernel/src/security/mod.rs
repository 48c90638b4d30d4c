mod basic;

pub use basic::{BasicCredentials, SecurityError, SecurityErrorExt};
pub use shelf_storage::secure_eq;
