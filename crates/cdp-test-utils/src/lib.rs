//! Shared test utilities for cdp
//!
//! Helpers for the live-AWS integration tests, which are `#[ignore]`d and
//! only run on demand.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique test names

pub mod aws;

// Re-export commonly used items
pub use aws::{get_test_region, test_path, test_user_name};
