//! AWS test utilities
//!
//! Provides region detection and unique name generation for AWS integration tests.

use chrono::Utc;

/// IAM path every test user is created under, so leftovers are easy to find
pub const TEST_PATH: &str = "/cdp-test/";

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-1
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// IAM path for test users.
pub fn test_path() -> String {
    TEST_PATH.to_string()
}

/// Generate a unique IAM user name for a test.
///
/// Format: `cdp-test-{timestamp_ms}-{counter}`. IAM user names are limited
/// to 64 characters, which this stays well under.
///
/// # Example
///
/// ```
/// use cdp_test_utils::aws::test_user_name;
///
/// let name = test_user_name();
/// assert!(name.starts_with("cdp-test-"));
/// ```
pub fn test_user_name() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("cdp-test-{}-{}", ts, counter)
}
