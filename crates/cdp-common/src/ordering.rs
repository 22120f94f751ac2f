//! Deterministic ordering of classified instances
//!
//! Instances are ordered by a composite string key,
//! `{controller_uuid}-{group_uuid}-{seconds since epoch}`, which groups
//! machines by controller, then by model, then by launch time. Ordering is
//! always applied to one region's instances at a time.

use crate::instance::ClassifiedInstance;
use chrono::{DateTime, FixedOffset};

/// Seconds between 1970-01-01T00:00:00 and `time`'s wall-clock reading.
///
/// The zone offset is dropped before subtracting, so two launch times are
/// only comparable if they were reported in the same offset. EC2 reports
/// UTC, where this equals the Unix timestamp.
pub fn seconds_since_epoch(time: &DateTime<FixedOffset>) -> i64 {
    time.naive_local().and_utc().timestamp()
}

/// Composite key for an instance.
pub fn sort_key(instance: &ClassifiedInstance) -> String {
    format!(
        "{}-{}-{}",
        instance.controller_uuid,
        instance.group_uuid,
        seconds_since_epoch(&instance.launch_time)
    )
}

/// Stable ascending sort by [`sort_key`].
///
/// Keys are compared as strings, so launch times sort chronologically
/// while their epoch seconds have the same number of digits (any time
/// between 2001-09-09 and 2286-11-20).
pub fn order(mut instances: Vec<ClassifiedInstance>) -> Vec<ClassifiedInstance> {
    instances.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
    instances
}
