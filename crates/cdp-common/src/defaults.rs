//! Default configuration values
//!
//! These constants are used when the environment file leaves a key out.

/// Environment name used when `ENV` is not set
pub const DEFAULT_ENV: &str = "development";

/// IAM path new users are created under
pub const DEFAULT_PATH: &str = "/";

/// Description Juju gives every security group it creates
pub const DEFAULT_GROUP_DESCRIPTION: &str = "juju group";

/// Page size requested from IAM when listing users
pub const MAX_LIST_ITEMS: i32 = 999;

/// Instances older than this are reap candidates unless told otherwise
pub const DEFAULT_REAP_AGE_HOURS: i64 = 24;

/// Returns the default IAM path
pub fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

/// Returns the default security group description
pub fn default_group_description() -> String {
    DEFAULT_GROUP_DESCRIPTION.to_string()
}
