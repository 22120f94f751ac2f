//! Juju resource tag schema
//!
//! Juju records ownership of the machines it provisions in EC2 tags. Some
//! keys were renamed between Juju releases ("environment" became "model",
//! "state server" became "controller"); both spellings are recognized and
//! feed the same field.
//!
//! ## Tag Schema
//!
//! | Tag Key | Field |
//! |---------|-------|
//! | `Name` | Friendly name |
//! | `juju-env-uuid` (legacy), `juju-model-uuid` | Model UUID |
//! | `juju-controller-uuid` | Controller UUID |
//! | `juju-units-deployed` | Units deployed on the machine |
//! | `juju-is-state` (legacy), `juju-is-controller` | Machine is a controller |
//!
//! When a legacy and a current key appear on the same resource, whichever
//! comes later in the provider's tag order wins.

/// Ordered key/value pairs as returned by the provider.
///
/// Order is kept because alias resolution depends on it.
pub type TagSet = Vec<(String, String)>;

/// Tag key for the friendly instance name
pub const TAG_NAME: &str = "Name";

/// Legacy tag key for the model UUID (Juju 1.x "environment")
pub const TAG_ENV_UUID: &str = "juju-env-uuid";

/// Tag key for the model UUID
pub const TAG_MODEL_UUID: &str = "juju-model-uuid";

/// Tag key for the owning controller's UUID
pub const TAG_CONTROLLER_UUID: &str = "juju-controller-uuid";

/// Tag key for the deployed unit list
pub const TAG_UNITS_DEPLOYED: &str = "juju-units-deployed";

/// Legacy controller marker (Juju 1.x "state server")
pub const TAG_IS_STATE: &str = "juju-is-state";

/// Controller marker
pub const TAG_IS_CONTROLLER: &str = "juju-is-controller";

/// Keys carrying the model UUID, legacy first
pub const GROUP_UUID_KEYS: &[&str] = &[TAG_ENV_UUID, TAG_MODEL_UUID];

/// Keys carrying the controller UUID
pub const CONTROLLER_UUID_KEYS: &[&str] = &[TAG_CONTROLLER_UUID];

/// Keys whose presence marks a controller machine, legacy first
pub const CONTROLLER_ROLE_KEYS: &[&str] = &[TAG_IS_STATE, TAG_IS_CONTROLLER];

/// Placeholder for model/controller fields whose tag is absent
pub const NIL: &str = "nil";

/// Derived field a recognized tag key populates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagField {
    Name,
    GroupUuid,
    ControllerUuid,
    UnitsDeployed,
    ControllerRole,
}

impl TagField {
    /// Look up the field a tag key feeds, if any.
    pub fn from_key(key: &str) -> Option<Self> {
        if key == TAG_NAME {
            Some(TagField::Name)
        } else if GROUP_UUID_KEYS.contains(&key) {
            Some(TagField::GroupUuid)
        } else if CONTROLLER_UUID_KEYS.contains(&key) {
            Some(TagField::ControllerUuid)
        } else if key == TAG_UNITS_DEPLOYED {
            Some(TagField::UnitsDeployed)
        } else if CONTROLLER_ROLE_KEYS.contains(&key) {
            Some(TagField::ControllerRole)
        } else {
            None
        }
    }
}

/// First dash-delimited segment of a UUID.
pub fn short_id(value: &str) -> &str {
    value.split('-').next().unwrap_or(value)
}

/// Extract tags from any AWS tag type into an ordered [`TagSet`].
///
/// The EC2 and IAM SDKs each have their own tag type with optional or
/// required key/value accessors; closures adapt them. Tags missing either
/// half are dropped.
pub fn extract_tags<T>(
    tags: &[T],
    key: impl Fn(&T) -> Option<&str>,
    value: impl Fn(&T) -> Option<&str>,
) -> TagSet {
    tags.iter()
        .filter_map(|t| match (key(t), value(t)) {
            (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
            _ => None,
        })
        .collect()
}
