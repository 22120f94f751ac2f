//! Security group view

use serde::Serialize;

/// A security group owned by Juju.
///
/// Groups are matched on their description only; nothing is derived from
/// their tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: String,
    pub description: String,
    pub vpc_id: Option<String>,
    /// Region the group was listed in
    pub region: String,
}
