//! Raw and classified EC2 instances
//!
//! [`classify`] turns the provider's record into a [`ClassifiedInstance`]
//! whose Juju-specific fields are read out of the tag set. Classification
//! is total: a missing tag yields the field's default, never an error.

use crate::ordering;
use crate::tags::{NIL, TagField, TagSet, short_id};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// EC2 instance lifecycle state as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
    /// A state name this version does not know about
    Unknown(String),
}

impl InstanceState {
    /// Parse the provider's state name.
    pub fn parse(name: &str) -> Self {
        match name {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            other => InstanceState::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::Unknown(name) => name,
        }
    }

    /// Whether the instance still exists and can be terminated.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            InstanceState::Pending
                | InstanceState::Running
                | InstanceState::Stopping
                | InstanceState::Stopped
        )
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance record as the provider returns it
#[derive(Debug, Clone)]
pub struct RawInstance {
    pub instance_id: String,
    pub instance_type: String,
    pub state: InstanceState,
    pub launch_time: DateTime<FixedOffset>,
    pub tags: TagSet,
}

/// Instance annotated with the fields Juju's tags describe.
///
/// Built fresh from every query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedInstance {
    pub id: String,
    pub region: String,
    /// `Name` tag, empty when absent
    pub name: String,
    pub state: InstanceState,
    pub instance_type: String,
    pub launch_time: DateTime<FixedOffset>,
    /// `juju-units-deployed` tag, empty when absent
    pub units_deployed: String,
    /// Model UUID, [`NIL`] when absent
    pub group_uuid: String,
    pub group_short: String,
    /// Controller UUID, [`NIL`] when absent
    pub controller_uuid: String,
    pub controller_short: String,
    pub is_controller: bool,
    /// See [`ordering::sort_key`]
    pub sort_key: String,
}

impl ClassifiedInstance {
    /// Whether Juju's tags tie this instance to a model or a controller.
    pub fn is_juju_owned(&self) -> bool {
        self.is_controller || self.group_uuid != NIL || self.controller_uuid != NIL
    }
}

/// Classify a raw instance listed in `region`.
///
/// Tags are visited once, in provider order; each recognized key
/// overwrites its field, so with aliased keys the last one wins.
pub fn classify(raw: &RawInstance, region: &str) -> ClassifiedInstance {
    let mut name = String::new();
    let mut units_deployed = String::new();
    let mut group_uuid = NIL.to_string();
    let mut controller_uuid = NIL.to_string();
    let mut is_controller = false;

    for (key, value) in &raw.tags {
        match TagField::from_key(key) {
            Some(TagField::Name) => name = value.clone(),
            Some(TagField::GroupUuid) => group_uuid = value.clone(),
            Some(TagField::ControllerUuid) => controller_uuid = value.clone(),
            Some(TagField::UnitsDeployed) => units_deployed = value.clone(),
            Some(TagField::ControllerRole) => is_controller = true,
            None => {}
        }
    }

    let mut instance = ClassifiedInstance {
        id: raw.instance_id.clone(),
        region: region.to_string(),
        name,
        state: raw.state.clone(),
        instance_type: raw.instance_type.clone(),
        launch_time: raw.launch_time,
        units_deployed,
        group_short: short_id(&group_uuid).to_string(),
        group_uuid,
        controller_short: short_id(&controller_uuid).to_string(),
        controller_uuid,
        is_controller,
        sort_key: String::new(),
    };
    instance.sort_key = ordering::sort_key(&instance);
    instance
}
