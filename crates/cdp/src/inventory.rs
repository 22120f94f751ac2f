//! Region-scoped queries and teardown of Juju compute resources
//!
//! Regions are walked one at a time. Each region's instances are
//! classified and then ordered on their own; results are never merged
//! across regions.

use crate::aws::{AwsResult, Ec2Operations};
use crate::config::Config;
use cdp_common::{ClassifiedInstance, SecurityGroup, classify, order};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Instances per region, each list in sort-key order
pub type InstancesByRegion = BTreeMap<String, Vec<ClassifiedInstance>>;

/// Juju security groups per region
pub type GroupsByRegion = BTreeMap<String, Vec<SecurityGroup>>;

/// Result of a best-effort security group deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupDeletion {
    Deleted,
    /// Something still references the group; it was left in place
    InUse { message: String },
}

/// Facade over EC2 for listing and destroying Juju resources
pub struct Inventory<E> {
    ec2: E,
    regions: Vec<String>,
    group_description: String,
}

impl<E: Ec2Operations> Inventory<E> {
    pub fn new(ec2: E, config: &Config) -> Self {
        Self {
            ec2,
            regions: config.regions.clone(),
            group_description: config.group_description.clone(),
        }
    }

    fn regions<'a>(&'a self, regions: Option<&'a [String]>) -> &'a [String] {
        match regions {
            Some(r) if !r.is_empty() => r,
            _ => &self.regions,
        }
    }

    /// Classified instances for each region (the configured ones by
    /// default).
    pub async fn list_instances(&self, regions: Option<&[String]>) -> AwsResult<InstancesByRegion> {
        let mut result = BTreeMap::new();

        for region in self.regions(regions) {
            let classified: Vec<_> = self
                .ec2
                .describe_instances(region)
                .await?
                .iter()
                .map(|raw| classify(raw, region))
                .collect();
            debug!(region = %region, count = classified.len(), "Classified instances");
            result.insert(region.clone(), order(classified));
        }

        Ok(result)
    }

    /// Security groups carrying Juju's description, per region.
    pub async fn list_groups(&self, regions: Option<&[String]>) -> AwsResult<GroupsByRegion> {
        let mut result = BTreeMap::new();

        for region in self.regions(regions) {
            let groups = self
                .ec2
                .describe_security_groups(region, &self.group_description)
                .await?;
            debug!(region = %region, count = groups.len(), "Found Juju security groups");
            result.insert(region.clone(), groups);
        }

        Ok(result)
    }

    /// Find instances by id across the given regions.
    ///
    /// Ids that match nothing are silently absent from the result.
    pub async fn find_instances(
        &self,
        ids: &[String],
        regions: Option<&[String]>,
    ) -> AwsResult<Vec<ClassifiedInstance>> {
        let found = self
            .list_instances(regions)
            .await?
            .into_values()
            .flatten()
            .filter(|i| ids.contains(&i.id))
            .collect();
        Ok(found)
    }

    /// Find security groups by id across the given regions.
    pub async fn find_groups(
        &self,
        ids: &[String],
        regions: Option<&[String]>,
    ) -> AwsResult<Vec<SecurityGroup>> {
        let found = self
            .list_groups(regions)
            .await?
            .into_values()
            .flatten()
            .filter(|g| ids.contains(&g.group_id))
            .collect();
        Ok(found)
    }

    /// Terminate an instance in its own region.
    pub async fn terminate(&self, instance: &ClassifiedInstance) -> AwsResult<()> {
        self.ec2
            .terminate_instance(&instance.region, &instance.id)
            .await?;
        info!(
            instance_id = %instance.id,
            name = %instance.name,
            region = %instance.region,
            "Instance terminated"
        );
        Ok(())
    }

    /// Delete a security group, reporting rather than failing when the
    /// group is still in use.
    pub async fn delete_group(&self, group: &SecurityGroup) -> AwsResult<GroupDeletion> {
        match self
            .ec2
            .delete_security_group(&group.region, &group.group_id)
            .await
        {
            Ok(()) => Ok(GroupDeletion::Deleted),
            Err(e) if e.is_dependency_violation() => {
                warn!(sg_id = %group.group_id, region = %group.region, error = %e, "Security group still in use");
                Ok(GroupDeletion::InUse {
                    message: format!(
                        "{} ({}) in {} is still in use: {}",
                        group.group_id, group.group_name, group.region, e
                    ),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Instances that may be reaped: tagged by Juju, live, not a controller,
/// and launched more than `max_age` before `now`. Input order is kept.
///
/// Instances without any model or controller tag are never candidates.
pub fn reap_candidates(
    instances: &[ClassifiedInstance],
    max_age: Duration,
    now: DateTime<Utc>,
) -> Vec<&ClassifiedInstance> {
    instances
        .iter()
        .filter(|i| i.is_juju_owned())
        .filter(|i| !i.is_controller)
        .filter(|i| i.state.is_live())
        .filter(|i| now.signed_duration_since(i.launch_time) > max_age)
        .collect()
}
