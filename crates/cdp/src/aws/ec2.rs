//! EC2 instance and security group access

use crate::aws::context::AwsContext;
use crate::aws::error::{AwsResult, translate};
use aws_sdk_ec2::types::Filter;
use cdp_common::tags::extract_tags;
use cdp_common::{InstanceState, RawInstance, SecurityGroup};
use chrono::DateTime;
use tracing::{debug, info};

/// EC2 client that can address any region
pub struct Ec2Client {
    ctx: AwsContext,
}

impl Ec2Client {
    /// Create an EC2 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// List every instance in `region`, following pagination.
    pub async fn describe_instances(&self, region: &str) -> AwsResult<Vec<RawInstance>> {
        let client = self.ctx.ec2_client(region);
        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = client
                .describe_instances()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| translate(&e))?;

            for reservation in response.reservations() {
                for instance in reservation.instances() {
                    let Some(instance_id) = instance.instance_id() else {
                        continue;
                    };
                    instances.push(RawInstance {
                        instance_id: instance_id.to_string(),
                        instance_type: instance
                            .instance_type()
                            .map(|t| t.as_str().to_string())
                            .unwrap_or_default(),
                        state: instance
                            .state()
                            .and_then(|s| s.name())
                            .map(|n| InstanceState::parse(n.as_str()))
                            .unwrap_or_else(|| InstanceState::Unknown(String::new())),
                        launch_time: instance
                            .launch_time()
                            .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                            .unwrap_or_default()
                            .fixed_offset(),
                        tags: extract_tags(instance.tags(), |t| t.key(), |t| t.value()),
                    });
                }
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(region = %region, count = instances.len(), "Found EC2 instances");
        Ok(instances)
    }

    /// Terminate an instance
    pub async fn terminate_instance(&self, region: &str, instance_id: &str) -> AwsResult<()> {
        info!(region = %region, instance_id = %instance_id, "Terminating instance");

        self.ctx
            .ec2_client(region)
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        Ok(())
    }

    /// List security groups in `region` whose description is exactly
    /// `description`.
    pub async fn describe_security_groups(
        &self,
        region: &str,
        description: &str,
    ) -> AwsResult<Vec<SecurityGroup>> {
        let client = self.ctx.ec2_client(region);
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = client
                .describe_security_groups()
                .filters(
                    Filter::builder()
                        .name("description")
                        .values(description)
                        .build(),
                )
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| translate(&e))?;

            for sg in response.security_groups() {
                let Some(group_id) = sg.group_id() else {
                    continue;
                };
                groups.push(SecurityGroup {
                    group_id: group_id.to_string(),
                    group_name: sg.group_name().unwrap_or_default().to_string(),
                    description: sg.description().unwrap_or_default().to_string(),
                    vpc_id: sg.vpc_id().map(|v| v.to_string()),
                    region: region.to_string(),
                });
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(region = %region, count = groups.len(), "Found security groups");
        Ok(groups)
    }

    /// Delete a security group.
    ///
    /// No retry: a group still referenced by a terminating instance fails
    /// with a dependency violation and is left to the caller.
    pub async fn delete_security_group(&self, region: &str, group_id: &str) -> AwsResult<()> {
        info!(region = %region, sg_id = %group_id, "Deleting security group");

        self.ctx
            .ec2_client(region)
            .delete_security_group()
            .group_id(group_id)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        Ok(())
    }
}

/// Trait for EC2 operations that can be mocked in tests.
///
/// Region is an argument on every call because one tool invocation walks
/// several regions with the same credentials.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait Ec2Operations: Send + Sync {
    /// List every instance in a region
    async fn describe_instances(&self, region: &str) -> AwsResult<Vec<RawInstance>>;

    /// Terminate an instance
    async fn terminate_instance(&self, region: &str, instance_id: &str) -> AwsResult<()>;

    /// List security groups with the given description
    async fn describe_security_groups(
        &self,
        region: &str,
        description: &str,
    ) -> AwsResult<Vec<SecurityGroup>>;

    /// Delete a security group
    async fn delete_security_group(&self, region: &str, group_id: &str) -> AwsResult<()>;
}

impl Ec2Operations for Ec2Client {
    async fn describe_instances(&self, region: &str) -> AwsResult<Vec<RawInstance>> {
        Ec2Client::describe_instances(self, region).await
    }

    async fn terminate_instance(&self, region: &str, instance_id: &str) -> AwsResult<()> {
        Ec2Client::terminate_instance(self, region, instance_id).await
    }

    async fn describe_security_groups(
        &self,
        region: &str,
        description: &str,
    ) -> AwsResult<Vec<SecurityGroup>> {
        Ec2Client::describe_security_groups(self, region, description).await
    }

    async fn delete_security_group(&self, region: &str, group_id: &str) -> AwsResult<()> {
        Ec2Client::delete_security_group(self, region, group_id).await
    }
}

