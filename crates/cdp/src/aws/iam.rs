//! IAM user, policy attachment and access key access

use crate::aws::context::AwsContext;
use crate::aws::error::{AwsError, AwsResult, translate};
use aws_sdk_iam::Client;
use cdp_common::defaults::MAX_LIST_ITEMS;
use cdp_common::{AccessKey, AccessKeyPair, AttachedPolicy, Identity};
use chrono::DateTime;
use tracing::{debug, info};

/// One page of a user listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPage {
    pub users: Vec<Identity>,
    /// Marker for the next page; `None` when the listing is complete
    pub marker: Option<String>,
}

/// IAM client for managing users and their credentials
pub struct IamClient {
    client: Client,
}

fn identity_from_user(user: &aws_sdk_iam::types::User) -> Identity {
    let created = user.create_date();
    Identity {
        user_id: user.user_id().to_string(),
        name: user.user_name().to_string(),
        path: user.path().to_string(),
        arn: user.arn().to_string(),
        created_at: DateTime::from_timestamp(created.secs(), created.subsec_nanos()),
    }
}

impl IamClient {
    /// Create an IAM client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }

    /// Create a user under `path`
    pub async fn create_user(&self, name: &str, path: &str) -> AwsResult<Identity> {
        info!(user = %name, path = %path, "Creating IAM user");

        let response = self
            .client
            .create_user()
            .user_name(name)
            .path(path)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        response
            .user()
            .map(identity_from_user)
            .ok_or_else(|| AwsError::missing("the created user"))
    }

    /// Look a user up by name
    pub async fn get_user(&self, name: &str) -> AwsResult<Identity> {
        let response = self
            .client
            .get_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        response
            .user()
            .map(identity_from_user)
            .ok_or_else(|| AwsError::missing("the requested user"))
    }

    /// Delete a user. IAM refuses while policies or keys are attached.
    pub async fn delete_user(&self, name: &str) -> AwsResult<()> {
        self.client
            .delete_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        info!(user = %name, "IAM user deleted");
        Ok(())
    }

    /// List one page of users under `path_prefix`, at most
    /// [`MAX_LIST_ITEMS`] per page.
    pub async fn list_users(&self, path_prefix: &str, marker: Option<String>) -> AwsResult<UserPage> {
        let response = self
            .client
            .list_users()
            .path_prefix(path_prefix)
            .max_items(MAX_LIST_ITEMS)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        let users: Vec<Identity> = response.users().iter().map(identity_from_user).collect();
        let marker = if response.is_truncated() {
            response.marker().map(|s| s.to_string())
        } else {
            None
        };

        debug!(path_prefix = %path_prefix, count = users.len(), truncated = marker.is_some(), "Listed IAM users");
        Ok(UserPage { users, marker })
    }

    /// Attach a managed policy to a user
    pub async fn attach_user_policy(&self, name: &str, policy_arn: &str) -> AwsResult<()> {
        self.client
            .attach_user_policy()
            .user_name(name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        debug!(user = %name, policy_arn = %policy_arn, "Policy attached");
        Ok(())
    }

    /// Detach a managed policy from a user
    pub async fn detach_user_policy(&self, name: &str, policy_arn: &str) -> AwsResult<()> {
        self.client
            .detach_user_policy()
            .user_name(name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        debug!(user = %name, policy_arn = %policy_arn, "Policy detached");
        Ok(())
    }

    /// List the managed policies attached to a user, following pagination
    pub async fn list_attached_user_policies(&self, name: &str) -> AwsResult<Vec<AttachedPolicy>> {
        let mut policies = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_attached_user_policies()
                .user_name(name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| translate(&e))?;

            policies.extend(response.attached_policies().iter().filter_map(|p| {
                p.policy_arn().map(|arn| AttachedPolicy {
                    policy_name: p.policy_name().map(|n| n.to_string()),
                    policy_arn: arn.to_string(),
                })
            }));

            if response.is_truncated() {
                marker = response.marker().map(|s| s.to_string());
            }
            if marker.is_none() {
                break;
            }
        }

        Ok(policies)
    }

    /// Create an access key. The secret is only available in this response.
    pub async fn create_access_key(&self, name: &str) -> AwsResult<AccessKeyPair> {
        let response = self
            .client
            .create_access_key()
            .user_name(name)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        let key = response
            .access_key()
            .ok_or_else(|| AwsError::missing("the created access key"))?;

        info!(user = %name, key_id = %key.access_key_id(), "Access key created");
        Ok(AccessKeyPair::new(
            key.access_key_id(),
            key.secret_access_key(),
        ))
    }

    /// Delete an access key
    pub async fn delete_access_key(&self, name: &str, key_id: &str) -> AwsResult<()> {
        self.client
            .delete_access_key()
            .user_name(name)
            .access_key_id(key_id)
            .send()
            .await
            .map_err(|e| translate(&e))?;

        info!(user = %name, key_id = %key_id, "Access key deleted");
        Ok(())
    }

    /// List a user's access keys (ids only)
    pub async fn list_access_keys(&self, name: &str) -> AwsResult<Vec<AccessKey>> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_access_keys()
                .user_name(name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| translate(&e))?;

            keys.extend(response.access_key_metadata().iter().filter_map(|k| {
                k.access_key_id().map(|id| AccessKey {
                    key_id: id.to_string(),
                    status: k.status().map(|s| s.as_str().to_string()),
                })
            }));

            if response.is_truncated() {
                marker = response.marker().map(|s| s.to_string());
            }
            if marker.is_none() {
                break;
            }
        }

        Ok(keys)
    }
}

/// Trait for IAM operations that can be mocked in tests.
///
/// Note: `marker` is `Option<String>` rather than `Option<&str>` to work
/// around mockall lifetime limitations.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait IamOperations: Send + Sync {
    /// Create a user under a path
    async fn create_user(&self, name: &str, path: &str) -> AwsResult<Identity>;

    /// Look a user up by name
    async fn get_user(&self, name: &str) -> AwsResult<Identity>;

    /// Delete a user
    async fn delete_user(&self, name: &str) -> AwsResult<()>;

    /// List one page of users under a path prefix
    async fn list_users(&self, path_prefix: &str, marker: Option<String>) -> AwsResult<UserPage>;

    /// Attach a managed policy to a user
    async fn attach_user_policy(&self, name: &str, policy_arn: &str) -> AwsResult<()>;

    /// Detach a managed policy from a user
    async fn detach_user_policy(&self, name: &str, policy_arn: &str) -> AwsResult<()>;

    /// List the managed policies attached to a user
    async fn list_attached_user_policies(&self, name: &str) -> AwsResult<Vec<AttachedPolicy>>;

    /// Create an access key
    async fn create_access_key(&self, name: &str) -> AwsResult<AccessKeyPair>;

    /// Delete an access key
    async fn delete_access_key(&self, name: &str, key_id: &str) -> AwsResult<()>;

    /// List a user's access keys
    async fn list_access_keys(&self, name: &str) -> AwsResult<Vec<AccessKey>>;
}

impl IamOperations for IamClient {
    async fn create_user(&self, name: &str, path: &str) -> AwsResult<Identity> {
        IamClient::create_user(self, name, path).await
    }

    async fn get_user(&self, name: &str) -> AwsResult<Identity> {
        IamClient::get_user(self, name).await
    }

    async fn delete_user(&self, name: &str) -> AwsResult<()> {
        IamClient::delete_user(self, name).await
    }

    async fn list_users(&self, path_prefix: &str, marker: Option<String>) -> AwsResult<UserPage> {
        IamClient::list_users(self, path_prefix, marker).await
    }

    async fn attach_user_policy(&self, name: &str, policy_arn: &str) -> AwsResult<()> {
        IamClient::attach_user_policy(self, name, policy_arn).await
    }

    async fn detach_user_policy(&self, name: &str, policy_arn: &str) -> AwsResult<()> {
        IamClient::detach_user_policy(self, name, policy_arn).await
    }

    async fn list_attached_user_policies(&self, name: &str) -> AwsResult<Vec<AttachedPolicy>> {
        IamClient::list_attached_user_policies(self, name).await
    }

    async fn create_access_key(&self, name: &str) -> AwsResult<AccessKeyPair> {
        IamClient::create_access_key(self, name).await
    }

    async fn delete_access_key(&self, name: &str, key_id: &str) -> AwsResult<()> {
        IamClient::delete_access_key(self, name, key_id).await
    }

    async fn list_access_keys(&self, name: &str) -> AwsResult<Vec<AccessKey>> {
        IamClient::list_access_keys(self, name).await
    }
}
