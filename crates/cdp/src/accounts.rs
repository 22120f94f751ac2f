//! IAM user lifecycle
//!
//! Creates developer accounts (user, policy, one access key) and tears
//! them down again. IAM refuses to delete a user that still has policies
//! attached or access keys, so deletion always runs
//! detach policies -> delete keys -> delete user, one call at a time.
//!
//! Nothing here rolls back. If `create_account` fails after the user was
//! created, the partly provisioned user stays behind and `delete_identity`
//! is the way to clean it up.

use crate::aws::{AwsError, AwsResult, IamOperations, ignore_not_found};
use crate::config::Config;
use cdp_common::{AccessKey, AccessKeyPair, AttachedPolicy, Identity, IdentityRef};
use thiserror::Error;
use tracing::{debug, info};

/// Failures of [`Accounts::create_account`]
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("No policy given and no policy-arn configured")]
    MissingPolicy,

    #[error(transparent)]
    Aws(#[from] AwsError),
}

/// Result of deleting something that may already be gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyDeleted,
}

/// A user with the ids of its access keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserKeys {
    pub identity: Identity,
    pub keys: Vec<AccessKey>,
}

/// Manages IAM users and their dependent policies and keys
pub struct Accounts<I> {
    iam: I,
    default_path: String,
    policy_arn: Option<String>,
}

impl<I: IamOperations> Accounts<I> {
    pub fn new(iam: I, config: &Config) -> Self {
        Self {
            iam,
            default_path: config.default_path.clone(),
            policy_arn: config.policy_arn.clone(),
        }
    }

    /// Create a user, attach a policy and issue one access key.
    ///
    /// `path` defaults to the configured path and `policy` to the
    /// configured policy ARN. The returned pair is the only time the
    /// secret is available.
    pub async fn create_account(
        &self,
        name: &str,
        path: Option<&str>,
        policy: Option<&str>,
    ) -> Result<(Identity, AccessKeyPair), AccountError> {
        let policy = policy
            .or(self.policy_arn.as_deref())
            .ok_or(AccountError::MissingPolicy)?;
        let path = path.unwrap_or(&self.default_path);

        let identity = self.iam.create_user(name, path).await?;
        self.iam.attach_user_policy(&identity.name, policy).await?;
        let key = self.iam.create_access_key(&identity.name).await?;

        info!(user = %identity.name, path = %identity.path, policy_arn = %policy, "Account created");
        Ok((identity, key))
    }

    /// Resolve a reference to a user. A handle is returned as is.
    pub async fn get_identity(&self, identity: &IdentityRef) -> AwsResult<Identity> {
        match identity {
            IdentityRef::Handle(identity) => Ok(identity.clone()),
            IdentityRef::Name(name) => self.iam.get_user(name).await,
        }
    }

    /// List users under `path` (the configured path by default), following
    /// every page.
    pub async fn list_identities(&self, path: Option<&str>) -> AwsResult<Vec<Identity>> {
        let path = path.unwrap_or(&self.default_path);
        let mut identities = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self.iam.list_users(path, marker.take()).await?;
            identities.extend(page.users);
            match page.marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        debug!(path = %path, count = identities.len(), "Listed identities");
        Ok(identities)
    }

    /// Policies currently attached to a user.
    pub async fn attached_policies(&self, identity: &IdentityRef) -> AwsResult<Vec<AttachedPolicy>> {
        let identity = self.get_identity(identity).await?;
        self.iam.list_attached_user_policies(&identity.name).await
    }

    /// A user's access keys. Secrets are never part of a listing.
    pub async fn list_keys(&self, identity: &IdentityRef) -> AwsResult<Vec<AccessKey>> {
        let identity = self.get_identity(identity).await?;
        self.iam.list_access_keys(&identity.name).await
    }

    /// Keys for one named user, or for every user under `path` (the
    /// configured path by default). Users without keys are included.
    pub async fn keys_by_user(
        &self,
        name: Option<&str>,
        path: Option<&str>,
    ) -> AwsResult<Vec<UserKeys>> {
        let identities = match name {
            Some(name) => vec![self.iam.get_user(name).await?],
            None => self.list_identities(path).await?,
        };

        let mut result = Vec::with_capacity(identities.len());
        for identity in identities {
            let keys = self.iam.list_access_keys(&identity.name).await?;
            result.push(UserKeys { identity, keys });
        }
        Ok(result)
    }

    /// Issue a new access key.
    pub async fn create_key_pair(&self, identity: &IdentityRef) -> AwsResult<AccessKeyPair> {
        let identity = self.get_identity(identity).await?;
        self.iam.create_access_key(&identity.name).await
    }

    /// Delete one access key.
    pub async fn delete_key(&self, identity: &IdentityRef, key_id: &str) -> AwsResult<()> {
        let identity = self.get_identity(identity).await?;
        self.iam.delete_access_key(&identity.name, key_id).await
    }

    /// Delete every access key a user has, returning how many went.
    ///
    /// Keys are deleted in listing order; the first failure stops the loop
    /// and earlier deletions stand.
    pub async fn delete_keys(&self, identity: &IdentityRef) -> AwsResult<usize> {
        let identity = self.get_identity(identity).await?;
        let keys = self.iam.list_access_keys(&identity.name).await?;

        for key in &keys {
            self.iam.delete_access_key(&identity.name, &key.key_id).await?;
        }

        debug!(user = %identity.name, count = keys.len(), "Access keys deleted");
        Ok(keys.len())
    }

    /// Replace all of a user's keys with one new pair.
    pub async fn refresh_keys(&self, identity: &IdentityRef) -> AwsResult<AccessKeyPair> {
        let identity = IdentityRef::Handle(self.get_identity(identity).await?);
        self.delete_keys(&identity).await?;
        self.create_key_pair(&identity).await
    }

    /// Delete a user along with its policy attachments and keys.
    ///
    /// A user that does not exist counts as already deleted. A handle is
    /// trusted without a lookup.
    pub async fn delete_identity(&self, identity: &IdentityRef) -> AwsResult<DeleteOutcome> {
        let Some(identity) = ignore_not_found(self.get_identity(identity).await)? else {
            debug!(user = %identity.name(), "User does not exist, nothing to delete");
            return Ok(DeleteOutcome::AlreadyDeleted);
        };

        for policy in self.iam.list_attached_user_policies(&identity.name).await? {
            self.iam
                .detach_user_policy(&identity.name, &policy.policy_arn)
                .await?;
        }

        let name = identity.name.clone();
        self.delete_keys(&IdentityRef::Handle(identity)).await?;
        self.iam.delete_user(&name).await?;

        info!(user = %name, "User deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::UserPage;
    use crate::aws::iam::MockIamOperations;
    use crate::aws::classify_aws_error;
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn config(policy_arn: Option<&str>) -> Config {
        Config {
            regions: vec!["us-east-1".to_string()],
            default_path: "/cdp/".to_string(),
            policy_arn: policy_arn.map(|p| p.to_string()),
            group_description: "juju group".to_string(),
            aws_profile: None,
        }
    }

    fn user(name: &str) -> Identity {
        Identity {
            user_id: format!("AIDA{}", name.to_uppercase()),
            name: name.to_string(),
            path: "/cdp/".to_string(),
            arn: format!("arn:aws:iam::123456789012:user/cdp/{name}"),
            created_at: None,
        }
    }

    fn key(id: &str) -> AccessKey {
        AccessKey {
            key_id: id.to_string(),
            status: Some("Active".to_string()),
        }
    }

    fn no_such_entity() -> AwsError {
        classify_aws_error("NoSuchEntity", "The user with name bob cannot be found.")
    }

    const POLICY: &str = "arn:aws:iam::123456789012:policy/dev";

    #[tokio::test]
    async fn create_account_uses_configured_defaults() {
        let mut iam = MockIamOperations::new();
        let mut seq = Sequence::new();
        iam.expect_create_user()
            .with(eq("bob"), eq("/cdp/"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name, _| Ok(user(name)));
        iam.expect_attach_user_policy()
            .with(eq("bob"), eq(POLICY))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        iam.expect_create_access_key()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(AccessKeyPair::new("AKIA1", "secret1")));

        let accounts = Accounts::new(iam, &config(Some(POLICY)));
        let (identity, pair) = accounts.create_account("bob", None, None).await.unwrap();
        assert_eq!(identity.name, "bob");
        assert_eq!(pair.key_id, "AKIA1");
        assert_eq!(pair.secret(), "secret1");
    }

    #[tokio::test]
    async fn create_account_explicit_path_and_policy() {
        let mut iam = MockIamOperations::new();
        iam.expect_create_user()
            .with(eq("carol"), eq("/ops/"))
            .returning(|name, _| Ok(user(name)));
        iam.expect_attach_user_policy()
            .with(eq("carol"), eq("arn:custom"))
            .returning(|_, _| Ok(()));
        iam.expect_create_access_key()
            .returning(|_| Ok(AccessKeyPair::new("AKIA2", "s")));

        let accounts = Accounts::new(iam, &config(None));
        accounts
            .create_account("carol", Some("/ops/"), Some("arn:custom"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_account_without_policy_makes_no_calls() {
        let iam = MockIamOperations::new();
        let accounts = Accounts::new(iam, &config(None));
        let err = accounts.create_account("bob", None, None).await.unwrap_err();
        assert!(matches!(err, AccountError::MissingPolicy));
    }

    #[tokio::test]
    async fn create_account_leaves_partial_user_on_failure() {
        let mut iam = MockIamOperations::new();
        iam.expect_create_user()
            .returning(|name, _| Ok(user(name)));
        iam.expect_attach_user_policy()
            .returning(|_, _| Err(classify_aws_error("AccessDenied", "not allowed")));
        iam.expect_create_access_key().never();
        iam.expect_delete_user().never();

        let accounts = Accounts::new(iam, &config(Some(POLICY)));
        let err = accounts.create_account("bob", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            AccountError::Aws(AwsError::AccessDenied { .. })
        ));
    }

    #[tokio::test]
    async fn get_identity_handle_is_not_requeried() {
        let mut iam = MockIamOperations::new();
        iam.expect_get_user().never();

        let accounts = Accounts::new(iam, &config(None));
        let resolved = accounts
            .get_identity(&IdentityRef::Handle(user("bob")))
            .await
            .unwrap();
        assert_eq!(resolved, user("bob"));
    }

    #[tokio::test]
    async fn get_identity_missing_user() {
        let mut iam = MockIamOperations::new();
        iam.expect_get_user()
            .with(eq("ghost"))
            .returning(|_| Err(no_such_entity()));

        let accounts = Accounts::new(iam, &config(None));
        let err = accounts.get_identity(&"ghost".into()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_keys_with_no_keys_only_lists() {
        let mut iam = MockIamOperations::new();
        iam.expect_list_access_keys()
            .times(1)
            .returning(|_| Ok(vec![]));
        iam.expect_delete_access_key().never();
        iam.expect_get_user().never();

        let accounts = Accounts::new(iam, &config(None));
        let deleted = accounts
            .delete_keys(&IdentityRef::Handle(user("bob")))
            .await
            .unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn delete_keys_stops_at_first_failure() {
        let mut iam = MockIamOperations::new();
        iam.expect_list_access_keys()
            .returning(|_| Ok(vec![key("AKIA1"), key("AKIA2"), key("AKIA3")]));
        iam.expect_delete_access_key()
            .with(eq("bob"), eq("AKIA1"))
            .times(1)
            .returning(|_, _| Ok(()));
        iam.expect_delete_access_key()
            .with(eq("bob"), eq("AKIA2"))
            .times(1)
            .returning(|_, _| Err(classify_aws_error("Throttling", "slow down")));
        iam.expect_delete_access_key()
            .with(eq("bob"), eq("AKIA3"))
            .never();

        let accounts = Accounts::new(iam, &config(None));
        let err = accounts
            .delete_keys(&IdentityRef::Handle(user("bob")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("Throttling"));
    }

    #[tokio::test]
    async fn delete_identity_cascades_in_order() {
        let mut iam = MockIamOperations::new();
        let mut seq = Sequence::new();
        iam.expect_get_user()
            .with(eq("bob"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name| Ok(user(name)));
        iam.expect_list_attached_user_policies()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(vec![
                    AttachedPolicy {
                        policy_name: Some("dev".to_string()),
                        policy_arn: "arn:p1".to_string(),
                    },
                    AttachedPolicy {
                        policy_name: None,
                        policy_arn: "arn:p2".to_string(),
                    },
                ])
            });
        iam.expect_detach_user_policy()
            .with(eq("bob"), eq("arn:p1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        iam.expect_detach_user_policy()
            .with(eq("bob"), eq("arn:p2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        iam.expect_list_access_keys()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![key("AKIA1")]));
        iam.expect_delete_access_key()
            .with(eq("bob"), eq("AKIA1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        iam.expect_delete_user()
            .with(eq("bob"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let accounts = Accounts::new(iam, &config(None));
        let outcome = accounts.delete_identity(&"bob".into()).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
    }

    #[tokio::test]
    async fn delete_identity_twice_is_noop_second_time() {
        let mut iam = MockIamOperations::new();
        let mut seq = Sequence::new();
        iam.expect_get_user()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name| Ok(user(name)));
        iam.expect_list_attached_user_policies()
            .times(1)
            .returning(|_| Ok(vec![]));
        iam.expect_list_access_keys()
            .times(1)
            .returning(|_| Ok(vec![]));
        iam.expect_delete_user()
            .times(1)
            .returning(|_| Ok(()));
        iam.expect_get_user()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(no_such_entity()));

        let accounts = Accounts::new(iam, &config(None));
        assert_eq!(
            accounts.delete_identity(&"bob".into()).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            accounts.delete_identity(&"bob".into()).await.unwrap(),
            DeleteOutcome::AlreadyDeleted
        );
    }

    #[tokio::test]
    async fn delete_identity_propagates_other_lookup_errors() {
        let mut iam = MockIamOperations::new();
        iam.expect_get_user()
            .returning(|_| Err(classify_aws_error("AccessDenied", "no")));
        iam.expect_delete_user().never();

        let accounts = Accounts::new(iam, &config(None));
        let err = accounts.delete_identity(&"bob".into()).await.unwrap_err();
        assert!(matches!(err, AwsError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn delete_identity_stops_if_detach_fails() {
        let mut iam = MockIamOperations::new();
        iam.expect_get_user().returning(|name| Ok(user(name)));
        iam.expect_list_attached_user_policies().returning(|_| {
            Ok(vec![AttachedPolicy {
                policy_name: None,
                policy_arn: "arn:p1".to_string(),
            }])
        });
        iam.expect_detach_user_policy()
            .returning(|_, _| Err(classify_aws_error("AccessDenied", "no")));
        iam.expect_list_access_keys().never();
        iam.expect_delete_user().never();

        let accounts = Accounts::new(iam, &config(None));
        assert!(accounts.delete_identity(&"bob".into()).await.is_err());
    }

    #[tokio::test]
    async fn list_identities_follows_markers() {
        let mut iam = MockIamOperations::new();
        iam.expect_list_users()
            .with(eq("/cdp/"), eq(None::<String>))
            .times(1)
            .returning(|_, _| {
                Ok(UserPage {
                    users: vec![user("a"), user("b")],
                    marker: Some("page2".to_string()),
                })
            });
        iam.expect_list_users()
            .with(eq("/cdp/"), eq(Some("page2".to_string())))
            .times(1)
            .returning(|_, _| {
                Ok(UserPage {
                    users: vec![user("c")],
                    marker: None,
                })
            });

        let accounts = Accounts::new(iam, &config(None));
        let names: Vec<_> = accounts
            .list_identities(None)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn refresh_keys_replaces_all_keys() {
        let mut iam = MockIamOperations::new();
        let mut seq = Sequence::new();
        iam.expect_get_user()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name| Ok(user(name)));
        iam.expect_list_access_keys()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![key("AKIAOLD")]));
        iam.expect_delete_access_key()
            .with(eq("bob"), eq("AKIAOLD"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        iam.expect_create_access_key()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(AccessKeyPair::new("AKIANEW", "fresh")));

        let accounts = Accounts::new(iam, &config(None));
        let pair = accounts.refresh_keys(&"bob".into()).await.unwrap();
        assert_eq!(pair.key_id, "AKIANEW");
    }

    #[tokio::test]
    async fn keys_by_user_lists_every_user_under_path() {
        let mut iam = MockIamOperations::new();
        iam.expect_list_users()
            .with(eq("/dev/"), eq(None::<String>))
            .times(1)
            .returning(|_, _| {
                Ok(UserPage {
                    users: vec![user("alice"), user("bob")],
                    marker: None,
                })
            });
        iam.expect_get_user().never();
        iam.expect_list_access_keys()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Ok(vec![key("AKIA1"), key("AKIA2")]));
        iam.expect_list_access_keys()
            .with(eq("bob"))
            .times(1)
            .returning(|_| Ok(vec![]));

        let accounts = Accounts::new(iam, &config(None));
        let listing = accounts.keys_by_user(None, Some("/dev/")).await.unwrap();

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].identity.name, "alice");
        assert_eq!(listing[0].keys.len(), 2);
        assert_eq!(listing[1].identity.name, "bob");
        assert!(listing[1].keys.is_empty());
    }

    #[tokio::test]
    async fn keys_by_user_with_name_skips_listing() {
        let mut iam = MockIamOperations::new();
        iam.expect_list_users().never();
        iam.expect_get_user()
            .with(eq("carol"))
            .times(1)
            .returning(|name| Ok(user(name)));
        iam.expect_list_access_keys()
            .returning(|_| Ok(vec![key("AKIA3")]));

        let accounts = Accounts::new(iam, &config(None));
        let listing = accounts.keys_by_user(Some("carol"), None).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].keys[0].key_id, "AKIA3");
    }
}
