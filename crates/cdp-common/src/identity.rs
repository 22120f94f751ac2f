//! IAM user and access key value types
//!
//! The secret half of an access key is only ever returned by the provider
//! when the key is created. [`AccessKeyPair`] is the one type that carries
//! it; everything produced by a listing is an [`AccessKey`], which has no
//! secret and renders as [`REDACTED`].

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Placeholder shown wherever a secret would go
pub const REDACTED: &str = "REDACTED";

/// An IAM user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub path: String,
    pub arn: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Either a user name still to be looked up, or an already resolved user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRef {
    Name(String),
    Handle(Identity),
}

impl IdentityRef {
    /// User name, without resolving anything.
    pub fn name(&self) -> &str {
        match self {
            IdentityRef::Name(name) => name,
            IdentityRef::Handle(identity) => &identity.name,
        }
    }
}

impl From<&str> for IdentityRef {
    fn from(name: &str) -> Self {
        IdentityRef::Name(name.to_string())
    }
}

impl From<String> for IdentityRef {
    fn from(name: String) -> Self {
        IdentityRef::Name(name)
    }
}

impl From<Identity> for IdentityRef {
    fn from(identity: Identity) -> Self {
        IdentityRef::Handle(identity)
    }
}

/// Managed policy attached to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachedPolicy {
    pub policy_name: Option<String>,
    pub policy_arn: String,
}

/// Access key as seen after creation: the id, never the secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessKey {
    pub key_id: String,
    /// `Active` or `Inactive`
    pub status: Option<String>,
}

impl AccessKey {
    /// What to show in the secret column.
    pub fn secret_display(&self) -> &'static str {
        REDACTED
    }
}

/// A freshly created access key, including its secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKeyPair {
    pub key_id: String,
    secret: String,
}

impl AccessKeyPair {
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    /// The secret access key. Show it once; it cannot be fetched again.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Drop the secret, keeping only what a later listing would show.
    pub fn redacted(&self) -> AccessKey {
        AccessKey {
            key_id: self.key_id.clone(),
            status: None,
        }
    }
}

impl std::fmt::Debug for AccessKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeyPair")
            .field("key_id", &self.key_id)
            .field("secret", &REDACTED)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            user_id: "AIDAEXAMPLE".to_string(),
            name: "alice".to_string(),
            path: "/cdp/".to_string(),
            arn: "arn:aws:iam::123456789012:user/cdp/alice".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn identity_ref_name() {
        assert_eq!(IdentityRef::from("bob").name(), "bob");
        assert_eq!(IdentityRef::from(alice()).name(), "alice");
        assert!(matches!(IdentityRef::from(alice()), IdentityRef::Handle(_)));
    }

    #[test]
    fn debug_never_prints_secret() {
        let pair = AccessKeyPair::new("AKIAEXAMPLE", "wJalrXUtnFEMI/K7MDENG");
        let debug = format!("{pair:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(debug.contains(REDACTED));
        assert!(!debug.contains("wJalrXUtnFEMI"));
        assert_eq!(pair.secret(), "wJalrXUtnFEMI/K7MDENG");
    }

    #[test]
    fn redacted_view_has_no_secret() {
        let pair = AccessKeyPair::new("AKIAEXAMPLE", "s3cret");
        let key = pair.redacted();
        assert_eq!(key.key_id, "AKIAEXAMPLE");
        assert_eq!(key.secret_display(), REDACTED);
    }
}
