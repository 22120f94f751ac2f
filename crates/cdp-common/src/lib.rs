//! cdp-common - Shared types for the cdp operator tool
//!
//! This crate holds the part of cdp that never talks to AWS: interpreting
//! the metadata Juju embeds in resource tags, ordering the result for
//! review, and the identity/key value types. It has no AWS SDK dependency
//! so the classification rules can be tested in isolation.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`group`]: Security group view
//! - [`identity`]: IAM user and access key value types
//! - [`instance`]: Raw and classified EC2 instances
//! - [`ordering`]: Composite sort key and per-region ordering
//! - [`tags`]: Juju tag schema and tag extraction

pub mod defaults;
pub mod group;
pub mod identity;
pub mod instance;
pub mod ordering;
pub mod tags;

// Re-export commonly used types
pub use group::SecurityGroup;
pub use identity::{AccessKey, AccessKeyPair, AttachedPolicy, Identity, IdentityRef, REDACTED};
pub use instance::{ClassifiedInstance, InstanceState, RawInstance, classify};
pub use ordering::{order, sort_key};
pub use tags::TagSet;
