//! AWS client modules
//!
//! This module provides wrappers around AWS SDK clients for:
//! - EC2: Instance listing/termination and security group cleanup
//! - IAM: Users, policy attachments and access keys
//! - error: Translation of SDK failures into [`AwsError`]

pub mod context;
pub mod ec2;
pub mod error;
pub mod iam;

pub use context::AwsContext;
pub use ec2::{Ec2Client, Ec2Operations};
pub use error::{AwsError, AwsResult, classify_aws_error, ignore_not_found, translate};
pub use iam::{IamClient, IamOperations, UserPage};
