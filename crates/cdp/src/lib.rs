//! cdp - reaping Juju-provisioned EC2 resources and managing IAM users
//!
//! The binary lists what Juju left behind in each configured region,
//! ordered by controller and model, and tears down what the operator
//! selects. It also provisions and removes IAM users for developers.

pub mod accounts;
pub mod aws;
pub mod config;
pub mod inventory;
pub mod output;
