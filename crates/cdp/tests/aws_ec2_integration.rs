//! EC2 integration tests - read-only calls against a real account
//!
//! These tests are marked `#[ignore]` and only run with:
//! ```
//! AWS_PROFILE=your_profile cargo test -p cdp --test aws_ec2_integration -- --ignored
//! ```

use cdp::aws::{AwsContext, Ec2Client};
use cdp::config::Config;
use cdp::inventory::Inventory;
use cdp_test_utils::aws::get_test_region;

async fn inventory() -> (Inventory<Ec2Client>, String) {
    let region = get_test_region();
    let aws = AwsContext::new(&region, None).await;
    let config = Config {
        regions: vec![region.clone()],
        default_path: "/".to_string(),
        policy_arn: None,
        group_description: "juju group".to_string(),
        aws_profile: None,
    };
    (Inventory::new(Ec2Client::from_context(&aws), &config), region)
}

/// Listing works and each region's instances come back in sort-key order
#[tokio::test]
#[ignore]
async fn test_list_instances_ordered() {
    let (inventory, region) = inventory().await;
    let by_region = inventory
        .list_instances(None)
        .await
        .expect("AWS credentials required - set AWS_PROFILE or AWS_ACCESS_KEY_ID");

    let instances = &by_region[&region];
    assert!(instances.iter().all(|i| i.region == region));
    assert!(
        instances.windows(2).all(|w| w[0].sort_key <= w[1].sort_key),
        "Instances should be ordered by sort key"
    );
}

/// Only groups carrying Juju's description are returned
#[tokio::test]
#[ignore]
async fn test_list_groups_filters_description() {
    let (inventory, region) = inventory().await;
    let groups = inventory
        .list_groups(None)
        .await
        .expect("Should list security groups");

    for group in &groups[&region] {
        assert_eq!(group.description, "juju group");
        assert_eq!(group.region, region);
    }
}
