//! Table rendering for command output

use crate::accounts::UserKeys;
use cdp_common::{AccessKeyPair, ClassifiedInstance, Identity, SecurityGroup};
use chrono::{DateTime, FixedOffset, Utc};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

fn bare_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn new_table(header: &[&str]) -> Table {
    let mut table = bare_table();
    table.set_header(header.iter().map(Cell::new).collect::<Vec<_>>());
    table
}

/// Compact age such as `3d4h`, `5h12m` or `42m`.
pub fn format_age(launched: DateTime<FixedOffset>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(launched);
    if age.num_seconds() < 0 {
        return "-".to_string();
    }

    let days = age.num_days();
    let hours = age.num_hours() % 24;
    let minutes = age.num_minutes() % 60;
    if days > 0 {
        format!("{days}d{hours}h")
    } else if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Instances in the order given. Controllers are marked with `*`.
pub fn instances_table(instances: &[ClassifiedInstance], now: DateTime<Utc>) -> Table {
    let mut table = new_table(&[
        "", "NAME", "ID", "REGION", "STATE", "TYPE", "AGE", "MODEL", "UNITS",
    ]);

    for i in instances {
        table.add_row(vec![
            Cell::new(if i.is_controller { "*" } else { "" }),
            Cell::new(&i.name),
            Cell::new(&i.id),
            Cell::new(&i.region),
            Cell::new(i.state.as_str()),
            Cell::new(&i.instance_type),
            Cell::new(format_age(i.launch_time, now)),
            Cell::new(&i.group_short),
            Cell::new(&i.units_deployed),
        ]);
    }

    table
}

pub fn groups_table(groups: &[SecurityGroup]) -> Table {
    let mut table = new_table(&["ID", "NAME", "REGION", "VPC"]);
    for g in groups {
        table.add_row(vec![
            Cell::new(&g.group_id),
            Cell::new(&g.group_name),
            Cell::new(&g.region),
            Cell::new(g.vpc_id.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

pub fn identities_table(identities: &[Identity]) -> Table {
    let mut table = new_table(&["NAME", "PATH", "ID", "CREATED"]);
    for u in identities {
        table.add_row(vec![
            Cell::new(&u.name),
            Cell::new(&u.path),
            Cell::new(&u.user_id),
            Cell::new(
                u.created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    table
}

/// Access keys per user. Secrets are never shown here; a user without
/// keys still gets a row. `quiet` drops the header.
pub fn keys_table(users: &[UserKeys], quiet: bool) -> Table {
    let mut table = if quiet {
        bare_table()
    } else {
        new_table(&["USER ID", "NAME", "ACCESS KEY", "SECRET", "STATUS"])
    };

    for user in users {
        if user.keys.is_empty() {
            table.add_row(vec![
                Cell::new(&user.identity.user_id),
                Cell::new(&user.identity.name),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ]);
        }
        for k in &user.keys {
            table.add_row(vec![
                Cell::new(&user.identity.user_id),
                Cell::new(&user.identity.name),
                Cell::new(&k.key_id),
                Cell::new(k.secret_display()),
                Cell::new(k.status.as_deref().unwrap_or("-")),
            ]);
        }
    }
    table
}

/// Credentials for a freshly created key, the only time the secret is
/// printed.
pub fn credentials_block(user: &str, pair: &AccessKeyPair) -> String {
    format!(
        "user: {user}\naws_access_key_id: {}\naws_secret_access_key: {}",
        pair.key_id,
        pair.secret()
    )
}
