//! cdp: operator tool for Juju environments on AWS
//!
//! Lists and reaps Juju instances, cleans up security groups and manages
//! developer IAM accounts.

use anyhow::{Context, Result, bail};
use cdp::accounts::{Accounts, DeleteOutcome};
use cdp::aws::{AwsContext, Ec2Client, IamClient};
use cdp::config::Config;
use cdp::inventory::{GroupDeletion, Inventory, reap_candidates};
use cdp::output;
use cdp_common::IdentityRef;
use cdp_common::defaults::DEFAULT_REAP_AGE_HOURS;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "cdp")]
#[command(about = "Juju environment housekeeping on AWS")]
#[command(version)]
struct Args {
    /// Environment whose `{env}.yaml` is loaded (default: $ENV or development)
    #[arg(long, global = true)]
    env: Option<String>,

    /// Explicit config file, overriding --env
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// EC2 instances
    #[command(subcommand)]
    Instance(InstanceCommand),

    /// Juju security groups
    #[command(subcommand)]
    Group(GroupCommand),

    /// IAM users
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Subcommand, Debug)]
enum InstanceCommand {
    /// List instances, grouped by controller and model
    List {
        /// Regions to query (default: configured regions)
        #[arg(short, long)]
        region: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Terminate Juju-tagged, non-controller instances older than a time limit
    Reap {
        /// Minimum age, e.g. 90m, 12h, 2d [default: 24h]
        #[arg(short, long, value_parser = parse_timelimit)]
        timelimit: Option<Duration>,

        #[arg(short, long)]
        region: Vec<String>,

        /// Actually terminate (default is dry-run)
        #[arg(short, long)]
        yes: bool,
    },

    /// Terminate instances by id
    Kill {
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(short, long)]
        region: Vec<String>,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    /// List security groups created by Juju
    List {
        #[arg(short, long)]
        region: Vec<String>,
    },

    /// Delete security groups; groups still in use are reported and skipped
    Delete {
        /// Group ids (default: every Juju group found)
        ids: Vec<String>,

        #[arg(short, long)]
        region: Vec<String>,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// List users under a path (default: configured path)
    List { path: Option<String> },

    /// Create a user with a policy and one access key
    #[command(alias = "create")]
    Add {
        name: String,

        /// IAM path (default: configured path)
        #[arg(short, long)]
        path: Option<String>,

        /// Policy ARN (default: configured policy-arn)
        #[arg(short = 'P', long)]
        policy: Option<String>,
    },

    /// Delete users with their policies and keys
    Delete {
        #[arg(required = true)]
        names: Vec<String>,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Access keys
    #[command(subcommand)]
    Keys(KeysCommand),
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// List access keys for one user, or for every user under a path
    List {
        name: Option<String>,

        /// IAM path prefix when no name is given (default: configured path)
        #[arg(short, long)]
        path: Option<String>,

        /// Omit the header row
        #[arg(short, long)]
        quiet: bool,
    },

    /// Replace all of a user's keys with a fresh pair
    Refresh { name: String },

    /// Delete one key, or all keys when none is given
    Delete { name: String, key: Option<String> },
}

/// Parse `30s`, `90m`, `12h`, `2d`. A bare number is hours.
fn parse_timelimit(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s, 'h'),
    };
    let n: i64 = digits
        .parse()
        .map_err(|_| format!("invalid time limit {s:?}"))?;
    if n < 0 {
        return Err(format!("time limit must not be negative: {s:?}"));
    }
    let limit = match unit {
        's' => Duration::try_seconds(n),
        'm' => Duration::try_minutes(n),
        'h' => Duration::try_hours(n),
        'd' => Duration::try_days(n),
        other => return Err(format!("unknown time unit {other:?} in {s:?}, use s, m, h or d")),
    };
    limit.ok_or_else(|| format!("time limit too large: {s:?}"))
}

fn reap_age(timelimit: Option<Duration>) -> Duration {
    timelimit.unwrap_or_else(|| Duration::hours(DEFAULT_REAP_AGE_HOURS))
}

/// Ask on stdin; anything but `y`/`yes` declines.
fn confirm(prompt: &str) -> Result<bool> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{prompt} [y/N] ")?;
    stdout.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn region_filter(regions: &[String]) -> Option<&[String]> {
    (!regions.is_empty()).then_some(regions)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "{level},aws_config=warn,aws_smithy_runtime=warn,aws_sdk_ec2=warn,aws_sdk_iam=warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let env = Config::env_name(args.env.as_deref());
            debug!(env = %env, "Loading environment config");
            Config::load_env(&std::env::current_dir()?, &env)?
        }
    };

    let aws = AwsContext::new(config.home_region(), config.aws_profile.as_deref()).await;
    info!(region = %aws.region(), profile = ?config.aws_profile, "AWS context loaded");

    match args.command {
        Command::Instance(cmd) => {
            let inventory = Inventory::new(Ec2Client::from_context(&aws), &config);
            handle_instance(&inventory, cmd).await
        }
        Command::Group(cmd) => {
            let inventory = Inventory::new(Ec2Client::from_context(&aws), &config);
            handle_group(&inventory, cmd).await
        }
        Command::User(cmd) => {
            let accounts = Accounts::new(IamClient::from_context(&aws), &config);
            handle_user(&accounts, cmd).await
        }
    }
}

async fn handle_instance(inventory: &Inventory<Ec2Client>, cmd: InstanceCommand) -> Result<()> {
    match cmd {
        InstanceCommand::List { region, format } => {
            let by_region = inventory
                .list_instances(region_filter(&region))
                .await
                .context("Failed to list instances")?;

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&by_region)?);
                return Ok(());
            }

            let now = Utc::now();
            for (region, instances) in &by_region {
                println!("{region}: {} instances", instances.len());
                if !instances.is_empty() {
                    println!("{}", output::instances_table(instances, now));
                }
            }
        }

        InstanceCommand::Reap {
            timelimit,
            region,
            yes,
        } => {
            let max_age = reap_age(timelimit);
            let by_region = inventory
                .list_instances(region_filter(&region))
                .await
                .context("Failed to list instances")?;

            let now = Utc::now();
            let mut reaped = 0;
            for (region, instances) in &by_region {
                let candidates = reap_candidates(instances, max_age, now);
                if candidates.is_empty() {
                    continue;
                }

                let owned: Vec<_> = candidates.iter().map(|i| (*i).clone()).collect();
                println!("{region}: {} instances older than the time limit", owned.len());
                println!("{}", output::instances_table(&owned, now));

                if !yes {
                    continue;
                }
                for instance in candidates {
                    inventory
                        .terminate(instance)
                        .await
                        .with_context(|| format!("Failed to terminate {}", instance.id))?;
                    reaped += 1;
                }
            }

            if yes {
                println!("Terminated {reaped} instances");
            } else {
                println!("Dry run. Pass --yes to terminate.");
            }
        }

        InstanceCommand::Kill { ids, region, yes } => {
            let found = inventory
                .find_instances(&ids, region_filter(&region))
                .await
                .context("Failed to look up instances")?;

            for id in ids.iter().filter(|id| !found.iter().any(|i| &i.id == *id)) {
                eprintln!("Instance {id} not found");
            }
            if found.is_empty() {
                bail!("No matching instances");
            }

            println!("{}", output::instances_table(&found, Utc::now()));
            if !yes && !confirm(&format!("Terminate {} instances?", found.len()))? {
                println!("Aborted");
                return Ok(());
            }
            for instance in &found {
                inventory
                    .terminate(instance)
                    .await
                    .with_context(|| format!("Failed to terminate {}", instance.id))?;
            }
        }
    }

    Ok(())
}

async fn handle_group(inventory: &Inventory<Ec2Client>, cmd: GroupCommand) -> Result<()> {
    match cmd {
        GroupCommand::List { region } => {
            let by_region = inventory
                .list_groups(region_filter(&region))
                .await
                .context("Failed to list security groups")?;
            let groups: Vec<_> = by_region.into_values().flatten().collect();
            println!("{}", output::groups_table(&groups));
        }

        GroupCommand::Delete { ids, region, yes } => {
            let groups = if ids.is_empty() {
                inventory
                    .list_groups(region_filter(&region))
                    .await
                    .context("Failed to list security groups")?
                    .into_values()
                    .flatten()
                    .collect()
            } else {
                inventory
                    .find_groups(&ids, region_filter(&region))
                    .await
                    .context("Failed to look up security groups")?
            };

            if groups.is_empty() {
                println!("No security groups to delete");
                return Ok(());
            }

            println!("{}", output::groups_table(&groups));
            if !yes && !confirm(&format!("Delete {} security groups?", groups.len()))? {
                println!("Aborted");
                return Ok(());
            }

            let mut in_use = 0;
            for group in &groups {
                match inventory
                    .delete_group(group)
                    .await
                    .with_context(|| format!("Failed to delete {}", group.group_id))?
                {
                    GroupDeletion::Deleted => println!("Deleted {}", group.group_id),
                    GroupDeletion::InUse { message } => {
                        eprintln!("{message}");
                        in_use += 1;
                    }
                }
            }
            if in_use > 0 {
                println!("{in_use} groups still in use, run again once their instances are gone");
            }
        }
    }

    Ok(())
}

async fn handle_user(accounts: &Accounts<IamClient>, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::List { path } => {
            let identities = accounts
                .list_identities(path.as_deref())
                .await
                .context("Failed to list users")?;
            println!("{}", output::identities_table(&identities));
        }

        UserCommand::Add { name, path, policy } => {
            let (identity, pair) = accounts
                .create_account(&name, path.as_deref(), policy.as_deref())
                .await
                .with_context(|| format!("Failed to create user {name}"))?;
            println!("{}", output::credentials_block(&identity.name, &pair));
        }

        UserCommand::Delete { names, yes } => {
            if !yes && !confirm(&format!("Delete users {}?", names.join(", ")))? {
                println!("Aborted");
                return Ok(());
            }
            for name in names {
                let outcome = accounts
                    .delete_identity(&IdentityRef::from(name.as_str()))
                    .await
                    .with_context(|| format!("Failed to delete user {name}"))?;
                match outcome {
                    DeleteOutcome::Deleted => println!("Deleted {name}"),
                    DeleteOutcome::AlreadyDeleted => eprintln!("User {name} does not exist"),
                }
            }
        }

        UserCommand::Keys(cmd) => handle_keys(accounts, cmd).await?,
    }

    Ok(())
}

async fn handle_keys(accounts: &Accounts<IamClient>, cmd: KeysCommand) -> Result<()> {
    match cmd {
        KeysCommand::List { name, path, quiet } => {
            let listing = accounts
                .keys_by_user(name.as_deref(), path.as_deref())
                .await
                .context("Failed to list access keys")?;
            println!("{}", output::keys_table(&listing, quiet));
        }

        KeysCommand::Refresh { name } => {
            let pair = accounts
                .refresh_keys(&IdentityRef::from(name.as_str()))
                .await
                .with_context(|| format!("Failed to refresh keys for {name}"))?;
            println!("{}", output::credentials_block(&name, &pair));
        }

        KeysCommand::Delete { name, key } => {
            let identity = IdentityRef::from(name.as_str());
            let result = match &key {
                Some(key_id) => accounts.delete_key(&identity, key_id).await.map(|()| 1),
                None => accounts.delete_keys(&identity).await,
            };
            match result {
                Ok(count) => println!("Deleted {count} keys for {name}"),
                Err(e) if e.is_not_found() => eprintln!("User {name} does not exist"),
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to delete keys for {name}"));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timelimit_units() {
        assert_eq!(parse_timelimit("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_timelimit("90m").unwrap(), Duration::minutes(90));
        assert_eq!(parse_timelimit("12h").unwrap(), Duration::hours(12));
        assert_eq!(parse_timelimit("2d").unwrap(), Duration::days(2));
        assert_eq!(parse_timelimit("6").unwrap(), Duration::hours(6));
        assert_eq!(
            parse_timelimit(&format!("{DEFAULT_REAP_AGE_HOURS}h")).unwrap(),
            reap_age(None)
        );
        assert_eq!(reap_age(Some(Duration::minutes(5))), Duration::minutes(5));
    }

    #[test]
    fn timelimit_rejects_garbage() {
        assert!(parse_timelimit("").is_err());
        assert!(parse_timelimit("h").is_err());
        assert!(parse_timelimit("3w").is_err());
        assert!(parse_timelimit("-1h").is_err());
        assert!(parse_timelimit("abc").is_err());
    }

    #[test]
    fn timelimit_out_of_range_is_an_error() {
        let err = parse_timelimit("9999999999999999d").unwrap_err();
        assert!(err.contains("too large"));
        assert!(parse_timelimit("9223372036854775807s").is_err());
        assert!(parse_timelimit("99999999999999999999h").is_err());
    }

    #[test]
    fn cli_parses() {
        use clap::CommandFactory;
        Args::command().debug_assert();

        let args = Args::try_parse_from(["cdp", "--env", "qa", "user", "create", "alice", "-P", "arn:x"])
            .unwrap();
        assert_eq!(args.env.as_deref(), Some("qa"));
        assert!(matches!(
            args.command,
            Command::User(UserCommand::Add { ref name, ref policy, .. })
                if name == "alice" && policy.as_deref() == Some("arn:x")
        ));

        let args = Args::try_parse_from(["cdp", "instance", "reap", "-t", "2d"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Instance(InstanceCommand::Reap { timelimit, yes: false, .. })
                if timelimit == Some(Duration::days(2))
        ));

        let args = Args::try_parse_from(["cdp", "instance", "reap"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Instance(InstanceCommand::Reap { timelimit: None, .. })
        ));
        assert!(Args::try_parse_from(["cdp", "instance", "reap", "-t", "9999999999999999d"]).is_err());
    }

    #[test]
    fn output_format_is_validated() {
        let args = Args::try_parse_from(["cdp", "instance", "list", "--format", "json"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Instance(InstanceCommand::List { format: OutputFormat::Json, .. })
        ));
        assert!(Args::try_parse_from(["cdp", "instance", "list", "--format", "jsno"]).is_err());
    }

    #[test]
    fn keys_list_name_is_optional() {
        let args = Args::try_parse_from(["cdp", "user", "keys", "list", "-p", "/dev/", "-q"]).unwrap();
        assert!(matches!(
            args.command,
            Command::User(UserCommand::Keys(KeysCommand::List { name: None, ref path, quiet: true }))
                if path.as_deref() == Some("/dev/")
        ));
    }
}
