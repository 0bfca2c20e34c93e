//! Command line surface
//!
//! Owner-scoped commands authenticate with `--username` and `--password`
//! (or `AUCTION_WATCH_PASSWORD`) on every invocation.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use crate::application::AppContext;
use crate::domain::{FilterSettings, OwnerId};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::init_logging_with_config;

#[derive(Parser, Debug)]
#[command(
    name = "auction-watch",
    version,
    about = "Watches auction search results and mails new listings and price drops"
)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "AUCTION_WATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override, e.g. "debug"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct Credentials {
    #[arg(short, long)]
    username: String,

    #[arg(short, long, env = "AUCTION_WATCH_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Signup {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "AUCTION_WATCH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Delete the account, its saved filters and its monitor
    DeleteAccount(Credentials),
    /// Replace the account password
    ChangePassword {
        #[command(flatten)]
        auth: Credentials,
        #[arg(long, env = "AUCTION_WATCH_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
    /// Stop notification mail for the account owning the token
    Unsubscribe {
        token: String,
    },
    /// Manage saved filters
    Filters {
        #[command(flatten)]
        auth: Credentials,
        #[command(subcommand)]
        action: FilterAction,
    },
    /// Make a saved filter, or the given options, the active filter
    Apply {
        #[command(flatten)]
        auth: Credentials,
        /// Saved filter id
        filter_id: Option<i64>,
        #[command(flatten)]
        settings: FilterArgs,
    },
    /// Run one monitoring cycle now
    RunOnce(Credentials),
    /// Monitor continuously until Ctrl-C
    Watch(Credentials),
    /// Show the monitor status
    Status(Credentials),
    /// Resume every owner that left continuous mode on and wait for Ctrl-C
    Serve,
}

#[derive(Subcommand, Debug)]
enum FilterAction {
    Save {
        name: String,
        #[command(flatten)]
        settings: FilterArgs,
    },
    List,
    Update {
        id: i64,
        name: String,
        #[command(flatten)]
        settings: FilterArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    #[arg(long)]
    year_from: Option<i64>,
    #[arg(long)]
    year_to: Option<i64>,
    #[arg(long)]
    min_bid: Option<i64>,
    #[arg(long)]
    max_bid: Option<i64>,
    #[arg(long)]
    odo_from: Option<i64>,
    #[arg(long)]
    odo_to: Option<i64>,
    /// Comma separated, e.g. "Automobiles,Motorcycles"
    #[arg(long = "inventory", value_delimiter = ',')]
    inventory_types: Vec<String>,
    /// Comma separated, e.g. "Electric,Other"
    #[arg(long = "fuel", value_delimiter = ',')]
    fuel_types: Vec<String>,
}

impl From<FilterArgs> for FilterSettings {
    fn from(args: FilterArgs) -> Self {
        Self {
            year_from: args.year_from,
            year_to: args.year_to,
            min_bid: args.min_bid,
            max_bid: args.max_bid,
            odo_from: args.odo_from,
            odo_to: args.odo_to,
            inventory_types: args.inventory_types,
            fuel_types: args.fuel_types,
        }
    }
}

/// Parse arguments, load configuration, set up logging and run the command
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config().await?;
    config.apply_env_overrides();
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    let log_dir = if config.logging.file_output {
        Some(config.log_directory()?)
    } else {
        None
    };
    init_logging_with_config(&config.logging, log_dir.as_deref())?;

    let context = AppContext::initialize(config).await?;
    execute(cli.command, &context).await
}

async fn execute(command: Command, ctx: &AppContext) -> Result<()> {
    match command {
        Command::Signup {
            username,
            email,
            password,
        } => {
            let signed_in = ctx.accounts.sign_up(&username, &email, &password).await?;
            println!("Account created (id {})", signed_in.owner);
            if let Some(token) = ctx.accounts.unsubscribe_token(signed_in.owner).await? {
                println!("Unsubscribe token: {token}");
            }
        }
        Command::DeleteAccount(auth) => {
            let owner = sign_in(ctx, &auth).await?;
            ctx.accounts.delete_account(owner).await?;
            println!("Account deleted");
        }
        Command::ChangePassword { auth, new_password } => {
            let owner = sign_in(ctx, &auth).await?;
            ctx.accounts
                .change_password(owner, &auth.password, &new_password)
                .await?;
            println!("Password changed");
        }
        Command::Unsubscribe { token } => {
            ctx.accounts.unsubscribe(&token).await?;
            println!("You are unsubscribed");
        }
        Command::Filters { auth, action } => {
            let owner = sign_in(ctx, &auth).await?;
            run_filter_action(ctx, owner, action).await?;
        }
        Command::Apply {
            auth,
            filter_id,
            settings,
        } => {
            let owner = sign_in(ctx, &auth).await?;
            match filter_id {
                Some(id) => {
                    let saved = ctx.watch.apply_saved_filter(owner, id).await?;
                    println!("Applied saved filter '{}'", saved.name);
                }
                None => {
                    let settings = FilterSettings::from(settings);
                    if !settings.has_any() {
                        bail!("Give a saved filter id or at least one filter option");
                    }
                    ctx.watch.apply_filter(owner, settings.to_payload()).await?;
                    println!("Filter applied");
                }
            }
        }
        Command::RunOnce(auth) => {
            let owner = sign_in(ctx, &auth).await?;
            let report = ctx.watch.run_once(owner).await?;
            println!("{report}");
        }
        Command::Watch(auth) => {
            let owner = sign_in(ctx, &auth).await?;
            let status = ctx.watch.start(owner).await?;
            println!("{status}. Press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;
            println!("{}", ctx.watch.stop(owner).await?);
            ctx.watch.shutdown().await;
        }
        Command::Status(auth) => {
            let owner = sign_in(ctx, &auth).await?;
            if let Some(account) = ctx.accounts.account(owner).await? {
                println!(
                    "{} <{}>{}",
                    account.username,
                    account.email,
                    if account.email_unsubscribed { " (unsubscribed)" } else { "" }
                );
            }
            let status = ctx.watch.status(owner).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Serve => {
            let resumed = if ctx.config.monitor.resume_on_start {
                ctx.watch.resume_all().await?
            } else {
                0
            };
            println!("Monitoring {resumed} owner(s). Press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;
            ctx.watch.shutdown().await;
        }
    }
    Ok(())
}

async fn run_filter_action(ctx: &AppContext, owner: OwnerId, action: FilterAction) -> Result<()> {
    match action {
        FilterAction::Save { name, settings } => {
            let payload = FilterSettings::from(settings).to_payload();
            let saved = ctx.watch.save_filter(owner, &name, &payload).await?;
            println!("Saved filter '{}' (id {})", saved.name, saved.id);
        }
        FilterAction::List => {
            let filters = ctx.watch.list_filters(owner).await?;
            if filters.is_empty() {
                println!("No saved filters");
            }
            for filter in filters {
                println!(
                    "{:>5}  {:<30}  {}",
                    filter.id,
                    filter.name,
                    filter.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        FilterAction::Update { id, name, settings } => {
            let payload = FilterSettings::from(settings).to_payload();
            if !ctx.watch.update_filter(owner, id, &name, &payload).await? {
                bail!("Saved filter {id} not found");
            }
            println!("Updated filter {id}");
        }
        FilterAction::Delete { id } => {
            if !ctx.watch.delete_filter(owner, id).await? {
                bail!("Saved filter {id} not found");
            }
            println!("Deleted filter {id}");
        }
    }
    Ok(())
}

async fn sign_in(ctx: &AppContext, auth: &Credentials) -> Result<OwnerId> {
    Ok(ctx.accounts.sign_in(&auth.username, &auth.password).await?.owner)
}
