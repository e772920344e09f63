use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cosmotab::app::App;
use cosmotab::azure::auth::AzureCredentials;
use cosmotab::azure::client::AzureClient;
use cosmotab::azure::http::AzureHttpClient;
use cosmotab::config::{Config, TablesFile};
use cosmotab::resource::{schema, ArmTableApi};
use cosmotab::state::StateFile;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Declarative management of Azure Cosmos DB tables
#[derive(Parser, Debug)]
#[command(name = "cosmotab", version = cosmotab::VERSION, about, long_about = None)]
struct Args {
    /// Azure subscription to use
    #[arg(short, long, global = true)]
    subscription: Option<String>,

    /// State file to read and write
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create, update or replace tables to match a YAML file
    Apply {
        /// Tables file
        #[arg(short, long)]
        file: PathBuf,

        /// Delete managed tables that are no longer in the file
        #[arg(long)]
        prune: bool,
    },
    /// Re-read every managed table
    Refresh,
    /// Adopt an existing table
    Import {
        /// Address to manage the table under
        address: String,
        /// Full Resource Manager id of the table
        id: String,
    },
    /// Delete a managed table
    Destroy { address: String },
    /// Print the state as YAML
    Show,
    /// Print the table schema
    Schema,
    /// Remember a default subscription in the config file
    UseSubscription { subscription_id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return None;
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Warning: cannot open log file {:?}: {}", log_path, err);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_env("COSMOTAB_LOG")
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(Level::TRACE))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cosmotab {} started with log level: {:?}", cosmotab::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("cosmotab").join("cosmotab.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cosmotab").join("cosmotab.log");
    }
    PathBuf::from("cosmotab.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let state_path = config.effective_state_path(args.state.as_deref());

    match &args.command {
        Command::Schema => {
            print_schema();
            return Ok(());
        },
        Command::Show => {
            let state = StateFile::load(&state_path)?;
            show(&state)?;
            return Ok(());
        },
        Command::UseSubscription { subscription_id } => {
            let subscription = config.effective_subscription(Some(subscription_id.as_str()))?;
            config.set_subscription(&subscription)?;
            println!("Default subscription set to {}", subscription);
            return Ok(());
        },
        _ => {},
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight operations");
            eprintln!("Interrupted, cancelling...");
            ctrl_c.cancel();
        }
    });

    let api = build_api(&config, args.subscription.as_deref())?;
    let state = StateFile::load(&state_path)?;
    let mut app = App::new(api, state, config.timeouts, cancel);

    match args.command {
        Command::Apply { file, prune } => {
            let tables = TablesFile::load(&file)?;
            for (address, action) in app.apply(&tables, prune).await? {
                println!("{}: {}", address, action);
            }
        },
        Command::Refresh => {
            let summary = app.refresh().await?;
            for address in &summary.refreshed {
                println!("{}: refreshed", address);
            }
            for address in &summary.removed {
                println!("{}: gone, removed from state", address);
            }
        },
        Command::Import { address, id } => {
            let observed = app.import(&address, &id).await?;
            println!("Imported {} as {}. Add this to your tables file:\n", observed.id, address);
            let snippet = serde_yaml::to_string(&observed.to_desired())?;
            println!("{}:", address);
            for line in snippet.lines() {
                println!("  {}", line);
            }
        },
        Command::Destroy { address } => {
            app.destroy(&address).await?;
            println!("{}: deleted", address);
        },
        Command::Show | Command::Schema | Command::UseSubscription { .. } => {},
    }

    Ok(())
}

fn build_api(config: &Config, cli_subscription: Option<&str>) -> Result<ArmTableApi> {
    let subscription = config.effective_subscription(cli_subscription)?;
    let endpoint = config.effective_endpoint()?;

    let http = AzureHttpClient::with_timeout(config.request_timeout())
        .context("Failed to build HTTP client")?;

    let tenant_id = config
        .tenant_id
        .clone()
        .or_else(|| std::env::var("ARM_TENANT_ID").ok());
    let client_id = config
        .client_id
        .clone()
        .or_else(|| std::env::var("ARM_CLIENT_ID").ok());
    let credentials = AzureCredentials::from_environment(
        tenant_id.as_deref(),
        client_id.as_deref(),
        endpoint.as_str(),
    )
    .context("Failed to load Azure credentials")?;

    tracing::info!("Using subscription {} at {}", subscription, endpoint);

    let client = AzureClient::new(credentials, http, &subscription, endpoint)
        .with_poll_interval(config.poll_interval());
    Ok(ArmTableApi::new(client))
}

fn show(state: &StateFile) -> Result<()> {
    if state.is_empty() {
        println!("No tables in {:?}", state.path());
        return Ok(());
    }

    let records: std::collections::BTreeMap<&str, _> = state.records().collect();
    print!("{}", serde_yaml::to_string(&records)?);
    Ok(())
}

fn print_schema() {
    println!("cosmos_db_table (schema version {})", schema::SCHEMA_VERSION);
    for attribute in schema::TABLE_SCHEMA {
        let mut flags = vec![format!("{:?}", attribute.presence).to_lowercase()];
        if attribute.force_new {
            flags.push("forces replacement".to_string());
        }
        if !attribute.conflicts_with.is_empty() {
            flags.push(format!("conflicts with {}", attribute.conflicts_with.join(", ")));
        }
        println!(
            "  {:<22} {:<8} {}  {}",
            attribute.name,
            format!("{:?}", attribute.kind).to_lowercase(),
            flags.join(", "),
            attribute.description
        );
    }
}
