use anyhow::{anyhow, bail, Context, Result};
use azrm::arm::auth::ArmCredentials;
use azrm::arm::client::{format_arm_error, ArmClient};
use azrm::config::Config;
use azrm::manifest::Manifest;
use azrm::resource::{Provider, Registry};
use azrm::resourceid::ResourceIdentifier;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage Azure resources from declarative manifests
#[derive(Parser, Debug)]
#[command(name = "azrm", version = azrm::VERSION, about, long_about = None)]
struct Args {
    /// Azure subscription to use
    #[arg(short, long, global = true)]
    subscription: Option<String>,

    /// ARM endpoint
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Run in read-only mode (block all write operations)
    #[arg(long, global = true)]
    readonly: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered resource types and their id templates
    Types,
    /// Decode or encode resource ids
    Id {
        #[command(subcommand)]
        command: IdCommand,
    },
    /// Validate every manifest entry
    Validate { manifest: PathBuf },
    /// Create or update every manifest entry
    Apply { manifest: PathBuf },
    /// Read a resource
    Get {
        #[arg(value_name = "TYPE")]
        resource_type: String,
        id: String,
    },
    /// Delete a resource
    Delete {
        #[arg(value_name = "TYPE")]
        resource_type: String,
        id: String,
    },
    /// Read a resource of any registered type
    Import { id: String },
    /// Read several resources concurrently
    Refresh {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show or change the saved configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the configuration file and effective settings
    Show,
    /// Save the default subscription
    SetSubscription { subscription: String },
}

#[derive(Subcommand, Debug)]
enum IdCommand {
    /// Decode an id and print its fields
    Parse {
        id: String,
        /// Decode strictly as this resource type
        #[arg(short = 't', long = "type")]
        resource_type: Option<String>,
    },
    /// Encode an id from values in template order
    Format {
        #[arg(value_name = "TYPE")]
        resource_type: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
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
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory {}: {}", parent.display(), e);
        }
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("azrm started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("azrm").join("azrm.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".azrm").join("azrm.log");
    }
    PathBuf::from("azrm.log")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:?}", err);
            eprintln!("Error: {}", format_arm_error(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = Config::load();
    let registry = Registry::builtin()?;
    let subscription = config.effective_subscription(args.subscription.as_deref());

    match &args.command {
        Command::Types => {
            for handler in registry.handlers() {
                println!(
                    "{:<26} {:<40} {}",
                    handler.type_name(),
                    handler.arm_type(),
                    handler.id_format().template()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Id { command } => run_id(&registry, command),
        Command::Config { command } => run_config(&args, config, command),
        Command::Validate { manifest } => {
            let manifest = Manifest::load(manifest)?;
            let problems = manifest.validate(&registry, &subscription);
            if problems.is_empty() {
                println!("{} resources valid", manifest.len());
                return Ok(ExitCode::SUCCESS);
            }
            for problem in &problems {
                println!("{}", problem);
            }
            Ok(ExitCode::FAILURE)
        }
        command => {
            let provider = connect(&args, &config, &registry, &subscription)?;
            run_remote(&provider, command).await
        }
    }
}

fn run_id(registry: &Registry, command: &IdCommand) -> Result<ExitCode> {
    match command {
        IdCommand::Parse { id, resource_type } => {
            let decoded = match resource_type {
                Some(resource_type) => registry.require(resource_type)?.decode_id(id)?,
                None => serde_json::to_value(ResourceIdentifier::parse(id)?)?,
            };
            print_json(&decoded)?;
        }
        IdCommand::Format {
            resource_type,
            values,
        } => {
            let handler = registry.require(resource_type)?;
            let values: Vec<&str> = values.iter().map(|v| v.as_str()).collect();
            println!("{}", handler.id_format().format(&values)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_config(args: &Args, mut config: Config, command: &ConfigCommand) -> Result<ExitCode> {
    match command {
        ConfigCommand::Show => {
            if let Some(path) = Config::config_path() {
                println!("config file: {}", path.display());
            }
            print_json(&config)?;
            println!(
                "effective subscription: {}",
                config.effective_subscription(args.subscription.as_deref())
            );
            println!(
                "effective endpoint: {}",
                config.effective_endpoint(args.endpoint.as_deref())
            );
        }
        ConfigCommand::SetSubscription { subscription } => {
            config.set_subscription(subscription)?;
            config.save()?;
            println!("default subscription set to {}", subscription);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn connect<'r>(
    args: &Args,
    config: &Config,
    registry: &'r Registry,
    subscription: &str,
) -> Result<Provider<'r>> {
    let endpoint = config.effective_endpoint(args.endpoint.as_deref());
    tracing::info!("Using subscription: {}, endpoint: {}", subscription, endpoint);

    let client = ArmClient::new(&endpoint, ArmCredentials::from_env())?;
    Ok(Provider::new(registry, client, subscription)
        .with_readonly(args.readonly)
        .with_poll_options(config.poll_options())
        .with_concurrency(config.effective_concurrency()))
}

async fn run_remote(provider: &Provider<'_>, command: &Command) -> Result<ExitCode> {
    match command {
        Command::Apply { manifest } => {
            if provider.subscription_id().is_empty() {
                bail!("No Azure subscription configured. Set AZURE_SUBSCRIPTION_ID or use --subscription");
            }
            let manifest = Manifest::load(manifest)?;
            let applied = provider.apply(&manifest).await?;
            print_json(&applied)?;
        }
        Command::Get { resource_type, id } => {
            let state = provider
                .read(resource_type, id)
                .await?
                .ok_or_else(|| anyhow!("{} not found", id))?;
            print_json(&state)?;
        }
        Command::Delete { resource_type, id } => {
            provider.delete(resource_type, id).await?;
            println!("deleted {}", id);
        }
        Command::Import { id } => {
            let state = provider.import(id).await?;
            print_json(&state)?;
        }
        Command::Refresh { ids } => {
            let mut failed = false;
            for refreshed in provider.refresh(ids).await {
                match refreshed.result {
                    Ok(Some(state)) => print_json(&state)?,
                    Ok(None) => println!("{}: gone", refreshed.id),
                    Err(e) => {
                        failed = true;
                        eprintln!("{}: {}", refreshed.id, format_arm_error(&e));
                    }
                }
            }
            if failed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Types | Command::Id { .. } | Command::Validate { .. } | Command::Config { .. } => {
            bail!("{:?} does not use the ARM API", command)
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}
