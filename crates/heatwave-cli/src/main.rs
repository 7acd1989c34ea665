mod commands;
mod graph;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use heatwave_core::config::CONFIG_ENV;
use heatwave_core::{Config, SqliteTokenStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "heatwave")]
#[command(author, version, about = "Combined GitHub + GitLab contribution calendars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Path to config.toml")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch and merge contributions for a profile")]
    Contributions {
        #[arg(help = "Profile id")]
        profile: String,
        #[arg(long, help = "Output the response body as JSON")]
        json: bool,
        #[arg(long, help = "Write JSON to file instead of stdout")]
        output: Option<PathBuf>,
        #[arg(long, help = "Render a contribution heatmap")]
        graph: bool,
        #[arg(long, help = "Disable loading spinner (for scripting)")]
        no_spinner: bool,
    },
    #[command(about = "Store or update a provider connection")]
    Connect {
        #[arg(help = "Provider (github or gitlab)")]
        provider: String,
        #[arg(long, help = "Profile id")]
        profile: String,
        #[arg(long, help = "Provider-side user id")]
        user_id: String,
        #[arg(long, help = "Provider-side username")]
        username: String,
        #[arg(long, help = "OAuth access token")]
        token: String,
        #[arg(long, help = "OAuth refresh token")]
        refresh_token: Option<String>,
        #[arg(long, help = "Seconds until the access token expires")]
        expires_in: Option<i64>,
    },
    #[command(about = "Remove a provider connection")]
    Disconnect {
        #[arg(help = "Provider (github or gitlab)")]
        provider: String,
        #[arg(long, help = "Profile id")]
        profile: String,
    },
    #[command(about = "List stored connections for a profile")]
    Connections {
        #[arg(help = "Profile id")]
        profile: String,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Contributions {
            profile,
            json,
            output,
            graph,
            no_spinner,
        } => {
            let store = open_store(&config)?;
            commands::contributions::run(
                &config,
                store,
                &profile,
                commands::contributions::Options {
                    json,
                    output,
                    graph,
                    no_spinner,
                },
            )
        }
        Commands::Connect {
            provider,
            profile,
            user_id,
            username,
            token,
            refresh_token,
            expires_in,
        } => {
            let store = open_store(&config)?;
            commands::connections::connect(
                &store,
                commands::connections::ConnectArgs {
                    provider,
                    profile,
                    user_id,
                    username,
                    token,
                    refresh_token,
                    expires_in,
                },
            )
        }
        Commands::Disconnect { provider, profile } => {
            let store = open_store(&config)?;
            commands::connections::disconnect(&store, &provider, &profile)
        }
        Commands::Connections { profile, json } => {
            let store = open_store(&config)?;
            commands::connections::list(&store, &profile, json)
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("HEATWAVE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let path = explicit
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .or_else(Config::default_path);

    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            Ok(Config::load(&path)?)
        }
        None => Ok(Config::default().with_env(|key| std::env::var(key).ok())),
    }
}

fn open_store(config: &Config) -> Result<SqliteTokenStore> {
    let path = config
        .database_path()
        .context("Could not determine home directory for the connection database")?;
    SqliteTokenStore::open(&path)
        .with_context(|| format!("Failed to open connection database at {}", path.display()))
}
