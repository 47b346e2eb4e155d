use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use solo::config::{CONFIG_FILE, SoloToml};

mod cmd;

#[derive(Parser)]
#[command(name = "solo")]
#[command(version, about = "Solo blog console: pages, articles and comments")]
pub struct Cli {
    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to solo.toml
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the console API server
    Serve {
        /// Port to serve on (overrides solo.toml and SOLO_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path (overrides solo.toml and SOLO_DB_PATH)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and a default solo.toml
    Init,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Rebuild comment counts and blog statistics from the stored rows
    Repair,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default solo.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut toml = SoloToml::load_or_default(&cli.config)?;
    toml.apply_env()?;

    let level = if cli.verbose {
        "debug"
    } else {
        toml.log.level.as_str()
    };
    // A bad [log] section must not block `config validate` from reporting it.
    let _log_guard = match solo::logging::init(level, toml.log.format, toml.log.dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };

    match &cli.command {
        Commands::Serve { port, db_path, dev } => {
            cmd::cmd_serve(toml, *port, db_path.clone(), *dev).await?;
        }
        Commands::Init => cmd::cmd_init(&cli.config, &toml)?,
        Commands::Config { command } => cmd::cmd_config(&cli.config, &toml, command.clone())?,
        Commands::Repair => cmd::cmd_repair(&toml)?,
    }

    Ok(())
}
