//! Ministry Media portal - session bootstrap driver for the command line.

mod app;
mod settings;
mod surfaces;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use portal_config_and_utils::{init_logging, Config, Paths};

/// Ministry Media portal command-line interface.
#[derive(Parser)]
#[command(name = "ministry-portal")]
#[command(about = "Sign in to the Ministry Media portal and supervise the session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.ministry-media
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password and print the settled session
    SignIn {
        #[arg(long)]
        email: String,

        #[arg(long, env = "MINISTRY_MEDIA_PASSWORD", hide_env_values = true)]
        password: String,

        /// Keep the session running; stdin lines count as user activity
        #[arg(short, long)]
        watch: bool,
    },
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(config.log_level.as_str());
    init_logging(level, Some(paths.log_file()));

    match cli.command {
        Commands::SignIn {
            email,
            password,
            watch,
        } => {
            app::sign_in(&config, &email, &password, watch).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
