use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use drive_script_sync::{
    auth::TokenCredentials,
    commands,
    config::SyncConfig,
    drive::DriveQuery,
    session::{DriveConnector, SyncSession},
    workspace::LocalWorkspace,
};

/// Environment variable selecting the log filter
const LOG_ENV: &str = "SCRIPT_SYNC_LOG";

/// Sync Apps Script projects stored in Google Drive
#[derive(Parser)]
#[command(name = "drive-script-sync", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Download a project into a local directory
    Pull {
        /// Drive id of the script project
        file_id: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Upload local changes to the project the directory was pulled from
    Push {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Show local changes since the last pull or push
    Status {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Print the folder tree holding script projects
    Folders {
        /// Drive query selecting the leaf files
        #[arg(long)]
        query: Option<String>,
    },
    /// Forget the stored access token
    Logout,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = SyncConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::debug!("using api base {}", config.api_base_url);

    let session = SyncSession::new(
        Box::new(TokenCredentials::new(&config.token_file)),
        Box::new(DriveConnector::new(config.endpoints())),
        config.project_mime_type.clone(),
    )
    .with_folder_mime_type(config.folder_mime_type.clone());

    let stdout = io::stdout();
    let mut output = stdout.lock();

    match cli.command {
        Command::Pull { file_id, dir } => {
            commands::pull::handle(&session, &LocalWorkspace::new(dir), &file_id, &mut output)
        }
        Command::Push { dir } => {
            commands::push::handle(&session, &LocalWorkspace::new(dir), &mut output)
        }
        Command::Status { dir } => commands::status::handle(&LocalWorkspace::new(dir), &mut output),
        Command::Folders { query } => {
            let query = query.unwrap_or_else(|| {
                DriveQuery::mime_type(&config.script_mime_type)
                    .not_trashed()
                    .to_string()
            });
            commands::folders::handle(&session, &query, &mut output)
        }
        Command::Logout => commands::logout::handle(&session, &mut output),
    }
}
