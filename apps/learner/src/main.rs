mod commands;
mod config;
mod session_file;
mod shell;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{
    HttpRemoteService, ServiceConfig, SessionStore, TrackDirectory, WorkspaceConfig,
    WorkspaceController,
};
use shared::domain::TrackId;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "learner", about = "Peer-review learning platform client")]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    session_file: Option<PathBuf>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Create an account.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and remember the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// List tracks with their enrollment state.
    Tracks,
    Join {
        track_id: TrackId,
    },
    Leave {
        track_id: TrackId,
    },
    /// Open the interactive workspace for a track.
    Workspace {
        track_id: TrackId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(session_file) = args.session_file {
        settings.session_file = session_file;
    }

    let session = SessionStore::new();
    if let Some(stored) = session_file::load(&settings.session_file)? {
        session.install(stored);
    }
    let remote = Arc::new(HttpRemoteService::new(
        ServiceConfig {
            base_url: settings.server_url.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        },
        session.clone(),
    )?);

    let result = run(args.command, &settings, remote).await;
    if !session.is_authenticated() && session_file::remove(&settings.session_file)? {
        info!("session: removed stored credential");
    }
    result
}

async fn run(command: CliCommand, settings: &Settings, remote: Arc<HttpRemoteService>) -> Result<()> {
    match command {
        CliCommand::Register { email, password } => {
            let profile = remote.register(&email, &password).await?;
            println!("registered user {} ({})", profile.id, profile.email);
        }
        CliCommand::Login { email, password } => {
            let session = remote.login(&email, &password).await?;
            session_file::save(&settings.session_file, &session)?;
            println!("logged in as {email}");
        }
        CliCommand::Logout => {
            remote.logout();
            println!("logged out");
        }
        CliCommand::Tracks => {
            let mut directory = TrackDirectory::new(remote);
            for track in directory.refresh().await? {
                let state = if track.is_locked() {
                    "started"
                } else if track.has_open_seats() {
                    "open"
                } else {
                    "full"
                };
                println!(
                    "{}  {}  {}/{}  {state}",
                    track.id, track.title, track.participant_count, track.quota
                );
            }
        }
        CliCommand::Join { track_id } => {
            let mut directory = TrackDirectory::new(remote);
            directory.refresh().await?;
            directory.join(track_id).await?;
            println!("joined track {track_id}");
        }
        CliCommand::Leave { track_id } => {
            let mut directory = TrackDirectory::new(remote);
            directory.refresh().await?;
            directory.leave(track_id).await?;
            println!("left track {track_id}");
        }
        CliCommand::Workspace { track_id } => {
            let controller = WorkspaceController::new(
                remote,
                WorkspaceConfig {
                    poll_interval: Duration::from_secs(settings.poll_interval_secs),
                },
            );
            shell::run_workspace(controller, track_id).await?;
        }
    }
    Ok(())
}
