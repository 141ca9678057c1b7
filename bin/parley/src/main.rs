//! # parley
//!
//! The entry point that assembles the comment server from the configured
//! plugins, plus the admin commands.

mod admin;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pl_api::AppState;
use pl_auth_simple::OriginAuthProvider;
use pl_config::{LogSettings, Settings};
use pl_core::CommentService;
use pl_db_sqlite::SqliteStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "mail-maildir")]
use pl_mail_maildir::MaildirSender;

#[derive(Parser, Debug)]
#[command(version, about = "Embeddable comment server", long_about = None)]
struct Cli {
    /// TOML settings file
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve,
    #[command(subcommand)]
    Client(admin::ClientCmd),
    #[command(subcommand)]
    Domain(admin::DomainCmd),
    #[command(subcommand)]
    Comment(admin::CommentCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    init_tracing(&settings.log);

    let store = Arc::new(
        SqliteStore::connect(&settings.database.url, settings.database.max_connections)
            .await
            .context("failed to open database")?,
    );
    store.init_schema().await.context("failed to create schema")?;

    match cli.command {
        Command::Serve => serve(settings, store).await,
        Command::Client(cmd) => admin::client(cmd, store.as_ref(), &mut io::stdout()).await,
        Command::Domain(cmd) => admin::domain(cmd, store.as_ref(), &mut io::stdout()).await,
        Command::Comment(cmd) => admin::comment(cmd, store, &mut io::stdout()).await,
    }
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(feature = "mail-maildir")]
fn with_mail(state: AppState, settings: &Settings) -> AppState {
    match &settings.mail.maildir_path {
        Some(path) => {
            info!(path = %path.display(), "mail notifications enabled");
            state.with_mailer(
                Arc::new(MaildirSender::new(path.clone())),
                settings.mail.from_address.clone(),
                settings.mail.notify_address.clone(),
            )
        }
        None => state,
    }
}

#[cfg(not(feature = "mail-maildir"))]
fn with_mail(state: AppState, settings: &Settings) -> AppState {
    if settings.mail.maildir_path.is_some() {
        tracing::warn!("mail.maildir_path is set but this build has no maildir support");
    }
    state
}

async fn serve(settings: Settings, store: Arc<SqliteStore>) -> Result<()> {
    let gate = OriginAuthProvider::new(store.clone(), store.clone())
        .require_api_key(settings.auth.require_api_key);
    let state = AppState::new(Arc::new(gate), CommentService::new(store));
    let state = with_mail(state, &settings);

    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, require_api_key = settings.auth.require_api_key, "parley listening");

    axum::serve(listener, pl_api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("parley stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
