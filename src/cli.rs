//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use crate::ServerConfig;
use crate::auth::{RandomTokenSource, TokenGenerator};
use crate::store::{MemoryStore, SqliteStore, Store};

const MIN_GRANT_SECRET_LENGTH: usize = 32;
const GENERATED_SECRET_LENGTH: usize = 64;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bosun",
    about = "Deploy announcements and deploy history for chat channels"
)]
pub struct Args {
    /// Host or address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8081")]
    pub port: u16,

    /// Path to the SQLite deploy history database.
    /// When omitted, history is kept in memory and lost on restart
    #[arg(short, long)]
    pub database: Option<String>,

    /// Webhook verification token the chat platform sends with every
    /// slash-command call
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub verification_token: String,

    /// Secret for signing dashboard access grants.
    /// When omitted, a random secret is generated at startup and existing
    /// grants stop verifying after a restart
    #[arg(long, env = "GRANT_SECRET", hide_env_values = true)]
    pub grant_secret: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Validate the configured grant secret, or generate one when absent.
/// Returns None and logs an error if the configured secret is unusable.
pub fn load_grant_secret(secret: Option<String>) -> Option<String> {
    match secret {
        Some(secret) if secret.len() < MIN_GRANT_SECRET_LENGTH => {
            error!(
                "Grant secret is shorter than {} characters. Use a longer secret",
                MIN_GRANT_SECRET_LENGTH
            );
            None
        }
        Some(secret) => Some(secret),
        None => {
            warn!(
                "GRANT_SECRET is not set, signing dashboard grants with a randomly \
                 generated secret that will not survive a restart"
            );
            Some(RandomTokenSource::new().generate(GENERATED_SECRET_LENGTH))
        }
    }
}

/// Open the deploy store, logging errors if it fails.
pub async fn open_store(database: Option<&str>) -> Option<Arc<dyn Store>> {
    match database {
        Some(path) => match SqliteStore::open(path).await {
            Ok(store) => {
                info!(path = %path, "Writing deploy history into SQLite database");
                Some(Arc::new(store))
            }
            Err(e) => {
                error!(path = %path, error = %e, "Failed to open deploy history database");
                None
            }
        },
        None => {
            info!("No database path set, keeping deploy history in memory");
            Some(Arc::new(MemoryStore::new()))
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    store: Arc<dyn Store>,
    verification_token: String,
    grant_secret: String,
) -> ServerConfig {
    ServerConfig {
        store,
        verification_token,
        grant_secret: grant_secret.into_bytes(),
    }
}
