//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use crate::ServerConfig;
use crate::db::Database;
use crate::token::{DEFAULT_ISSUER, MIN_SECRET_LEN};
use clap::Parser;
use tracing::{error, info};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "custgate",
    about = "Customer records API behind stateless bearer-token authentication"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "CUSTGATE_PORT", default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "CUSTGATE_DATABASE", default_value = "custgate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Issuer written into every token
    #[arg(long, env = "CUSTGATE_ISSUER", default_value = DEFAULT_ISSUER)]
    pub issuer: String,

    /// Lifetime of issued tokens in days
    #[arg(long, env = "CUSTGATE_TOKEN_TTL_DAYS", default_value = "15",
        value_parser = clap::value_parser!(u64).range(1..=365))]
    pub token_ttl_days: u64,

    /// Upper bound on the per-request account lookup, in milliseconds
    #[arg(long, env = "CUSTGATE_LOOKUP_TIMEOUT_MS", default_value = "5000",
        value_parser = clap::value_parser!(u64).range(1..))]
    pub lookup_timeout_ms: u64,

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

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LEN {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_SECRET_LEN
        );
        return None;
    }

    Some(secret)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        issuer: args.issuer.clone(),
        token_ttl_secs: args.token_ttl_days * SECS_PER_DAY,
        lookup_timeout: Duration::from_millis(args.lookup_timeout_ms),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
