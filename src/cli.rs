//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, NewUser};
use crate::jwt::{TokenAuthority, TokenSettings};
use crate::password::{DEFAULT_COST, hash_password};
use crate::permissions::Permission;
use crate::rate_limit::DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE;
use clap::Parser;
use jsonwebtoken::Algorithm;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const MIN_SECRET_KEY_LENGTH: usize = 32;

/// Upper bound for token lifetimes: ten years, in minutes.
const MAX_TOKEN_LIFETIME_MINUTES: u64 = 10 * 366 * 24 * 60;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "storefront",
    about = "Product catalogue API with JWT authentication and per-user permissions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE", default_value = "storefront.db")]
    pub database: String,

    /// JWT signing algorithm (HS256, HS384 or HS512)
    #[arg(long, env = "ALGORITHM", default_value = "HS256", value_parser = parse_algorithm)]
    pub algorithm: Algorithm,

    /// Access token lifetime in minutes
    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value = "15",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_LIFETIME_MINUTES))]
    pub access_token_expire_minutes: u64,

    /// Refresh token lifetime in minutes
    #[arg(long, env = "REFRESH_TOKEN_EXPIRE_MINUTES", default_value = "10080",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_LIFETIME_MINUTES))]
    pub refresh_token_expire_minutes: u64,

    /// Path to file containing the signing secret. Prefer using SECRET_KEY env var instead
    #[arg(long)]
    pub secret_key_file: Option<String>,

    /// Login attempts allowed per client IP per minute
    #[arg(long, default_value_t = DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE)]
    pub login_attempts_per_minute: NonZeroU32,

    /// Rate limit by the first X-Forwarded-For address (only behind a trusted proxy)
    #[arg(long)]
    pub trust_forwarded_for: bool,

    /// bcrypt cost for password hashes
    #[arg(long, default_value_t = DEFAULT_COST,
        value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// Create an admin from ADMIN_USERNAME, ADMIN_EMAIL and ADMIN_PASSWORD on startup
    #[arg(long)]
    pub create_admin: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Only HMAC algorithms can sign with a shared secret.
fn parse_algorithm(s: &str) -> Result<Algorithm, String> {
    let algorithm: Algorithm = s
        .parse()
        .map_err(|_| format!("Unknown JWT algorithm: {}", s))?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        _ => Err(format!(
            "{} needs a key pair; use HS256, HS384 or HS512",
            s
        )),
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the signing secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret_key(secret_key_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("SECRET_KEY") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("SECRET_KEY") };
        secret
    } else if let Some(path) = secret_key_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret key file");
                return None;
            }
        }
    } else {
        error!(
            "A signing secret is required. Set SECRET_KEY environment variable (recommended) or use --secret-key-file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_KEY_LENGTH {
        error!(
            "Secret key is shorter than {} characters. Use a longer secret",
            MIN_SECRET_KEY_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Handle the --create-admin flag: create an admin holding every permission.
///
/// An existing user with the same name is left untouched.
pub async fn handle_create_admin(db: &Database, bcrypt_cost: u32) {
    let read = |name: &str| match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => {
            error!(variable = %name, "--create-admin requires this environment variable");
            None
        }
    };

    let (Some(username), Some(email), Some(password)) = (
        read("ADMIN_USERNAME"),
        read("ADMIN_EMAIL"),
        read("ADMIN_PASSWORD"),
    ) else {
        std::process::exit(1);
    };

    // SAFETY: still single-threaded startup, see load_secret_key.
    unsafe { std::env::remove_var("ADMIN_PASSWORD") };

    match db.users().get_by_username(&username).await {
        Ok(Some(_)) => {
            warn!(username = %username, "Admin user already exists, skipping creation");
            return;
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            std::process::exit(1);
        }
    }

    let password_hash = match hash_password(&password, bcrypt_cost).await {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash admin password");
            std::process::exit(1);
        }
    };

    let admin = NewUser {
        username: &username,
        email: &email,
        password_hash: &password_hash,
        is_admin: true,
        permissions: Permission::all(),
    };

    match db.users().create(&admin).await {
        Ok(id) => info!(username = %username, user_id = id, "Admin user created"),
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, secret_key: String) -> ServerConfig {
    let settings = TokenSettings {
        secret: secret_key.into_bytes(),
        algorithm: args.algorithm,
        access_ttl: minutes(args.access_token_expire_minutes),
        refresh_ttl: minutes(args.refresh_token_expire_minutes),
    };

    ServerConfig {
        db,
        authority: Arc::new(TokenAuthority::new(&settings)),
        password_cost: args.bcrypt_cost,
        login_attempts_per_minute: args.login_attempts_per_minute,
        trust_forwarded_for: args.trust_forwarded_for,
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
