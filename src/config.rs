//! Runtime configuration from environment variables.

use std::env;

/// Credentials for the Selling Partner reporting API.
///
/// Nothing is validated here; a missing credential surfaces as an
/// authorization failure on the first API call.
#[derive(Debug, Clone, Default)]
pub struct SpApiCredentials {
    pub refresh_token: String,
    pub lwa_app_id: String,
    pub lwa_client_id: String,
    pub lwa_client_secret: String,
    // Legacy SigV4 key pair, unused on LWA-only endpoints but part of the
    // credential profile contract.
    #[allow(dead_code)]
    pub aws_access_key: String,
    #[allow(dead_code)]
    pub aws_secret_key: String,
    pub role_arn: String,
}

/// Configuration for one sync run.
///
/// Loaded once at startup and passed by reference; no module-level state.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub credentials: SpApiCredentials,

    /// Base URL of the reporting API.
    pub api_endpoint: String,

    /// Path to the SQLite database file.
    pub db_path: String,

    /// Trailing window length, in days, ending at run time.
    pub lookback_days: i64,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SP_API_REFRESH_TOKEN`, `SP_API_CLIENT_ID`, `SP_API_CLIENT_SECRET`,
    ///   `SP_API_LWA_APP_ID`, `SP_API_AWS_ACCESS_KEY`, `SP_API_AWS_SECRET_KEY`,
    ///   `SP_API_ROLE_ARN` (no defaults; failures surface at first use)
    /// - `SP_API_ENDPOINT` (default: https://sellingpartnerapi-na.amazon.com)
    /// - `FINSYNC_DB_PATH` (default: data/finsync.db)
    /// - `FINSYNC_LOOKBACK_DAYS` (default: 7)
    pub fn from_env() -> Self {
        Self {
            credentials: SpApiCredentials {
                refresh_token: env::var("SP_API_REFRESH_TOKEN").unwrap_or_default(),
                lwa_app_id: env::var("SP_API_LWA_APP_ID").unwrap_or_default(),
                lwa_client_id: env::var("SP_API_CLIENT_ID").unwrap_or_default(),
                lwa_client_secret: env::var("SP_API_CLIENT_SECRET").unwrap_or_default(),
                aws_access_key: env::var("SP_API_AWS_ACCESS_KEY").unwrap_or_default(),
                aws_secret_key: env::var("SP_API_AWS_SECRET_KEY").unwrap_or_default(),
                role_arn: env::var("SP_API_ROLE_ARN").unwrap_or_default(),
            },

            api_endpoint: env::var("SP_API_ENDPOINT")
                .unwrap_or_else(|_| "https://sellingpartnerapi-na.amazon.com".to_string()),

            db_path: env::var("FINSYNC_DB_PATH").unwrap_or_else(|_| "data/finsync.db".to_string()),

            lookback_days: env::var("FINSYNC_LOOKBACK_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),
        }
    }
}
