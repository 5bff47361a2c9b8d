//! Sync runtime: no-argument entry point for one fetch→normalize→load→report
//! run over the trailing window.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin finsync
//! ```
//!
//! ## Environment Variables
//!
//! - SP_API_REFRESH_TOKEN, SP_API_CLIENT_ID, SP_API_CLIENT_SECRET,
//!   SP_API_LWA_APP_ID, SP_API_AWS_ACCESS_KEY, SP_API_AWS_SECRET_KEY,
//!   SP_API_ROLE_ARN - reporting API credentials
//! - SP_API_ENDPOINT - API base URL (default: https://sellingpartnerapi-na.amazon.com)
//! - FINSYNC_DB_PATH - SQLite database path (default: data/finsync.db)
//! - FINSYNC_LOOKBACK_DAYS - trailing window length (default: 7)
//! - RUST_LOG - logging level (optional, default: info)

use finsync::config::SyncConfig;
use finsync::source::FinanceEventSource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so the stdout report stays clean
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = SyncConfig::from_env();

    log::info!("🚀 Starting financial event sync");
    log::info!("   API endpoint: {}", config.api_endpoint);
    log::info!("   Database: {}", config.db_path);
    log::info!("   Lookback: {} days", config.lookback_days);
    if !config.credentials.lwa_app_id.is_empty() {
        log::info!("   App: {}", config.credentials.lwa_app_id);
    }
    if !config.credentials.role_arn.is_empty() {
        log::info!("   Role: {}", config.credentials.role_arn);
    }

    let source = FinanceEventSource::new(config.credentials.clone(), config.api_endpoint.clone())?;
    finsync::run(&source, &config).await?;

    log::info!("✅ Sync finished");
    Ok(())
}
