#![cfg(not(tarpaulin_include))]

use partner_survey::app;
use partner_survey::config::Config;

/// Main entry point for the questionnaire web service.
///
/// Loads `.env` configuration, initializes logging, and starts the server.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    app::run(config).await
}
