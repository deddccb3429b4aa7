pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{CurrencyCode, RateProvider};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Convert {
        amount: String,
        from: Option<CurrencyCode>,
        to: Option<CurrencyCode>,
    },
    Currencies,
    Screen,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxconv starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        base_url = %config.provider.base_url,
        reference = %config.reference_currency,
        base = %config.base_currency,
        target = %config.target_currency,
        "Loaded config"
    );

    let api_key = config.provider.api_key()?;
    let provider: Arc<dyn RateProvider> = Arc::new(
        providers::ExchangeRateApiProvider::new(&config.provider.base_url, &api_key),
    );

    match command {
        AppCommand::Convert { amount, from, to } => {
            cli::convert::run(provider, &config, &amount, from, to).await
        }
        AppCommand::Currencies => {
            cli::currencies::run(provider.as_ref(), &config.reference_currency).await
        }
        AppCommand::Screen => cli::screen::run(provider, &config).await,
    }
}
