use super::screen::{new_screen, report_events};
use super::ui::{self, StyleType};
use crate::core::config::AppConfig;
use crate::core::{CurrencyCode, RateProvider};
use anyhow::Result;
use std::io::Write;
use std::sync::Arc;

/// Converts `amount` once and writes the outcome to `out`.
///
/// A failed fetch or an invalid amount prints "N/A" rather than failing the
/// command, the same way the interactive screen behaves.
pub async fn run_with<W: Write>(
    provider: Arc<dyn RateProvider>,
    config: &AppConfig,
    amount: &str,
    from: Option<CurrencyCode>,
    to: Option<CurrencyCode>,
    out: &mut W,
) -> Result<Option<String>> {
    let mut screen = new_screen(provider, config, from, to, Some(amount));
    let mut events = screen.subscribe();

    let spinner = ui::new_spinner("Fetching exchange rate...");
    screen.refresh().await;
    spinner.finish_and_clear();
    report_events(&mut events, out)?;

    let result = screen.convert().map(str::to_string);
    let state = screen.state();
    let value = match &result {
        Some(value) => ui::style_text(value, StyleType::Result),
        None => ui::style_text("N/A", StyleType::Error),
    };
    writeln!(
        out,
        "{} {} = {} {}",
        state.amount.trim(),
        ui::style_text(state.base.as_str(), StyleType::Label),
        value,
        ui::style_text(state.target.as_str(), StyleType::Label)
    )?;
    Ok(result)
}

pub async fn run(
    provider: Arc<dyn RateProvider>,
    config: &AppConfig,
    amount: &str,
    from: Option<CurrencyCode>,
    to: Option<CurrencyCode>,
) -> Result<()> {
    run_with(provider, config, amount, from, to, &mut std::io::stdout()).await?;
    Ok(())
}
