use super::ui;
use crate::core::{CurrencyCode, RateProvider};
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::io::Write;
use tracing::debug;

/// Lists every currency the service knows, with its rate against `reference`.
pub async fn run_with<W: Write>(
    provider: &dyn RateProvider,
    reference: &CurrencyCode,
    out: &mut W,
) -> Result<usize> {
    let spinner = ui::new_spinner("Fetching currencies...");
    let snapshot = provider.fetch_rates(reference).await;
    spinner.finish_and_clear();
    let snapshot = snapshot.context("Error getting currency options. Please try again")?;
    debug!(count = snapshot.rates.len(), "Fetched currency list");

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Rate (1 {reference})")),
    ]);
    for option in snapshot.options() {
        let rate = snapshot.rate_for(&option.code);
        table.add_row(vec![
            Cell::new(&option.label),
            ui::format_optional_cell(rate, |r| format!("{r:.4}")),
        ]);
    }

    writeln!(out, "{table}")?;
    Ok(snapshot.rates.len())
}

pub async fn run(provider: &dyn RateProvider, reference: &CurrencyCode) -> Result<()> {
    run_with(provider, reference, &mut std::io::stdout()).await?;
    Ok(())
}
