//! Amount conversion and display formatting

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::currency::CurrencyCode;

/// Separators used when rendering a converted amount.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NumberFormat {
    #[serde(default = "default_thousands_separator")]
    pub thousands_separator: char,
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,
}

fn default_thousands_separator() -> char {
    ','
}

fn default_decimal_separator() -> char {
    '.'
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat {
            thousands_separator: default_thousands_separator(),
            decimal_separator: default_decimal_separator(),
        }
    }
}

impl NumberFormat {
    /// Renders `value` with exactly two fraction digits and grouped thousands.
    pub fn format(&self, value: Decimal) -> String {
        let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let plain = format!("{:.2}", rounded.abs());
        let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

        let mut grouped = String::with_capacity(plain.len() + int_part.len() / 3);
        for (i, digit) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(self.thousands_separator);
            }
            grouped.push(digit);
        }

        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        format!("{sign}{grouped}{}{frac_part}", self.decimal_separator)
    }
}

/// The inputs of one conversion, captured at the moment the user asks for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub amount: String,
    pub base: CurrencyCode,
    pub target: CurrencyCode,
}

fn parse_amount(amount: &str) -> Option<Decimal> {
    let amount = amount.trim();
    // Digit separators ("1,000", "1_000") are not accepted as amounts.
    if amount.is_empty() || amount.contains(['_', ',']) {
        return None;
    }
    Decimal::from_str(amount)
        .or_else(|_| Decimal::from_scientific(amount))
        .ok()
}

/// Converts `amount` at `rate` and formats the result for display.
///
/// Returns `None` when the amount is not a number, when no usable rate is
/// known, or when the product does not fit a decimal.
pub fn convert(amount: &str, rate: Option<f64>, format: &NumberFormat) -> Option<String> {
    let rate = rate.filter(|r| r.is_finite() && *r > 0.0)?;
    let amount = parse_amount(amount)?;
    let rate = Decimal::from_f64(rate)?;
    let value = amount.checked_mul(rate)?;
    Some(format.format(value))
}
