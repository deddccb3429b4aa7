//! Core business logic: rates, conversion and the converter screen

pub mod config;
pub mod conversion;
pub mod currency;
pub mod log;
pub mod screen;

// Re-export main types for cleaner imports
pub use conversion::{ConversionRequest, NumberFormat, convert};
pub use currency::{CurrencyCode, CurrencyOption, NetworkError, RateProvider, RateSnapshot};
pub use screen::{ConverterScreen, Phase, RateTicket, ScreenEvent, ScreenState};
