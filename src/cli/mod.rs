//! Terminal front-end for the converter

pub mod convert;
pub mod currencies;
pub mod screen;
pub mod setup;
pub mod ui;
