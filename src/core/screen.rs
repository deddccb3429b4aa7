//! Converter screen state and its transitions.
//!
//! The screen owns all UI state. Callers drive it through one method per
//! trigger (mount, currency selection, refresh, amount edit, convert) and
//! observe failures through [`ScreenEvent`]s. No transition returns an error.

use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info, warn};

use super::conversion::{self, ConversionRequest, NumberFormat};
use super::currency::{CurrencyCode, CurrencyOption, NetworkError, RateProvider, RateSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
}

/// Tag for one in-flight rate fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTicket {
    pub id: u64,
    pub base: CurrencyCode,
    pub target: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenEvent {
    OptionsLoaded {
        count: usize,
    },
    OptionsFailed {
        reference: CurrencyCode,
        error: String,
    },
    RateUpdated {
        base: CurrencyCode,
        target: CurrencyCode,
        rate: f64,
    },
    /// The snapshot arrived but has no rate for the selected target.
    RateUnavailable {
        base: CurrencyCode,
        target: CurrencyCode,
    },
    RateFailed {
        base: CurrencyCode,
        target: CurrencyCode,
        error: String,
    },
    StaleResponse {
        ticket: u64,
        base: CurrencyCode,
        target: CurrencyCode,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenState {
    pub phase: Phase,
    pub base: CurrencyCode,
    pub target: CurrencyCode,
    pub amount: String,
    pub rate: Option<f64>,
    pub result: Option<String>,
    pub options: Vec<CurrencyOption>,
}

pub struct ConverterScreen {
    provider: Arc<dyn RateProvider>,
    reference: CurrencyCode,
    format: NumberFormat,
    state: ScreenState,
    next_ticket: u64,
    last_applied: u64,
    events: Option<UnboundedSender<ScreenEvent>>,
}

impl ConverterScreen {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        reference: CurrencyCode,
        base: CurrencyCode,
        target: CurrencyCode,
        amount: &str,
        format: NumberFormat,
    ) -> Self {
        ConverterScreen {
            provider,
            reference,
            format,
            state: ScreenState {
                phase: Phase::Loading,
                base,
                target,
                amount: amount.to_string(),
                rate: None,
                result: None,
                options: Vec::new(),
            },
            next_ticket: 0,
            last_applied: 0,
            events: None,
        }
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    /// Returns a receiver for screen events. A later call replaces the
    /// previous subscriber.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ScreenEvent> {
        let (tx, rx) = unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, event: ScreenEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening any more.
            let _ = tx.send(event);
        }
    }

    /// Loads the currency options and the rate for the initial pair.
    pub async fn mount(&mut self) {
        info!(base = %self.state.base, target = %self.state.target, "Mounting converter screen");
        let ticket = self.begin_rate_fetch();
        let provider = Arc::clone(&self.provider);
        let reference = self.reference.clone();

        let (options, rates) = futures::join!(
            provider.fetch_rates(&reference),
            provider.fetch_rates(&ticket.base)
        );

        self.apply_options(options);
        self.complete_rate_fetch(&ticket, rates);
    }

    fn apply_options(&mut self, result: Result<RateSnapshot, NetworkError>) {
        match result {
            Ok(snapshot) => {
                self.state.options = snapshot.options();
                debug!(count = self.state.options.len(), "Loaded currency options");
                self.emit(ScreenEvent::OptionsLoaded {
                    count: self.state.options.len(),
                });
            }
            Err(e) => {
                error!(error = %e, "Error getting currency options");
                self.emit(ScreenEvent::OptionsFailed {
                    reference: self.reference.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    pub async fn select_base(&mut self, base: CurrencyCode) {
        if let Some(ticket) = self.choose_base(base) {
            self.run_fetch(ticket).await;
        }
    }

    pub async fn select_target(&mut self, target: CurrencyCode) {
        if let Some(ticket) = self.choose_target(target) {
            self.run_fetch(ticket).await;
        }
    }

    /// Re-fetches the current pair. The prior rate stays until a newer one
    /// arrives.
    pub async fn refresh(&mut self) {
        let ticket = self.begin_rate_fetch();
        self.run_fetch(ticket).await;
    }

    async fn run_fetch(&mut self, ticket: RateTicket) {
        let result = self.provider.fetch_rates(&ticket.base).await;
        self.complete_rate_fetch(&ticket, result);
    }

    /// Changes the base currency and returns the ticket for the fetch it
    /// requires, or `None` if the base is unchanged.
    pub fn choose_base(&mut self, base: CurrencyCode) -> Option<RateTicket> {
        if base == self.state.base {
            return None;
        }
        debug!(from = %self.state.base, to = %base, "Base currency changed");
        self.state.base = base;
        self.clear_stale();
        Some(self.begin_rate_fetch())
    }

    pub fn choose_target(&mut self, target: CurrencyCode) -> Option<RateTicket> {
        if target == self.state.target {
            return None;
        }
        debug!(from = %self.state.target, to = %target, "Target currency changed");
        self.state.target = target;
        self.clear_stale();
        Some(self.begin_rate_fetch())
    }

    fn clear_stale(&mut self) {
        self.state.rate = None;
        self.state.result = None;
    }

    /// Issues a ticket for a fetch of the currently selected pair.
    pub fn begin_rate_fetch(&mut self) -> RateTicket {
        self.next_ticket += 1;
        RateTicket {
            id: self.next_ticket,
            base: self.state.base.clone(),
            target: self.state.target.clone(),
        }
    }

    /// Applies the outcome of the fetch identified by `ticket`.
    ///
    /// Responses for a pair that is no longer selected, or older than one
    /// already applied, are discarded.
    pub fn complete_rate_fetch(
        &mut self,
        ticket: &RateTicket,
        result: Result<RateSnapshot, NetworkError>,
    ) {
        let current = ticket.base == self.state.base && ticket.target == self.state.target;
        if !current || ticket.id <= self.last_applied {
            debug!(
                ticket = ticket.id,
                base = %ticket.base,
                target = %ticket.target,
                "Discarding stale rate response"
            );
            self.emit(ScreenEvent::StaleResponse {
                ticket: ticket.id,
                base: ticket.base.clone(),
                target: ticket.target.clone(),
            });
            return;
        }

        match result {
            Ok(snapshot) => {
                self.last_applied = ticket.id;
                self.state.phase = Phase::Ready;
                match snapshot.rate_for(&ticket.target) {
                    Some(rate) => {
                        debug!(base = %ticket.base, target = %ticket.target, rate, "Rate updated");
                        self.state.rate = Some(rate);
                        self.emit(ScreenEvent::RateUpdated {
                            base: ticket.base.clone(),
                            target: ticket.target.clone(),
                            rate,
                        });
                    }
                    None => {
                        warn!(
                            base = %ticket.base,
                            target = %ticket.target,
                            "No rate for target currency"
                        );
                        self.state.rate = None;
                        self.emit(ScreenEvent::RateUnavailable {
                            base: ticket.base.clone(),
                            target: ticket.target.clone(),
                        });
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Error getting latest conversion rate");
                self.emit(ScreenEvent::RateFailed {
                    base: ticket.base.clone(),
                    target: ticket.target.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    pub fn set_amount(&mut self, amount: &str) {
        self.state.amount = amount.to_string();
    }

    pub fn conversion_request(&self) -> ConversionRequest {
        ConversionRequest {
            amount: self.state.amount.clone(),
            base: self.state.base.clone(),
            target: self.state.target.clone(),
        }
    }

    /// Computes the result for the current amount and rate.
    pub fn convert(&mut self) -> Option<&str> {
        let request = self.conversion_request();
        self.state.result = conversion::convert(&request.amount, self.state.rate, &self.format);
        self.state.result.as_deref()
    }
}
