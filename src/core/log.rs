//! Logging setup for the CLI

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Per-target levels. Verbose mode shows this crate at debug and the HTTP
/// stack at info.
pub fn app_targets(verbose: bool) -> Targets {
    if !verbose {
        return Targets::new().with_default(LevelFilter::OFF);
    }
    Targets::new()
        .with_target("fxconv", LevelFilter::DEBUG)
        .with_target("reqwest", LevelFilter::INFO)
        .with_target("hyper_util", LevelFilter::INFO)
        .with_default(LevelFilter::WARN)
}

/// Installs the global subscriber. `RUST_LOG`, when set, narrows the output
/// further.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "off" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time().with_writer(std::io::stderr))
        .with(app_targets(verbose))
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_quiet_by_default() {
        let targets = app_targets(false);
        assert!(!targets.would_enable("fxconv::core::screen", &Level::ERROR));
        assert!(!targets.would_enable("reqwest::connect", &Level::ERROR));
    }

    #[test]
    fn test_verbose_targets() {
        let targets = app_targets(true);
        assert!(targets.would_enable("fxconv::core::screen", &Level::DEBUG));
        assert!(targets.would_enable("fxconv::providers::exchangerate_api", &Level::DEBUG));
        assert!(targets.would_enable("reqwest::connect", &Level::INFO));
        assert!(!targets.would_enable("reqwest::connect", &Level::DEBUG));
        assert!(!targets.would_enable("hyper_util::client", &Level::DEBUG));
        assert!(targets.would_enable("tokio::runtime", &Level::WARN));
        assert!(!targets.would_enable("tokio::runtime", &Level::INFO));
    }
}
