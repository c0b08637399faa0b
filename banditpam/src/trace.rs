/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! Subscriber setup for embedding applications.
//!
//! The engine itself only emits `tracing` events; nothing here is installed
//! implicitly. Callers that want console output call [`init_subscriber`]
//! once at startup, typically with the same verbosity they configure the fit
//! with.

use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Map the engine's verbosity knob onto a log level.
///
/// Zero keeps warnings and errors only; one adds the per-phase summaries; two
/// or more adds the per-iteration detail emitted at `debug!`.
pub fn verbosity_filter(verbosity: u32) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// The filter every subscriber variant shares: the verbosity-derived level as
/// the default, overridable through `RUST_LOG`.
fn env_filter(verbosity: u32) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(verbosity_filter(verbosity).into())
        .from_env_lossy()
}

/// Install a global subscriber logging to `stdout` at the level implied by
/// `verbosity`.
pub fn init_subscriber(verbosity: u32) {
    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(fmt::layer().with_target(true))
        .init();
}

/// Install a subscriber for the current thread only, writing through the
/// test harness so output is captured per test.
///
/// Dropping the returned guard uninstalls it, letting test threads hold
/// non-conflicting subscribers at different verbosities.
pub fn init_test_subscriber(verbosity: u32) -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(fmt::layer().with_target(true).with_test_writer())
        .set_default()
}

#[cfg(test)]
mod tests {
    use tracing::{debug, info, warn};

    use super::*;

    #[test]
    fn test_verbosity_filter() {
        assert_eq!(verbosity_filter(0), LevelFilter::WARN);
        assert_eq!(verbosity_filter(1), LevelFilter::INFO);
        assert_eq!(verbosity_filter(2), LevelFilter::DEBUG);
        assert_eq!(verbosity_filter(9), LevelFilter::DEBUG);
    }

    #[test]
    fn test_subscriber_accepts_events_at_every_verbosity() {
        for verbosity in 0..3 {
            let _guard = init_test_subscriber(verbosity);
            warn!(verbosity, "warn event");
            info!(verbosity, "info event");
            debug!(verbosity, "debug event");
        }
    }

    #[test]
    fn test_dropping_the_guard_allows_a_new_subscriber() {
        {
            let _guard = init_test_subscriber(0);
            warn!("emitted under the first guard");
        }
        let _guard = init_test_subscriber(1);
        info!("emitted under the replacement guard");
    }
}
