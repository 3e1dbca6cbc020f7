// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config file says otherwise.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global compact fmt subscriber.
///
/// `RUST_LOG` wins over `fallback`; an unparsable `fallback` degrades to
/// [`DEFAULT_LOG_FILTER`]. Calling this twice is harmless.
pub fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_or_default(fallback));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

fn filter_or_default(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
