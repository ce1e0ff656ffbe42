//! Telemetry initialization.
//!
//! Controlled by `BRAID_LOG`:
//! - unset → human-readable events to stderr at `warn` and above
//! - `"json"` → JSON events to stderr (for log collectors)
//!
//! `RUST_LOG` overrides the level filter in the usual env-filter syntax.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Initialize the tracing subscriber. Call once, at the top of `main()`.
///
/// Diagnostics go to stderr so they never mix with command output (which may
/// be machine-parsed JSON on stdout).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var("BRAID_LOG").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
