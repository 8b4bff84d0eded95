//! Tracing setup for binaries and tests embedding the bindings.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::format::FmtSpan;

/// Installs a global fmt subscriber filtered by `RUST_LOG` plus `directive`
/// (for example `"messaging=debug"`).
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing(directive: &str) -> Result<(), ParseError> {
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .try_init();
    Ok(())
}
