//! Logging setup. Library crates only emit events; the subscriber lives here.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `verbosity` 0 is INFO, 1 DEBUG, 2+ TRACE. `RUST_LOG` is honoured, with
/// the verbosity directive for compage targets layered on top. With `json`,
/// events are written to stderr as one JSON object per line:
///
/// ```json
/// {"timestamp":"...","level":"WARN","fields":{"path":"pkg/a.py","code":"COMPILE_ERROR","message":"scan failed: ..."},"target":"compage_core::aggregate"}
/// ```
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    for target in ["compage_core", "compage_cli"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
