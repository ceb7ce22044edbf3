//! Tracing initialisation for the resteval worker.
//!
//! Without `RUST_LOG` only the resteval crates log at the requested level;
//! dependencies (image decoders, tokio) stay at `warn`. JSON output flattens
//! event fields and carries the enclosing `resteval.run` span, so every line
//! of a run can be selected by `run_id`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the requested verbosity.
const OWN_TARGETS: &[&str] = &["resteval", "resteval_core", "resteval_state", "resteval_worker"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let mut directives = vec![Level::WARN.as_str().to_ascii_lowercase()];
    for target in OWN_TARGETS {
        directives.push(format!("{target}={}", level.as_str().to_ascii_lowercase()));
    }
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(level >= Level::DEBUG)).try_init()
    };
    installed.is_ok()
}
