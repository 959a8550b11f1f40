use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,po_bridge=debug";

/// Install the global subscriber. `RUST_LOG` wins over `filter`.
///
/// Output goes to stderr so CLI command output on stdout stays clean.
pub fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|e| {
            eprintln!("Invalid log filter {filter:?}: {e}");
            EnvFilter::new(DEFAULT_FILTER)
        });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_test_logging();
        init_test_logging();
        init_logging(DEFAULT_FILTER);
        tracing::debug!("still logging");
    }
}
