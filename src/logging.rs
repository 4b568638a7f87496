//! Logging init for the `filekit` binary: structured events to stderr.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset, chosen by the number of `-q` flags.
fn default_directive(quiet: u8) -> &'static str {
    match quiet {
        0 => "info,filekit=debug",
        1 => "warn",
        _ => "error",
    }
}

/// Initialize logging to stderr. `RUST_LOG` overrides the quiet level.
pub fn init_logging(quiet: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(quiet)));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quieter_levels_raise_threshold() {
        assert_eq!(default_directive(0), "info,filekit=debug");
        assert_eq!(default_directive(1), "warn");
        assert_eq!(default_directive(3), "error");
    }
}
