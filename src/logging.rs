use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset.
pub fn default_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

pub fn init_tracing(quiet: bool, verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(quiet, verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::default_level;

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(default_level(false, false), "info");
        assert_eq!(default_level(false, true), "debug");
        assert_eq!(default_level(true, true), "warn");
    }
}
