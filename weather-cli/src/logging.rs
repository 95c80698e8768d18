use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize tracing on stderr. `RUST_LOG` takes precedence over the flags.
pub fn init(verbose: u8, quiet: bool, default_level: &'static str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet, default_level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn level_for(verbose: u8, quiet: bool, default_level: &'static str) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => default_level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
