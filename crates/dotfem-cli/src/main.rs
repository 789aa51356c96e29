mod cli;

use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    std::process::exit(cli::run_from_env());
}

/// `RUST_LOG` controls verbosity; warnings only by default. Logs go to stderr
/// so the summary on stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
