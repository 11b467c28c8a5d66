//! Logging configuration for the Cloak node.

use crate::args::LogArgs;
use eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

/// Build the filter for `args`.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` env var if set, or the level implied by `-v` flags
/// 3. Apply any custom filter from `--log.filter`
pub fn build_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom_filter) = &args.filter {
        for directive in custom_filter.split(',') {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
    }

    filter
}

/// Initialize logging based on command line arguments.
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = build_filter(args);

    let result = if args.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .without_time()
            .try_init()
    };
    result.map_err(|e| eyre!("failed to install tracing subscriber: {e}"))?;

    if !args.quiet && !args.json {
        log_startup_banner();
    }

    Ok(())
}

/// Log a startup banner with the Cloak version
fn log_startup_banner() {
    let banner = format!(
        r#"
   ___ _             _
  / __| |___  __ _  | |__
 | (__| / _ \/ _` | | / /
  \___|_\___/\__,_| |_\_\

 Overlay Node v{}
    "#,
        crate::version::SHORT_VERSION
    );

    println!("{}", banner);
}
