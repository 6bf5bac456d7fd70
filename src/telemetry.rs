//! Logging setup
//!
//! Installs a `tracing-subscriber` fmt layer writing to stderr so that stdout
//! stays free for answers.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `aletheia` logs at `level` and noisy
/// dependencies are held at WARN. Calling this twice is harmless: the second
/// install is ignored.
pub fn init_tracing(level: Level, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "aletheia={level},aletheia_core={level},libsql=warn,hyper=warn,reqwest=warn",
            level = level.as_str().to_lowercase()
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Map a `-v` count to a level
pub fn level_from_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
