// Diagnostic logging setup for the binaries
// Library code only emits tracing events; the subscriber lives here.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing_subscriber::EnvFilter;

pub const LOG_FILE_PATH: &str = "/tmp/p2pong-sync-debug.log";

/// Install the global tracing subscriber.
///
/// Filtering comes from `RUST_LOG` (default `info`). With `to_file` the log
/// goes to [`LOG_FILE_PATH`], truncated at startup, at `debug` level unless
/// `RUST_LOG` says otherwise.
pub fn init(to_file: bool) -> io::Result<()> {
    let default_level = if to_file { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = if to_file {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(LOG_FILE_PATH)?;

        writeln!(file, "=== P2Pong Sync Debug Log ===")?;
        writeln!(file, "Session started: {:?}", SystemTime::now())?;
        writeln!(file, "To monitor: tail -f {}", LOG_FILE_PATH)?;
        writeln!(file, "========================================\n")?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| io::Error::other(e.to_string()))
}
