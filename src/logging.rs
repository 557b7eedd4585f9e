// Tracing initialization shared by the binaries
// Filter comes from RUST_LOG (default "info"); STONES_LOG_FORMAT=json switches to JSON lines.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "STONES_LOG_FORMAT";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn wants_json() -> bool {
    std::env::var(LOG_FORMAT_VAR)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log to stderr. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if wants_json() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Log to a file, for the terminal UI which owns stdout and stderr
pub fn init_to_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);

    let _ = if wants_json() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    Ok(())
}
