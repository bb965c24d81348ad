//! Logging for webgen.
use anyhow::Context;
use std::io::LineWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::time::OffsetTime;
use webgen_core::get_data_dir;

const MAX_LOG_BYTES: u64 = 100 * 1024;

/// Moves `webgen.log` aside to `webgen.log.old` once it outgrows `MAX_LOG_BYTES`.
fn rotate_log(data_dir: &Path) -> anyhow::Result<PathBuf> {
    let log_path = data_dir.join("webgen.log");

    if log_path.exists() && std::fs::metadata(&log_path)?.len() > MAX_LOG_BYTES {
        let backup_path = data_dir.join("webgen.log.old");
        if backup_path.exists() {
            std::fs::remove_file(&backup_path)?;
        }
        std::fs::rename(&log_path, backup_path)?;
    }

    Ok(log_path)
}

/// Initializes file based logging at `<data_dir>/webgen.log`.
///
/// The webgen crates log at DEBUG, rustyline at INFO.
pub fn setup_logging() -> anyhow::Result<PathBuf> {
    let data_dir = get_data_dir().context("Failed to get data directory")?;
    let log_path = rotate_log(&data_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Ensure the logs are flushed after every line
    let writer = Mutex::new(LineWriter::new(log_file));

    tracing_subscriber::fmt()
        .with_env_filter("webgen=debug,webgen_core=debug,webgen_tools_webapp=debug,rustyline=info")
        .with_writer(writer)
        .with_ansi(false) // Disable ANSI escape codes for file logging
        .with_timer(OffsetTime::local_rfc_3339()?)
        .init();
    Ok(log_path)
}
