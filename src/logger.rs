// Small structured logger with DEBUG/INFO/WARN/ERROR levels on stderr.
// The level is global and switched once at startup by --debug.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// Log level values are ordered (Info < Debug) for easy comparisons.
const INFO_LEVEL: u8 = 0;
const DEBUG_LEVEL: u8 = 1;

static LOG_LEVEL: AtomicU8 = AtomicU8::new(INFO_LEVEL);

// Set the global log level based on the --debug flag.
pub fn set_debug(enabled: bool) {
    let level = if enabled { DEBUG_LEVEL } else { INFO_LEVEL };
    LOG_LEVEL.store(level, Ordering::Relaxed);
}

pub fn is_debug() -> bool {
    LOG_LEVEL.load(Ordering::Relaxed) >= DEBUG_LEVEL
}

pub fn info(msg: &str) {
    log_line("INFO", msg);
}

// Print a DEBUG-level message if enabled.
pub fn debug(msg: &str) {
    if is_debug() {
        log_line("DEBUG", msg);
    }
}

pub fn warn(msg: &str) {
    log_line("WARN", msg);
}

pub fn error(msg: &str) {
    log_line("ERROR", msg);
}

fn log_line(level: &str, msg: &str) {
    eprintln!("{}", format_line(level, timestamp(), msg));
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn format_line(level: &str, ts: u64, msg: &str) -> String {
    format!("[{}] {} {}", level, ts, msg)
}
