//! Centralized timestamped logging.
//!
//! Every line is shaped like:
//!     <timestamp> [TAG][thread] message
//!
//! stderr is the canonical sink. `init` can add an append-only file sink.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Optional path of the file sink.
pub const LOG_FILE_ENV: &str = "FANSTREAM_LOG_FILE";

static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();
static RUN_ID: OnceLock<String> = OnceLock::new();

/// Initialize logging. Call once at startup.
/// - If `log_file` is Some, every log line is also appended to that path.
///
/// Returns the generated run_id.
pub fn init(log_file: Option<PathBuf>) -> String {
    let rid = RUN_ID
        .get_or_init(|| {
            // short correlation id: time xor pid
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            format!("{:08x}", (now.as_nanos() as u64 as u32) ^ std::process::id())
        })
        .clone();

    let _ = LOG_FILE.get_or_init(|| Mutex::new(None));

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => {
                if let Some(m) = LOG_FILE.get() {
                    if let Ok(mut guard) = m.lock() {
                        *guard = Some(f);
                    }
                }
            }
            Err(e) => {
                // can't go through log_line before the sink exists
                eprintln!(
                    "{}",
                    format_line("LOG", &format!("failed to open log file {}: {e}", path.display()))
                );
            }
        }
    }

    rid
}

/// Log file requested through the environment, if any.
pub fn log_file_from_env() -> Option<PathBuf> {
    std::env::var_os(LOG_FILE_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

// Local time when the platform allows it, UTC otherwise.
pub fn log_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    match time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) {
        Ok(fmt) => now
            .format(&fmt)
            .unwrap_or_else(|_| "<time-format-error>".to_string()),
        Err(_) => now.to_string(),
    }
}

pub fn log_thread_name() -> String {
    std::thread::current().name().unwrap_or("main").to_string()
}

pub fn format_line(tag: &str, msg: &str) -> String {
    format!("{} [{}][{}] {}", log_timestamp(), tag, log_thread_name(), msg)
}

/// Write one fully formatted line to stderr + optional file sink.
pub fn log_line(_level: &str, tag: &str, msg: &str) {
    let line = format_line(tag, msg);

    eprintln!("{line}");

    if let Some(m) = LOG_FILE.get() {
        if let Ok(mut guard) = m.lock() {
            if let Some(f) = guard.as_mut() {
                let _ = writeln!(f, "{line}");
                let _ = f.flush();
            }
        }
    }
}

#[macro_export]
macro_rules! logi {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("INFO", $tag, &msg);
    }};
}

#[macro_export]
macro_rules! logw {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("WARN", $tag, &msg);
    }};
}

#[macro_export]
macro_rules! loge {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("ERROR", $tag, &msg);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_shape() {
        let line = std::thread::Builder::new()
            .name("tx".into())
            .spawn(|| format_line("STREAM", "hello"))
            .unwrap()
            .join()
            .unwrap();
        // "YYYY-MM-DD HH:MM:SS.mmm [STREAM][tx] hello"
        let (ts, rest) = line.split_at(23);
        assert_eq!(rest, " [STREAM][tx] hello");
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn file_sink_receives_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fanstream.log");
        let rid = init(Some(path.clone()));
        assert_eq!(rid.len(), 8);

        log_line("INFO", "TEST", "written to file");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[TEST]"));
        assert!(text.contains("written to file"));
    }
}
