//! Process-wide leveled logging with text/JSON output and an optional
//! in-memory capture buffer that tests can inspect.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::json;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Text = 0,
    Json = 1,
}

impl Format {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LogConfig {
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Text,
            timestamps: true,
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static LOG_FORMAT: AtomicU8 = AtomicU8::new(Format::Text as u8);
static LOG_TIMESTAMPS: AtomicBool = AtomicBool::new(true);
static LOG_STDERR_ENABLED: AtomicBool = AtomicBool::new(true);
static CAPTURING: AtomicBool = AtomicBool::new(false);
static CAPTURE: OnceLock<Mutex<Capture>> = OnceLock::new();

pub fn init(config: LogConfig) {
    LOG_LEVEL.store(config.level as u8, Ordering::Relaxed);
    LOG_FORMAT.store(config.format as u8, Ordering::Relaxed);
    LOG_TIMESTAMPS.store(config.timestamps, Ordering::Relaxed);
}

pub fn set_stderr_enabled(enabled: bool) {
    LOG_STDERR_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn enabled(level: Level) -> bool {
    level as u8 <= LOG_LEVEL.load(Ordering::Relaxed)
}

fn format() -> Format {
    match LOG_FORMAT.load(Ordering::Relaxed) {
        1 => Format::Json,
        _ => Format::Text,
    }
}

/// One formatted log line before it is written anywhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Time since the Unix epoch.
    pub at: Duration,
    pub level: Level,
    pub target: &'static str,
    pub msg: String,
}

impl Record {
    /// `level target: msg`, optionally prefixed with `seconds.millis`.
    pub fn render_text(&self, timestamps: bool) -> String {
        let line = format!("{} {}: {}", self.level, self.target, self.msg);
        if timestamps {
            format!(
                "{}.{:03} {line}",
                self.at.as_secs(),
                self.at.subsec_millis()
            )
        } else {
            line
        }
    }

    pub fn render_json(&self) -> String {
        let ts_ms = u64::try_from(self.at.as_millis()).unwrap_or(u64::MAX);
        json!({
            "ts_ms": ts_ms,
            "level": self.level.as_str(),
            "target": self.target,
            "msg": self.msg,
        })
        .to_string()
    }
}

/// Ring of the most recent records.
struct Capture {
    capacity: usize,
    records: VecDeque<Record>,
}

impl Capture {
    fn push(&mut self, record: Record) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

fn capture() -> &'static Mutex<Capture> {
    CAPTURE.get_or_init(|| {
        Mutex::new(Capture {
            capacity: 0,
            records: VecDeque::new(),
        })
    })
}

/// Starts keeping the most recent `capacity` records; 0 stops capturing.
/// Records already held beyond a smaller capacity are dropped oldest first.
pub fn enable_capture(capacity: usize) {
    if let Ok(mut capture) = capture().lock() {
        capture.capacity = capacity;
        while capture.records.len() > capacity {
            capture.records.pop_front();
        }
    }
    CAPTURING.store(capacity > 0, Ordering::Relaxed);
}

pub fn clear_captured_logs() {
    if let Ok(mut capture) = capture().lock() {
        capture.records.clear();
    }
}

/// Captured messages whose target starts with `prefix`, oldest first.
pub fn captured_messages(prefix: &str) -> Vec<String> {
    let Ok(capture) = capture().lock() else {
        return Vec::new();
    };
    capture
        .records
        .iter()
        .filter(|record| record.target.starts_with(prefix))
        .map(|record| record.msg.clone())
        .collect()
}

pub fn log(level: Level, target: &'static str, args: fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    let to_stderr = LOG_STDERR_ENABLED.load(Ordering::Relaxed);
    let capturing = CAPTURING.load(Ordering::Relaxed);
    if !to_stderr && !capturing {
        return;
    }

    let record = Record {
        at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default(),
        level,
        target,
        msg: args.to_string(),
    };
    if to_stderr {
        let line = match format() {
            Format::Text => record.render_text(LOG_TIMESTAMPS.load(Ordering::Relaxed)),
            Format::Json => record.render_json(),
        };
        let _ = writeln!(io::stderr().lock(), "{line}");
    }
    if capturing {
        if let Ok(mut capture) = capture().lock() {
            capture.push(record);
        }
    }
}

#[macro_export]
macro_rules! log_at {
    ($level:expr, $($arg:tt)*) => {{
        if $crate::enabled($level) {
            $crate::log($level, module_path!(), format_args!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Error, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Warn, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Info, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Debug, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Trace, $($arg)*);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            at: Duration::from_millis(1_700_000_000_007),
            level: Level::Warn,
            target: "memwallet::ledger",
            msg: "replaced \"entry\"".to_string(),
        }
    }

    #[test]
    fn parse_level_and_format() {
        assert_eq!(Level::parse("WARN"), Some(Level::Warn));
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("nope"), None);
        assert_eq!(Format::parse("JSON"), Some(Format::Json));
        assert_eq!(Format::parse("nope"), None);
    }

    #[test]
    fn text_lines_carry_optional_epoch_timestamp() {
        let record = record();
        assert_eq!(
            record.render_text(false),
            "WARN memwallet::ledger: replaced \"entry\""
        );
        assert_eq!(
            record.render_text(true),
            "1700000000.007 WARN memwallet::ledger: replaced \"entry\""
        );
    }

    #[test]
    fn json_lines_escape_the_message() {
        let value: serde_json::Value =
            serde_json::from_str(&record().render_json()).expect("valid json");
        assert_eq!(value["ts_ms"], 1_700_000_000_007u64);
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["target"], "memwallet::ledger");
        assert_eq!(value["msg"], "replaced \"entry\"");
    }

    #[test]
    fn capture_keeps_most_recent_records() {
        set_stderr_enabled(false);
        enable_capture(2);
        clear_captured_logs();
        log_warn!("first");
        log_warn!("second");
        log_warn!("third");
        log_trace!("below the default level");
        let messages = captured_messages(module_path!());
        assert_eq!(messages, vec!["second".to_string(), "third".to_string()]);
        enable_capture(0);
        log_warn!("not kept");
        assert_eq!(captured_messages(module_path!()).len(), 0);
    }
}
