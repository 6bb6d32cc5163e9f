use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use flate2::{write::GzEncoder, Compression};
use fs2::FileExt;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::proxy::sanitize::mask_credentials_in_text;
use crate::core::proxy::types::parse_env_bool;

/// Environment variable that switches debug logging on
pub const DEBUG_ENV_VAR: &str = "PROXYWATCH_DEBUG";
/// Environment variable overriding the log file location
pub const DEBUG_LOG_PATH_ENV_VAR: &str = "PROXYWATCH_DEBUG_LOG";

const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEPT_ARCHIVES: usize = 5;
// Size is only looked at every N writes
const SIZE_CHECK_EVERY: u64 = 200;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "UPPERCASE")]
enum Level {
    Debug,
    Error,
    Perf,
    Detect,
    Probe,
    Policy,
}

#[derive(Serialize)]
struct Record<'a> {
    timestamp: String,
    level: Level,
    component: &'a str,
    event: &'a str,
    message: String,
    correlation_id: &'a str,
    fields: Map<String, Value>,
}

/// Field set for one record; string values are redacted on write
#[derive(Default)]
struct Fields(Map<String, Value>);

impl Fields {
    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    fn with_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }
}

fn redaction_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)(proxy-)?authorization[:\s]+\S+",
            r"(?i)bearer\s+\S+",
            r"(?i)(password|passwd|secret|token)\s*[:=]\s*\S+",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn redact(text: &str) -> String {
    redaction_patterns()
        .iter()
        .fold(mask_credentials_in_text(text), |acc, re| {
            re.replace_all(&acc, "[REDACTED]").into_owned()
        })
}

/// Append-only JSONL file rolled into gzip archives once it grows too large
struct LogFile {
    path: PathBuf,
    writes: AtomicU64,
}

impl LogFile {
    fn open(path: PathBuf) -> Self {
        if let Some(dir) = path.parent() {
            let _ = fs::create_dir_all(dir);
        }
        Self {
            path,
            writes: AtomicU64::new(0),
        }
    }

    fn append(&self, line: &str) -> io::Result<()> {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SIZE_CHECK_EVERY == 0 {
            let _ = self.roll_if_oversized();
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    fn oversized(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.len() >= ROTATE_AT_BYTES)
            .unwrap_or(false)
    }

    fn roll_if_oversized(&self) -> io::Result<()> {
        if !self.oversized() {
            return Ok(());
        }

        // Another process holding the lock is already rolling this file
        let lock_path = self.path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock.try_lock_exclusive().is_err() {
            return Ok(());
        }

        let rolled = if self.oversized() { self.roll() } else { Ok(()) };
        let _ = fs::remove_file(&lock_path);
        rolled
    }

    fn archive_prefix(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "debug".to_string());
        format!("{}.", stem)
    }

    fn roll(&self) -> io::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let archive = dir.join(format!(
            "{}{}.gz",
            self.archive_prefix(),
            Local::now().format("%Y%m%d_%H%M%S")
        ));

        // Move aside first so writers start a fresh file immediately
        let staged = self.path.with_extension("rolling");
        fs::rename(&self.path, &staged)?;

        let mut gz = GzEncoder::new(File::create(&archive)?, Compression::default());
        io::copy(&mut BufReader::new(File::open(&staged)?), &mut gz)?;
        gz.finish()?;
        fs::remove_file(&staged)?;

        self.prune_archives(dir)
    }

    fn prune_archives(&self, dir: &Path) -> io::Result<()> {
        let prefix = self.archive_prefix();
        let mut archives: Vec<_> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(&prefix) && name.ends_with(".gz")
            })
            .filter_map(|entry| {
                let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
                Some((modified, entry.path()))
            })
            .collect();

        if archives.len() <= KEPT_ARCHIVES {
            return Ok(());
        }
        archives.sort();
        let excess = archives.len() - KEPT_ARCHIVES;
        for (_, path) in archives.into_iter().take(excess) {
            let _ = fs::remove_file(path);
        }
        Ok(())
    }
}

/// JSON-lines debug logger for the monitoring core
///
/// Disabled unless `PROXYWATCH_DEBUG` is truthy. Every message passes
/// through redaction before it is written, including credentials embedded
/// in proxy URLs.
pub struct DebugLogger {
    sink: Option<Mutex<LogFile>>,
    session_id: String,
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugLogger {
    pub fn new() -> Self {
        let sink =
            parse_env_bool(DEBUG_ENV_VAR).then(|| Mutex::new(LogFile::open(Self::log_path())));
        let mut session_id = Uuid::new_v4().simple().to_string();
        session_id.truncate(8);
        Self { sink, session_id }
    }

    fn log_path() -> PathBuf {
        match env::var(DEBUG_LOG_PATH_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".proxywatch")
                .join("proxywatch-debug.log"),
        }
    }

    fn write(
        &self,
        level: Level,
        component: &str,
        event: &str,
        message: &str,
        correlation_id: Option<&str>,
        fields: Fields,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };

        let fields = fields
            .0
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, Value::String(redact(&s))),
                other => (key, other),
            })
            .collect();

        let record = Record {
            timestamp: Local::now().to_rfc3339(),
            level,
            component,
            event,
            message: redact(message),
            correlation_id: correlation_id.unwrap_or(&self.session_id),
            fields,
        };

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        if let Ok(file) = sink.lock() {
            let _ = file.append(&line);
        }
    }

    pub fn debug(&self, component: &str, event: &str, message: &str) {
        self.write(Level::Debug, component, event, message, None, Fields::default());
    }

    pub fn error(&self, component: &str, event: &str, message: &str) {
        self.write(Level::Error, component, event, message, None, Fields::default());
    }

    pub fn performance(&self, component: &str, operation: &str, duration_ms: u64) {
        let fields = Fields::default().with("duration_ms", duration_ms);
        self.write(Level::Perf, component, "operation_complete", operation, None, fields);
    }

    // Detection loop

    pub fn check_start(&self, trigger: &str, max_retries: u32, correlation_id: &str) {
        let fields = Fields::default()
            .with("trigger", trigger)
            .with("max_retries", max_retries);
        self.write(
            Level::Detect,
            "DetectionMonitor",
            "check_start",
            &format!("Starting detection check ({})", trigger),
            Some(correlation_id),
            fields,
        );
    }

    pub fn check_attempt_failed(&self, attempt: u32, error: &str, correlation_id: &str) {
        let fields = Fields::default().with("attempt", attempt).with("error", error);
        self.write(
            Level::Detect,
            "DetectionMonitor",
            "attempt_failed",
            &format!("Detection attempt {} failed: {}", attempt, error),
            Some(correlation_id),
            fields,
        );
    }

    pub fn retry_scheduled(&self, attempt: u32, delay_ms: u64, correlation_id: &str) {
        let fields = Fields::default()
            .with("attempt", attempt)
            .with("delay_ms", delay_ms);
        self.write(
            Level::Detect,
            "DetectionMonitor",
            "retry_scheduled",
            &format!("Retry {} in {}ms", attempt, delay_ms),
            Some(correlation_id),
            fields,
        );
    }

    pub fn check_end(
        &self,
        success: bool,
        proxy_url: Option<&str>,
        attempts: u32,
        duration_ms: u64,
        correlation_id: &str,
    ) {
        let outcome = if success { "succeeded" } else { "failed" };
        let fields = Fields::default()
            .with("success", success)
            .with("attempts", attempts)
            .with("duration_ms", duration_ms)
            .with_opt("proxy_url", proxy_url);
        self.write(
            Level::Detect,
            "DetectionMonitor",
            "check_end",
            &format!("Check {} after {} attempt(s) ({}ms)", outcome, attempts, duration_ms),
            Some(correlation_id),
            fields,
        );
    }

    // Reachability

    pub fn probe_start(&self, proxy_url: &str, target_count: usize, timeout_ms: u64) {
        let fields = Fields::default()
            .with("proxy_url", proxy_url)
            .with("targets", target_count)
            .with("timeout_ms", timeout_ms);
        self.write(
            Level::Probe,
            "ReachabilityProbe",
            "probe_start",
            &format!("Probing {} target(s) through {}", target_count, proxy_url),
            None,
            fields,
        );
    }

    pub fn probe_attempt(&self, target: &str, outcome: &str, elapsed_ms: u64) {
        let fields = Fields::default()
            .with("target", target)
            .with("outcome", outcome)
            .with("elapsed_ms", elapsed_ms);
        self.write(
            Level::Probe,
            "ReachabilityProbe",
            "probe_attempt",
            &format!("{} -> {} ({}ms)", target, outcome, elapsed_ms),
            None,
            fields,
        );
    }

    pub fn probe_end(&self, success: bool, error_count: usize, duration_ms: u64) {
        let verdict = if success { "reachable" } else { "unreachable" };
        let fields = Fields::default()
            .with("success", success)
            .with("errors", error_count)
            .with("duration_ms", duration_ms);
        self.write(
            Level::Probe,
            "ReachabilityProbe",
            "probe_end",
            &format!("Probe {} ({}ms)", verdict, duration_ms),
            None,
            fields,
        );
    }

    pub fn reachability_transition(&self, previous: bool, current: bool, proxy_url: Option<&str>) {
        let fields = Fields::default()
            .with("previous", previous)
            .with("current", current)
            .with_opt("proxy_url", proxy_url);
        self.write(
            Level::Probe,
            "DetectionMonitor",
            "reachability_changed",
            &format!("Reachability {} -> {}", previous, current),
            None,
            fields,
        );
    }

    pub fn scheduler_state(&self, state: &str, interval_ms: u64) {
        let fields = Fields::default()
            .with("state", state)
            .with("interval_ms", interval_ms);
        self.write(
            Level::Probe,
            "ReachabilityScheduler",
            "scheduler_state",
            &format!("Scheduler {} (interval {}ms)", state, interval_ms),
            None,
            fields,
        );
    }

    pub fn policy_event(&self, kind: &str, proxy_url: Option<&str>) {
        let fields = Fields::default()
            .with("kind", kind)
            .with_opt("proxy_url", proxy_url);
        self.write(
            Level::Policy,
            "FallbackSelector",
            "policy_event",
            &format!("Policy: {}", kind),
            None,
            fields,
        );
    }

    pub fn config_updated(&self, poll_interval_ms: u64, rearmed: bool) {
        let fields = Fields::default()
            .with("poll_interval_ms", poll_interval_ms)
            .with("rearmed", rearmed);
        self.write(
            Level::Debug,
            "DetectionMonitor",
            "config_updated",
            &format!("Configuration updated (poll {}ms)", poll_interval_ms),
            None,
            fields,
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn get_session_id(&self) -> &str {
        &self.session_id
    }
}

pub fn get_debug_logger() -> DebugLogger {
    DebugLogger::new()
}
