use anyhow::{anyhow, Result};
use chrono::Local;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use crate::app_paths::AppPaths;
use crate::config::LoggingConfig;

/// Default number of log entries to keep in memory
const MAX_LOG_ENTRIES: usize = 1000;

static LOG_BUFFER: OnceLock<LogRingBuffer> = OnceLock::new();

/// A log entry with timestamp and message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, target: &str, message: String) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S.%3f").to_string(),
            level: level.to_string().to_uppercase(),
            target: target.to_string(),
            message,
        }
    }

    /// Format for display in a debug view
    pub fn format_for_display(&self) -> String {
        format!(
            "[{}] {} [{}] {}",
            self.timestamp, self.level, self.target, self.message
        )
    }

    /// Parse one line of the compact formatter: "LEVEL target: message"
    fn parse(line: &str) -> Self {
        let (level, rest) = match line.split_once(' ') {
            Some((head, rest)) => match head.parse::<Level>() {
                Ok(level) => (level, rest.trim_start()),
                Err(_) => (Level::INFO, line),
            },
            None => (Level::INFO, line),
        };

        let (target, message) = match rest.split_once(": ") {
            // A target never contains spaces
            Some((target, message)) if !target.contains(' ') => (target, message.trim()),
            _ => ("general", rest),
        };

        Self::new(level, target, message.to_string())
    }
}

/// Thread-safe ring buffer for log entries
#[derive(Clone)]
pub struct LogRingBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl LogRingBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        // A panic while holding the lock leaves a still-usable queue
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for LogRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer that captures formatted log lines into the ring buffer and,
/// optionally, appends them to a log file
#[derive(Clone)]
pub struct RingBufferWriter {
    buffer: LogRingBuffer,
    file: Option<Arc<Mutex<File>>>,
}

impl RingBufferWriter {
    pub fn new(buffer: LogRingBuffer) -> Self {
        Self { buffer, file: None }
    }

    pub fn with_file(mut self, file: File) -> Self {
        self.file = Some(Arc::new(Mutex::new(file)));
        self
    }
}

impl Write for RingBufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = std::str::from_utf8(buf) {
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                let entry = LogEntry::parse(line);

                if let Some(file) = &self.file {
                    if let Ok(mut file) = file.lock() {
                        writeln!(file, "{}", entry.format_for_display())?;
                    }
                }
                self.buffer.push(entry);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.file {
            Some(file) => match file.lock() {
                Ok(mut file) => file.flush(),
                Err(_) => Ok(()),
            },
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RingBufferWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn open_log_file() -> Result<(File, PathBuf)> {
    let log_dir = AppPaths::log_dir()?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("vgrid_{}.log", timestamp));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    Ok((file, log_path))
}

/// Initialize tracing with the ring buffer writer, plus file and stderr
/// output when enabled. `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<LogRingBuffer> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let buffer = LOG_BUFFER
        .get_or_init(|| LogRingBuffer::with_capacity(config.capture_capacity))
        .clone();

    let mut writer = RingBufferWriter::new(buffer.clone());
    let mut log_path = None;
    if config.log_to_file {
        let (file, path) = open_log_file()?;
        writer = writer.with_file(file);
        log_path = Some(path);
    }

    let buffer_layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .without_time()
        .compact();

    let stderr_layer = config
        .log_to_stderr
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(true));

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(buffer_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize tracing: {}", e))?;

    match log_path {
        Some(path) => tracing::info!(target: "system", "Logging to {}", path.display()),
        None => tracing::info!(target: "system", "Tracing initialized"),
    }

    Ok(buffer)
}
