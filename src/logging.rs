//! Logger handles passed to components at construction.
//!
//! Components never call the `log` macros directly. Each one holds a
//! [`Logger`], which by default forwards to whatever backend the process
//! installed (`env_logger` in the `ipfilter` binary). Tests hand in
//! [`Logger::silent`] or a [`MemoryLog`] instead.

use log::{Level, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Cheaply cloneable logging capability.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Log>,
    target: &'static str,
}

impl Logger {
    /// Wrap any `log::Log` implementation.
    pub fn new(sink: Arc<dyn Log>, target: &'static str) -> Self {
        Self { sink, target }
    }

    /// Forward to the process-wide `log` backend.
    pub fn global(target: &'static str) -> Self {
        Self::new(Arc::new(GlobalSink), target)
    }

    /// Drop every record.
    pub fn silent() -> Self {
        Self::new(Arc::new(SilentSink), "ipfilter")
    }

    /// The target attached to every record.
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Emit one record at `level`, skipped when the sink has it disabled.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder()
            .level(level)
            .target(self.target)
            .build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .module_path_static(Some(module_path!()))
                .build(),
        );
    }

    /// Log at error level.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    /// Log at warn level.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    /// Log at info level.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    /// Log at debug level.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::global("ipfilter")
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("target", &self.target).finish()
    }
}

struct GlobalSink;

impl Log for GlobalSink {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        log::logger().log(record);
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

struct SilentSink;

impl Log for SilentSink {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        false
    }

    fn log(&self, _record: &Record<'_>) {}

    fn flush(&self) {}
}

/// In-memory `log::Log` that keeps every record it receives.
#[derive(Default)]
pub struct MemoryLog {
    records: Mutex<Vec<(Level, String)>>,
}

impl MemoryLog {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded `(level, message)` pairs, oldest first.
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().clone()
    }

    /// Messages recorded at exactly `level`.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Forget every recorded message.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Log for MemoryLog {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records
            .lock()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}
