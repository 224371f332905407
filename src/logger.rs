//! Leveled logger with lazily built messages.
//!
//! Connections never format a log line unless the level is enabled: callers
//! hand a closure to [`LoggerExt`] and the closure runs only after
//! [`Logger::enabled`] said yes.

use tracing::Level;

/// Sink for connection log lines. Shared by all connections of a server.
pub trait Logger: Send + Sync {
    /// Whether messages of `level` would be recorded.
    fn enabled(&self, level: Level) -> bool;

    /// Record an already built message.
    fn log(&self, level: Level, message: String);
}

/// Lazy logging helpers available on every [`Logger`].
pub trait LoggerExt: Logger {
    /// Log at `level`, building the message only when the level is enabled.
    #[inline]
    fn log_with<F>(&self, level: Level, build: F)
    where
        F: FnOnce() -> String,
    {
        if self.enabled(level) {
            self.log(level, build());
        }
    }

    #[inline]
    fn trace<F: FnOnce() -> String>(&self, build: F) {
        self.log_with(Level::TRACE, build);
    }

    #[inline]
    fn warn<F: FnOnce() -> String>(&self, build: F) {
        self.log_with(Level::WARN, build);
    }

    #[inline]
    fn error<F: FnOnce() -> String>(&self, build: F) {
        self.log_with(Level::ERROR, build);
    }
}

impl<L: Logger + ?Sized> LoggerExt for L {}

/// Forwards to the `tracing` subscriber installed by the application.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn enabled(&self, level: Level) -> bool {
        match level {
            Level::TRACE => tracing::enabled!(target: "wsconn", Level::TRACE),
            Level::DEBUG => tracing::enabled!(target: "wsconn", Level::DEBUG),
            Level::INFO => tracing::enabled!(target: "wsconn", Level::INFO),
            Level::WARN => tracing::enabled!(target: "wsconn", Level::WARN),
            Level::ERROR => tracing::enabled!(target: "wsconn", Level::ERROR),
        }
    }

    fn log(&self, level: Level, message: String) {
        match level {
            Level::TRACE => tracing::trace!(target: "wsconn", "{message}"),
            Level::DEBUG => tracing::debug!(target: "wsconn", "{message}"),
            Level::INFO => tracing::info!(target: "wsconn", "{message}"),
            Level::WARN => tracing::warn!(target: "wsconn", "{message}"),
            Level::ERROR => tracing::error!(target: "wsconn", "{message}"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn enabled(&self, _level: Level) -> bool {
        false
    }

    fn log(&self, _level: Level, _message: String) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every line so tests can assert on what was logged.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingLogger {
        lines: Mutex<Vec<(Level, String)>>,
    }

    impl RecordingLogger {
        pub(crate) fn lines_at(&self, level: Level) -> Vec<String> {
            self.lines
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    impl Logger for RecordingLogger {
        fn enabled(&self, _level: Level) -> bool {
            true
        }

        fn log(&self, level: Level, message: String) {
            self.lines.lock().unwrap().push((level, message));
        }
    }
}
