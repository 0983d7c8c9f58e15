use std::fmt;

/// Severity of a message a tool reports while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warning",
            LogLevel::Error => "error",
        })
    }
}

/// Where a tool invocation sends its progress messages.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Forwards tool messages to `tracing`, tagged with the tool and request.
pub struct TracingLogSink {
    tool: String,
    request_id: String,
}

impl TracingLogSink {
    pub fn new(tool: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            request_id: request_id.into(),
        }
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        let (tool, request_id) = (self.tool.as_str(), self.request_id.as_str());
        match level {
            LogLevel::Debug => tracing::debug!(tool, request_id, "{}", message),
            LogLevel::Info => tracing::info!(tool, request_id, "{}", message),
            LogLevel::Warn => tracing::warn!(tool, request_id, "{}", message),
            LogLevel::Error => tracing::error!(tool, request_id, "{}", message),
        }
    }
}
