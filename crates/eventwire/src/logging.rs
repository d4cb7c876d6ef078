//! Wire-level diagnostic logging.
//!
//! eventwire logs through the `tracing` crate. To see output, install a
//! subscriber in the application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("eventwire=debug")
//!     .init();
//! ```
//!
//! On top of whatever filter the subscriber applies, every client carries a
//! [`LogLevel`] that gates diagnostic output before it is even formatted. The
//! level can be changed at runtime through
//! [`EventClient::set_log_level`](crate::EventClient::set_log_level).
//!
//! The sink is pluggable: implement [`WireLogger`] and pass it to
//! [`EventClient::with_logger`](crate::EventClient::with_logger) to route
//! diagnostics somewhere other than `tracing`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::EventwireError;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Raw outbound envelopes and inbound frames.
    pub const WIRE: &str = "eventwire::wire";
    /// Connection lifecycle: connecting, retries, reconnects.
    pub const CONNECTION: &str = "eventwire::connection";
    /// Routing of inbound messages to pending exchanges.
    pub const DISPATCH: &str = "eventwire::dispatch";
}

/// Diagnostic verbosity, ordered `None < Errors < Info < Fine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum LogLevel {
    /// No diagnostic output.
    None = 0,
    /// Unroutable messages, undecodable frames and transport failures.
    #[default]
    Errors = 1,
    /// Connection lifecycle.
    Info = 2,
    /// Every payload written to or read from the wire.
    Fine = 3,
}

impl LogLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Errors,
            2 => Self::Info,
            _ => Self::Fine,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Errors => write!(f, "errors"),
            Self::Info => write!(f, "info"),
            Self::Fine => write!(f, "fine"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = EventwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "errors" | "error" => Ok(Self::Errors),
            "info" => Ok(Self::Info),
            "fine" => Ok(Self::Fine),
            other => Err(EventwireError::Config(format!("unknown log level '{other}'"))),
        }
    }
}

/// Subsystem a diagnostic line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// See [`targets::WIRE`].
    Wire,
    /// See [`targets::CONNECTION`].
    Connection,
    /// See [`targets::DISPATCH`].
    Dispatch,
}

impl LogTarget {
    /// The `tracing` target string for this subsystem.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wire => targets::WIRE,
            Self::Connection => targets::CONNECTION,
            Self::Dispatch => targets::DISPATCH,
        }
    }
}

/// A sink for diagnostic lines that already passed the level gate.
pub trait WireLogger: Send + Sync {
    /// Record one diagnostic line. `level` is never [`LogLevel::None`].
    fn log(&self, level: LogLevel, target: LogTarget, message: &str);
}

/// The default sink: forwards to `tracing` under the [`targets`] names.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingWireLogger;

macro_rules! emit {
    ($level:expr, $target:expr, $message:expr) => {
        match $level {
            LogLevel::None => {}
            LogLevel::Errors => tracing::error!(target: $target, "{}", $message),
            LogLevel::Info => tracing::info!(target: $target, "{}", $message),
            LogLevel::Fine => tracing::debug!(target: $target, "{}", $message),
        }
    };
}

impl WireLogger for TracingWireLogger {
    fn log(&self, level: LogLevel, target: LogTarget, message: &str) {
        // tracing needs a constant target per callsite.
        match target {
            LogTarget::Wire => emit!(level, targets::WIRE, message),
            LogTarget::Connection => emit!(level, targets::CONNECTION, message),
            LogTarget::Dispatch => emit!(level, targets::DISPATCH, message),
        }
    }
}

/// Level gate shared between the client handle and its connection driver.
#[derive(Clone)]
pub struct WireLog {
    level: Arc<AtomicU8>,
    sink: Arc<dyn WireLogger>,
}

impl WireLog {
    /// Create a gate at `level` writing to `sink`.
    pub fn new(level: LogLevel, sink: Arc<dyn WireLogger>) -> Self {
        Self {
            level: Arc::new(AtomicU8::new(level as u8)),
            sink,
        }
    }

    /// Create a gate at `level` writing to `tracing`.
    pub fn tracing(level: LogLevel) -> Self {
        Self::new(level, Arc::new(TracingWireLogger))
    }

    /// Current level.
    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Change the level for every clone of this gate.
    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Whether lines at `level` pass the gate.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level <= self.level()
    }

    /// Log at [`LogLevel::Errors`].
    pub fn error(&self, target: LogTarget, message: impl fmt::Display) {
        self.write(LogLevel::Errors, target, message);
    }

    /// Log at [`LogLevel::Info`].
    pub fn info(&self, target: LogTarget, message: impl fmt::Display) {
        self.write(LogLevel::Info, target, message);
    }

    /// Log at [`LogLevel::Fine`].
    pub fn fine(&self, target: LogTarget, message: impl fmt::Display) {
        self.write(LogLevel::Fine, target, message);
    }

    fn write(&self, level: LogLevel, target: LogTarget, message: impl fmt::Display) {
        if self.enabled(level) {
            self.sink.log(level, target, &message.to_string());
        }
    }
}

impl fmt::Debug for WireLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireLog").field("level", &self.level()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CapturingLogger;
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::None < LogLevel::Errors);
        assert!(LogLevel::Errors < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Fine);
        assert_eq!(LogLevel::default(), LogLevel::Errors);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("FINE".parse::<LogLevel>().unwrap(), LogLevel::Fine);
        assert_eq!(" info ".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("none".parse::<LogLevel>().unwrap(), LogLevel::None);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_gate() {
        let sink = Arc::new(CapturingLogger::default());
        let log = WireLog::new(LogLevel::Info, sink.clone());

        log.error(LogTarget::Dispatch, "dropped");
        log.info(LogTarget::Connection, "connected");
        log.fine(LogTarget::Wire, "{...}");
        assert_eq!(sink.lines.lock().len(), 2);

        // Clones share the level.
        let clone = log.clone();
        clone.set_level(LogLevel::None);
        log.error(LogTarget::Dispatch, "dropped");
        assert_eq!(sink.lines.lock().len(), 2);
        assert_eq!(log.level(), LogLevel::None);
    }
}
