//! Host logger abstraction
//!
//! The debug connection reports through a [`MailLogger`] rather than straight
//! to `tracing`, so an application can route mail traffic to its own log and
//! so tests can read back what was logged.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Log priority, most severe first (syslog order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	Emergency,
	Alert,
	Critical,
	Error,
	Warning,
	Notice,
	Info,
	Debug,
}

impl Priority {
	/// Whether a logger at this level lets a message of `priority` through
	///
	/// # Examples
	///
	/// ```
	/// use envoi_mail::Priority;
	///
	/// assert!(Priority::Info.enables(Priority::Error));
	/// assert!(!Priority::Info.enables(Priority::Debug));
	/// ```
	pub fn enables(self, priority: Priority) -> bool {
		priority <= self
	}
}

/// Logger supplied by the host application
pub trait MailLogger: Send + Sync {
	/// Current level; messages less severe than it are dropped
	fn level(&self) -> Priority;

	fn set_level(&self, level: Priority);

	fn log(&self, message: &str, priority: Priority);
}

/// Forwards to `tracing` events, filtered by its own level first
pub struct TracingLogger {
	level: RwLock<Priority>,
}

impl TracingLogger {
	pub fn new(level: Priority) -> Self {
		Self {
			level: RwLock::new(level),
		}
	}
}

impl Default for TracingLogger {
	fn default() -> Self {
		Self::new(Priority::Info)
	}
}

impl MailLogger for TracingLogger {
	fn level(&self) -> Priority {
		*self.level.read()
	}

	fn set_level(&self, level: Priority) {
		*self.level.write() = level;
	}

	fn log(&self, message: &str, priority: Priority) {
		if !self.level().enables(priority) {
			return;
		}

		match priority {
			Priority::Emergency | Priority::Alert | Priority::Critical | Priority::Error => {
				tracing::error!(target: "envoi_mail", ?priority, "{}", message)
			}
			Priority::Warning => tracing::warn!(target: "envoi_mail", "{}", message),
			Priority::Notice | Priority::Info => tracing::info!(target: "envoi_mail", "{}", message),
			Priority::Debug => tracing::debug!(target: "envoi_mail", "{}", message),
		}
	}
}

/// A logged line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
	pub priority: Priority,
	pub message: String,
}

/// Keeps every accepted line in memory
///
/// # Examples
///
/// ```
/// use envoi_mail::{MailLogger, Priority, RecordingLogger};
///
/// let logger = RecordingLogger::new(Priority::Info);
/// logger.log("kept", Priority::Info);
/// logger.log("dropped", Priority::Debug);
/// assert_eq!(logger.messages(), vec!["kept".to_string()]);
/// ```
pub struct RecordingLogger {
	level: RwLock<Priority>,
	entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
	pub fn new(level: Priority) -> Self {
		Self {
			level: RwLock::new(level),
			entries: Mutex::new(Vec::new()),
		}
	}

	pub fn entries(&self) -> Vec<LogEntry> {
		self.entries.lock().clone()
	}

	pub fn messages(&self) -> Vec<String> {
		self.entries
			.lock()
			.iter()
			.map(|entry| entry.message.clone())
			.collect()
	}

	pub fn clear(&self) {
		self.entries.lock().clear();
	}
}

impl Default for RecordingLogger {
	fn default() -> Self {
		Self::new(Priority::Debug)
	}
}

impl MailLogger for RecordingLogger {
	fn level(&self) -> Priority {
		*self.level.read()
	}

	fn set_level(&self, level: Priority) {
		*self.level.write() = level;
	}

	fn log(&self, message: &str, priority: Priority) {
		if !self.level().enables(priority) {
			return;
		}
		self.entries.lock().push(LogEntry {
			priority,
			message: message.to_string(),
		});
	}
}
