//! Debug connection
//!
//! Plays an SMTP dialogue against canned replies and writes every command to
//! the host logger. Nothing leaves the process.

use super::Connection;
use crate::logging::{MailLogger, Priority};
use crate::{MailError, MailResult};
use async_trait::async_trait;
use lettre::address::Envelope;
use serde::Deserialize;
use std::sync::Arc;

const LOG_PREFIX: &str = "{envoi} ";
const CRLF: &str = "\r\n";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DebugParams {
	pub log_level: Option<Priority>,
	pub requires_ehlo: bool,
}

/// Connection that simulates an SMTP server
///
/// # Examples
///
/// ```
/// use envoi_mail::{DebugConnection, Priority, RecordingLogger};
/// use std::sync::Arc;
///
/// let logger = Arc::new(RecordingLogger::new(Priority::Debug));
/// let mut connection = DebugConnection::new(logger.clone());
///
/// assert_eq!(connection.read(), "220 Greetings");
/// connection.write("EHLO localhost", "\r\n");
/// assert_eq!(connection.read(), "250 hello");
/// assert_eq!(connection.history(), "EHLO localhost\r\n");
/// assert_eq!(logger.messages()[1], "{envoi} WRITE EHLO localhost");
/// ```
pub struct DebugConnection {
	alive: bool,
	logger: Arc<dyn MailLogger>,
	log_level: Priority,
	request: Option<String>,
	history: String,
	requires_ehlo: bool,
}

impl DebugConnection {
	/// The logger's current level becomes the level forced while logging
	pub fn new(logger: Arc<dyn MailLogger>) -> Self {
		let log_level = logger.level();
		Self {
			alive: false,
			logger,
			log_level,
			request: None,
			history: String::new(),
			requires_ehlo: false,
		}
	}

	pub fn with_requires_ehlo(mut self, requires_ehlo: bool) -> Self {
		self.requires_ehlo = requires_ehlo;
		self
	}

	pub fn set_logger(&mut self, logger: Arc<dyn MailLogger>) {
		self.logger = logger;
	}

	pub fn set_log_level(&mut self, level: Priority) {
		self.log_level = level;
	}

	pub fn log_level(&self) -> Priority {
		self.log_level
	}

	/// Every command written so far, line endings included
	pub fn history(&self) -> &str {
		&self.history
	}

	/// Reply of the fake server to the last command
	pub fn read(&mut self) -> &'static str {
		self.do_log("READ", Priority::Debug);

		let verb = self
			.request
			.as_deref()
			.and_then(|command| command.split_whitespace().next())
			.map(str::to_lowercase);

		match verb.as_deref() {
			None => "220 Greetings",
			Some("helo") | Some("ehlo") => "250 hello",
			Some("mail") | Some("rcpt") | Some("rset") => "250 ok",
			Some("quit") => "221 bye",
			Some("data") => "354 go ahead",
			Some(_) => "250 ok",
		}
	}

	pub fn write(&mut self, command: &str, end: &str) {
		self.do_log(&format!("WRITE {}", command), Priority::Debug);

		self.history.push_str(command);
		self.history.push_str(end);
		self.request = Some(command.to_string());
	}

	fn do_log(&self, message: &str, priority: Priority) {
		let previous = self.logger.level();
		if previous != self.log_level {
			self.logger.set_level(self.log_level);
		}

		self.logger.log(&format!("{}{}", LOG_PREFIX, message), priority);

		if previous != self.log_level {
			self.logger.set_level(previous);
		}
	}

	fn expect_reply(&mut self, code: u16) -> MailResult<&'static str> {
		let reply = self.read();
		if reply_code(reply) == Some(code) {
			Ok(reply)
		} else {
			Err(MailError::Smtp(format!(
				"Expected response code {} but got: {}",
				code, reply
			)))
		}
	}

	fn command(&mut self, command: &str, code: u16) -> MailResult<&'static str> {
		self.write(command, CRLF);
		self.expect_reply(code)
	}
}

fn reply_code(reply: &str) -> Option<u16> {
	reply.split_whitespace().next()?.parse().ok()
}

#[async_trait]
impl Connection for DebugConnection {
	fn name(&self) -> &'static str {
		"debug"
	}

	async fn start(&mut self) -> MailResult<()> {
		self.do_log("OPEN debug connection.", Priority::Debug);
		self.request = None;
		self.alive = true;
		Ok(())
	}

	async fn send_raw(&mut self, envelope: &Envelope, message: &[u8]) -> MailResult<usize> {
		if !self.alive {
			return Err(MailError::Connection(
				"debug connection is not started".to_string(),
			));
		}

		self.expect_reply(220)?;
		let greeting = if self.requires_ehlo { "EHLO" } else { "HELO" };
		self.command(&format!("{} localhost", greeting), 250)?;

		let sender = envelope
			.from()
			.map(|address| address.to_string())
			.unwrap_or_default();
		self.command(&format!("MAIL FROM:<{}>", sender), 250)?;

		let mut accepted = 0;
		for recipient in envelope.to() {
			self.write(&format!("RCPT TO:<{}>", recipient), CRLF);
			if reply_code(self.read()) == Some(250) {
				accepted += 1;
			}
		}

		self.command("DATA", 354)?;
		self.write(String::from_utf8_lossy(message).trim_end_matches(CRLF), CRLF);
		self.command(".", 250)?;
		self.command("QUIT", 221)?;

		Ok(accepted)
	}

	async fn stop(&mut self) -> MailResult<()> {
		self.do_log("CLOSE debug connection.", Priority::Debug);
		let history = self.history.clone();
		self.do_log(&history, Priority::Info);
		self.alive = false;
		Ok(())
	}

	fn is_alive(&self) -> bool {
		self.alive
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::logging::{LogEntry, RecordingLogger};
	use lettre::Address;
	use rstest::rstest;

	fn envelope(recipients: &[&str]) -> Envelope {
		let from: Address = "from@example.com".parse().unwrap();
		let to = recipients.iter().map(|r| r.parse().unwrap()).collect();
		Envelope::new(Some(from), to).unwrap()
	}

	#[rstest]
	#[case(None, "220 Greetings")]
	#[case(Some("HELO localhost"), "250 hello")]
	#[case(Some("ehlo localhost"), "250 hello")]
	#[case(Some("MAIL FROM:<a@example.com>"), "250 ok")]
	#[case(Some("RCPT TO:<b@example.com>"), "250 ok")]
	#[case(Some("RSET"), "250 ok")]
	#[case(Some("DATA"), "354 go ahead")]
	#[case(Some("QUIT"), "221 bye")]
	#[case(Some("NOOP"), "250 ok")]
	fn test_read_replies(#[case] last: Option<&str>, #[case] expected: &str) {
		// Arrange
		let mut connection = DebugConnection::new(Arc::new(RecordingLogger::default()));
		if let Some(command) = last {
			connection.write(command, CRLF);
		}

		// Act / Assert
		assert_eq!(connection.read(), expected);
	}

	#[rstest]
	#[tokio::test]
	async fn test_dialogue_and_history() {
		// Arrange
		let logger = Arc::new(RecordingLogger::new(Priority::Debug));
		let mut connection = DebugConnection::new(logger.clone()).with_requires_ehlo(true);

		// Act
		connection.start().await.unwrap();
		let accepted = connection
			.send_raw(&envelope(&["a@example.com", "b@example.com"]), b"Subject: Hi\r\n\r\nBody\r\n")
			.await
			.unwrap();
		connection.stop().await.unwrap();

		// Assert
		assert_eq!(accepted, 2);
		assert!(!connection.is_alive());
		assert_eq!(
			connection.history(),
			"EHLO localhost\r\n\
			 MAIL FROM:<from@example.com>\r\n\
			 RCPT TO:<a@example.com>\r\n\
			 RCPT TO:<b@example.com>\r\n\
			 DATA\r\n\
			 Subject: Hi\r\n\r\nBody\r\n\
			 .\r\n\
			 QUIT\r\n"
		);
		let entries = logger.entries();
		assert_eq!(entries[0].message, "{envoi} OPEN debug connection.");
		assert!(entries.iter().all(|e| e.message.starts_with(LOG_PREFIX)));
		assert_eq!(
			entries.last().unwrap(),
			&LogEntry {
				priority: Priority::Info,
				message: format!("{}{}", LOG_PREFIX, connection.history()),
			}
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_helo_without_requires_ehlo() {
		// Arrange
		let mut connection = DebugConnection::new(Arc::new(RecordingLogger::default()));

		// Act
		connection.start().await.unwrap();
		connection
			.send_raw(&envelope(&["a@example.com"]), b"Body")
			.await
			.unwrap();

		// Assert
		assert!(connection.history().starts_with("HELO localhost\r\n"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_send_before_start() {
		// Arrange
		let mut connection = DebugConnection::new(Arc::new(RecordingLogger::default()));

		// Act
		let result = connection.send_raw(&envelope(&["a@example.com"]), b"Body").await;

		// Assert
		assert!(matches!(result, Err(MailError::Connection(_))));
	}

	#[rstest]
	fn test_forced_level_is_applied_and_restored() {
		// Arrange
		let logger = Arc::new(RecordingLogger::new(Priority::Info));
		let mut connection = DebugConnection::new(logger.clone());
		connection.set_log_level(Priority::Debug);

		// Act
		connection.write("NOOP", CRLF);

		// Assert
		assert_eq!(logger.level(), Priority::Info);
		assert_eq!(logger.messages(), vec!["{envoi} WRITE NOOP".to_string()]);
	}

	#[rstest]
	fn test_default_forced_level_drops_debug_lines() {
		// Arrange
		let logger = Arc::new(RecordingLogger::new(Priority::Info));
		let mut connection = DebugConnection::new(logger.clone());

		// Act
		connection.write("NOOP", CRLF);

		// Assert
		assert_eq!(connection.log_level(), Priority::Info);
		assert!(logger.messages().is_empty());
	}

	#[rstest]
	fn test_set_logger_replaces_target() {
		// Arrange
		let first = Arc::new(RecordingLogger::default());
		let second = Arc::new(RecordingLogger::default());
		let mut connection = DebugConnection::new(first.clone());

		// Act
		connection.set_logger(second.clone());
		connection.write("NOOP", CRLF);

		// Assert
		assert!(first.messages().is_empty());
		assert_eq!(second.messages().len(), 1);
	}
}
