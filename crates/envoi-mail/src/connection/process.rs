//! Local sendmail binary
//!
//! Used by the `sendmail` and `native` connection types. The message is
//! written to the standard input of the binary, envelope recipients are given
//! on the command line.

use super::Connection;
use crate::{MailError, MailResult};
use async_trait::async_trait;
use lettre::address::Envelope;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const DEFAULT_SENDMAIL_COMMAND: &str = "/usr/sbin/sendmail";

/// Modes that ignore the message on stdin or the recipients on the command line
const UNSUPPORTED_FLAGS: &[&str] = &["-bs", "-t"];

/// Command line arguments: one whitespace separated string or a list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Arguments {
	Line(String),
	List(Vec<String>),
}

impl Arguments {
	pub fn to_vec(&self) -> Vec<String> {
		match self {
			Arguments::Line(line) => line.split_whitespace().map(str::to_string).collect(),
			Arguments::List(list) => list.clone(),
		}
	}
}

/// Parameters of the `sendmail` connection type
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SendmailParams {
	/// Binary, optionally followed by arguments
	pub command: Option<String>,
	pub flags: Option<Arguments>,
	/// Seconds allowed for a whole delivery
	pub timeout: Option<u64>,
}

/// Parameters of the `native` connection type
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NativeParams {
	pub additional_params: Option<Arguments>,
}

/// Pipes messages to a sendmail compatible binary
pub struct SendmailConnection {
	kind: &'static str,
	program: String,
	arguments: Vec<String>,
	timeout: Option<Duration>,
	alive: bool,
}

fn check_arguments(arguments: &[String]) -> MailResult<()> {
	match arguments
		.iter()
		.find(|argument| UNSUPPORTED_FLAGS.contains(&argument.as_str()))
	{
		Some(flag) => Err(MailError::InvalidOption(format!(
			"sendmail flag {} is not supported, the message is piped with recipients as arguments",
			flag
		))),
		None => Ok(()),
	}
}

impl SendmailConnection {
	/// Fails on `-bs` and `-t`
	pub fn new(params: SendmailParams) -> MailResult<Self> {
		let command = params
			.command
			.filter(|command| !command.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_SENDMAIL_COMMAND.to_string());
		let mut parts = command.split_whitespace().map(str::to_string);
		let program = parts
			.next()
			.unwrap_or_else(|| DEFAULT_SENDMAIL_COMMAND.to_string());
		let mut arguments: Vec<String> = parts.collect();
		if let Some(flags) = &params.flags {
			arguments.extend(flags.to_vec());
		}
		check_arguments(&arguments)?;

		Ok(Self {
			kind: "sendmail",
			program,
			arguments,
			timeout: params.timeout.map(Duration::from_secs),
			alive: false,
		})
	}

	/// The system mailer with extra arguments
	pub fn native(params: NativeParams) -> MailResult<Self> {
		let arguments = params
			.additional_params
			.map(|params| params.to_vec())
			.unwrap_or_default();
		check_arguments(&arguments)?;

		Ok(Self {
			kind: "native",
			program: DEFAULT_SENDMAIL_COMMAND.to_string(),
			arguments,
			timeout: None,
			alive: false,
		})
	}

	pub fn program(&self) -> &str {
		&self.program
	}

	pub fn arguments(&self) -> &[String] {
		&self.arguments
	}

	/// Full argument list for one delivery
	pub fn command_line(&self, envelope: &Envelope) -> Vec<String> {
		let mut line = self.arguments.clone();
		line.push("-i".to_string());
		if let Some(sender) = envelope.from() {
			line.push("-f".to_string());
			line.push(sender.to_string());
		}
		line.push("--".to_string());
		line.extend(envelope.to().iter().map(|recipient| recipient.to_string()));
		line
	}

	async fn run(&self, envelope: &Envelope, message: &[u8]) -> MailResult<std::process::Output> {
		let mut child = Command::new(&self.program)
			.args(self.command_line(envelope))
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| MailError::Sendmail(format!("{}: {}", self.program, e)))?;

		let written = match child.stdin.take() {
			Some(mut stdin) => match stdin.write_all(message).await {
				Ok(()) => stdin.shutdown().await,
				Err(e) => Err(e),
			},
			None => Ok(()),
		};

		let output = child.wait_with_output().await?;
		match written {
			// The exit status explains a broken pipe better than the pipe itself
			Err(e) if output.status.success() => Err(e.into()),
			_ => Ok(output),
		}
	}
}

#[async_trait]
impl Connection for SendmailConnection {
	fn name(&self) -> &'static str {
		self.kind
	}

	async fn start(&mut self) -> MailResult<()> {
		let program = Path::new(&self.program);
		if program.is_absolute() && !program.is_file() {
			return Err(MailError::Sendmail(format!("{} not found", self.program)));
		}

		tracing::debug!(connection = self.kind, program = %self.program, "Mail connection started");
		self.alive = true;
		Ok(())
	}

	async fn send_raw(&mut self, envelope: &Envelope, message: &[u8]) -> MailResult<usize> {
		let output = match self.timeout {
			Some(timeout) => tokio::time::timeout(timeout, self.run(envelope, message))
				.await
				.map_err(|_| {
					MailError::Sendmail(format!(
						"{} timed out after {}s",
						self.program,
						timeout.as_secs()
					))
				})??,
			None => self.run(envelope, message).await?,
		};

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(MailError::Sendmail(format!(
				"{} exited with {}: {}",
				self.program,
				output.status,
				stderr.trim()
			)));
		}

		Ok(envelope.to().len())
	}

	async fn stop(&mut self) -> MailResult<()> {
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
	use lettre::Address;
	use rstest::rstest;

	fn envelope() -> Envelope {
		let from: Address = "from@example.com".parse().unwrap();
		let to: Address = "to@example.com".parse().unwrap();
		Envelope::new(Some(from), vec![to]).unwrap()
	}

	#[rstest]
	fn test_command_line() {
		// Arrange
		let connection = SendmailConnection::new(SendmailParams {
			command: Some("/usr/sbin/sendmail -oi".to_string()),
			flags: Some(Arguments::Line("-odb -v".to_string())),
			timeout: None,
		})
		.unwrap();

		// Act
		let line = connection.command_line(&envelope());

		// Assert
		assert_eq!(connection.program(), "/usr/sbin/sendmail");
		assert_eq!(
			line,
			vec![
				"-oi",
				"-odb",
				"-v",
				"-i",
				"-f",
				"from@example.com",
				"--",
				"to@example.com"
			]
		);
	}

	#[rstest]
	fn test_native_uses_additional_params() {
		// Act
		let connection = SendmailConnection::native(NativeParams {
			additional_params: Some(Arguments::List(vec!["-fbounce@example.com".to_string()])),
		})
		.unwrap();

		// Assert
		assert_eq!(connection.name(), "native");
		assert_eq!(connection.program(), DEFAULT_SENDMAIL_COMMAND);
		assert_eq!(connection.arguments(), ["-fbounce@example.com".to_string()]);
	}

	#[rstest]
	#[case(Some("/usr/sbin/sendmail -bs"), None)]
	#[case(Some("/usr/sbin/sendmail"), Some(Arguments::Line("-oi -t".to_string())))]
	#[case(None, Some(Arguments::List(vec!["-bs".to_string()])))]
	fn test_rejects_stdio_smtp_and_header_recipients(
		#[case] command: Option<&str>,
		#[case] flags: Option<Arguments>,
	) {
		// Act
		let result = SendmailConnection::new(SendmailParams {
			command: command.map(str::to_string),
			flags,
			timeout: None,
		});

		// Assert
		assert!(matches!(result, Err(MailError::InvalidOption(msg)) if msg.contains("not supported")));
	}

	#[rstest]
	fn test_native_rejects_header_recipients() {
		// Act
		let result = SendmailConnection::native(NativeParams {
			additional_params: Some(Arguments::Line("-t".to_string())),
		});

		// Assert
		assert!(matches!(result, Err(MailError::InvalidOption(_))));
	}

	#[rstest]
	#[tokio::test]
	async fn test_start_fails_for_missing_binary() {
		// Arrange
		let mut connection = SendmailConnection::new(SendmailParams {
			command: Some("/nonexistent/sendmail".to_string()),
			..Default::default()
		})
		.unwrap();

		// Act
		let result = connection.start().await;

		// Assert
		assert!(matches!(result, Err(MailError::Sendmail(_))));
		assert!(!connection.is_alive());
	}

	#[cfg(unix)]
	mod unix {
		use super::*;
		use tempfile::TempDir;

		fn script(dir: &TempDir, body: &str) -> String {
			let path = dir.path().join("sendmail.sh");
			std::fs::write(&path, body).unwrap();
			format!("/bin/sh {}", path.display())
		}

		#[rstest]
		#[tokio::test]
		async fn test_pipes_message_and_arguments() {
			// Arrange
			let dir = TempDir::with_prefix("envoi_sendmail_").unwrap();
			let out = dir.path().join("out.txt");
			let command = script(
				&dir,
				&format!("echo \"$@\" > {out}\ncat >> {out}\n", out = out.display()),
			);
			let mut connection = SendmailConnection::new(SendmailParams {
				command: Some(command),
				..Default::default()
			})
			.unwrap();

			// Act
			connection.start().await.unwrap();
			let accepted = connection
				.send_raw(&envelope(), b"Subject: Hi\r\n\r\nBody\r\n")
				.await
				.unwrap();
			connection.stop().await.unwrap();

			// Assert
			assert_eq!(accepted, 1);
			let written = std::fs::read_to_string(&out).unwrap();
			assert!(written.starts_with("-i -f from@example.com -- to@example.com\n"));
			assert!(written.ends_with("Subject: Hi\r\n\r\nBody\r\n"));
		}

		#[rstest]
		#[tokio::test]
		async fn test_non_zero_exit() {
			// Arrange
			let dir = TempDir::with_prefix("envoi_sendmail_").unwrap();
			let command = script(&dir, "cat > /dev/null\necho 'no such user' >&2\nexit 67\n");
			let mut connection = SendmailConnection::new(SendmailParams {
				command: Some(command),
				..Default::default()
			})
			.unwrap();

			// Act
			let result = connection.send_raw(&envelope(), b"Body").await;

			// Assert
			assert!(matches!(result, Err(MailError::Sendmail(msg)) if msg.contains("no such user")));
		}

		#[rstest]
		#[tokio::test]
		async fn test_exit_without_reading_stdin() {
			// Arrange
			let dir = TempDir::with_prefix("envoi_sendmail_").unwrap();
			let command = script(&dir, "echo 'sendmail: illegal option' >&2\nexit 64\n");
			let mut connection = SendmailConnection::new(SendmailParams {
				command: Some(command),
				..Default::default()
			})
			.unwrap();
			let message = vec![b'x'; 4 * 1024 * 1024];

			// Act
			let result = connection.send_raw(&envelope(), &message).await;

			// Assert
			assert!(matches!(
				result,
				Err(MailError::Sendmail(msg)) if msg.contains("illegal option")
			));
		}

		#[rstest]
		#[tokio::test]
		async fn test_timeout() {
			// Arrange
			let dir = TempDir::with_prefix("envoi_sendmail_").unwrap();
			let command = script(&dir, "cat > /dev/null\nsleep 5\n");
			let mut connection = SendmailConnection::new(SendmailParams {
				command: Some(command),
				flags: None,
				timeout: Some(1),
			})
			.unwrap();

			// Act
			let result = connection.send_raw(&envelope(), b"Body").await;

			// Assert
			assert!(matches!(result, Err(MailError::Sendmail(msg)) if msg.contains("timed out")));
		}
	}
}
