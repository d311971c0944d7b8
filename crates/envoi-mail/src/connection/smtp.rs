//! SMTP connection over lettre's async transport

use super::Connection;
use crate::{MailError, MailResult};
use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Transport security of an SMTP connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Encryption {
	/// Implicit TLS
	Ssl,
	/// STARTTLS
	Tls,
	#[default]
	Off,
}

impl FromStr for Encryption {
	type Err = MailError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"SSL" => Ok(Encryption::Ssl),
			"TLS" => Ok(Encryption::Tls),
			"OFF" | "" => Ok(Encryption::Off),
			other => Err(MailError::InvalidOption(format!(
				"encryption \"{}\" (expected SSL, TLS or OFF)",
				other
			))),
		}
	}
}

impl TryFrom<String> for Encryption {
	type Error = MailError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Authentication {
	pub username: String,
	pub password: String,
}

/// Parameters of the `smtp` connection type
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmtpParams {
	pub server: Option<String>,
	pub port: Option<u16>,
	pub encryption: Encryption,
	pub authentication: Option<Authentication>,
	/// Seconds
	pub timeout: Option<u64>,
}

/// Delivers through an SMTP server
///
/// # Examples
///
/// ```
/// use envoi_mail::connection::smtp::{Encryption, SmtpConnection, SmtpParams};
///
/// let connection = SmtpConnection::new(SmtpParams {
///     server: Some("smtp.example.com".to_string()),
///     port: Some(587),
///     encryption: Encryption::Tls,
///     ..Default::default()
/// })
/// .unwrap();
/// assert_eq!(connection.server(), "smtp.example.com");
/// ```
pub struct SmtpConnection {
	server: String,
	port: Option<u16>,
	encryption: Encryption,
	credentials: Option<Credentials>,
	timeout: Option<Duration>,
	transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpConnection {
	pub fn new(params: SmtpParams) -> MailResult<Self> {
		let server = params
			.server
			.filter(|server| !server.trim().is_empty())
			.ok_or_else(|| MailError::MissingOption("server".to_string()))?;

		Ok(Self {
			server,
			port: params.port,
			encryption: params.encryption,
			credentials: params
				.authentication
				.map(|auth| Credentials::new(auth.username, auth.password)),
			timeout: params.timeout.map(Duration::from_secs),
			transport: None,
		})
	}

	pub fn server(&self) -> &str {
		&self.server
	}

	pub fn encryption(&self) -> Encryption {
		self.encryption
	}

	fn build_transport(&self) -> MailResult<AsyncSmtpTransport<Tokio1Executor>> {
		let mut builder = match self.encryption {
			Encryption::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.server)?,
			Encryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.server)?,
			Encryption::Off => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.server),
		};

		if let Some(port) = self.port {
			builder = builder.port(port);
		}
		if let Some(credentials) = &self.credentials {
			builder = builder.credentials(credentials.clone());
		}
		if self.timeout.is_some() {
			builder = builder.timeout(self.timeout);
		}

		Ok(builder.build())
	}
}

#[async_trait]
impl Connection for SmtpConnection {
	fn name(&self) -> &'static str {
		"smtp"
	}

	async fn start(&mut self) -> MailResult<()> {
		let transport = self.build_transport()?;
		if !transport.test_connection().await? {
			return Err(MailError::Connection(format!(
				"SMTP server {} did not answer",
				self.server
			)));
		}

		tracing::debug!(server = %self.server, encryption = ?self.encryption, "SMTP connection started");
		self.transport = Some(transport);
		Ok(())
	}

	async fn send_raw(&mut self, envelope: &Envelope, message: &[u8]) -> MailResult<usize> {
		let transport = self
			.transport
			.as_ref()
			.ok_or_else(|| MailError::Connection("SMTP connection is not started".to_string()))?;

		let response = transport.send_raw(envelope, message).await?;
		tracing::debug!(server = %self.server, code = %response.code(), "SMTP server accepted message");

		Ok(envelope.to().len())
	}

	async fn stop(&mut self) -> MailResult<()> {
		self.transport = None;
		Ok(())
	}

	fn is_alive(&self) -> bool {
		self.transport.is_some()
	}
}
