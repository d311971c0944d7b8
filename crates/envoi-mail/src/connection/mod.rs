//! Connections deliver assembled messages
//!
//! A [`Connection`] is built for every send from the `connection` option:
//! its `type` selects the implementation and `params` configure it.
//!
//! ```text
//! connection:
//!   type: multi
//!   params:
//!     connections:
//!       primary: { type: smtp, params: { server: smtp.example.com, encryption: TLS } }
//!       fallback: { type: sendmail }
//! ```

pub mod debug;
pub mod multi;
pub mod process;
pub mod smtp;

pub use debug::DebugConnection;
pub use multi::MultiConnection;
pub use process::SendmailConnection;
pub use smtp::SmtpConnection;

use crate::logging::{MailLogger, TracingLogger};
use crate::options::{ConnectionKind, ConnectionOptions};
use crate::{MailError, MailResult};
use async_trait::async_trait;
use lettre::address::Envelope;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

/// A transport able to deliver raw messages
#[async_trait]
pub trait Connection: Send + Sync {
	/// Connection type name, for logs
	fn name(&self) -> &'static str;

	async fn start(&mut self) -> MailResult<()>;

	/// Deliver `message` to the envelope recipients
	///
	/// Returns the number of recipients the transport accepted.
	async fn send_raw(&mut self, envelope: &Envelope, message: &[u8]) -> MailResult<usize>;

	async fn stop(&mut self) -> MailResult<()>;

	fn is_alive(&self) -> bool;
}

/// State shared by the connections a mailer builds
#[derive(Clone)]
pub struct ConnectionContext {
	/// Host logger handed to debug connections
	pub logger: Arc<dyn MailLogger>,
	/// Round robin cursor of rotator connections
	pub rotation: Arc<AtomicUsize>,
}

impl ConnectionContext {
	pub fn new(logger: Arc<dyn MailLogger>) -> Self {
		Self {
			logger,
			rotation: Arc::new(AtomicUsize::new(0)),
		}
	}
}

impl Default for ConnectionContext {
	fn default() -> Self {
		Self::new(Arc::new(TracingLogger::default()))
	}
}

/// Build the connection of type `kind`
///
/// # Examples
///
/// ```
/// use envoi_mail::ConnectionContext;
/// use envoi_mail::ConnectionKind;
/// use envoi_mail::connection::build;
/// use serde_json::Map;
///
/// let connection = build(ConnectionKind::Debug, &Map::new(), &ConnectionContext::default()).unwrap();
/// assert_eq!(connection.name(), "debug");
/// assert!(!connection.is_alive());
/// ```
pub fn build(
	kind: ConnectionKind,
	params: &Map<String, Value>,
	context: &ConnectionContext,
) -> MailResult<Box<dyn Connection>> {
	tracing::debug!(connection = %kind, "Building mail connection");

	let connection: Box<dyn Connection> = match kind {
		ConnectionKind::Native => Box::new(SendmailConnection::native(decode_params(kind, params)?)?),
		ConnectionKind::Sendmail => Box::new(SendmailConnection::new(decode_params(kind, params)?)?),
		ConnectionKind::Smtp => Box::new(SmtpConnection::new(decode_params(kind, params)?)?),
		ConnectionKind::Debug => {
			let params: debug::DebugParams = decode_params(kind, params)?;
			let mut connection = DebugConnection::new(context.logger.clone())
				.with_requires_ehlo(params.requires_ehlo);
			if let Some(level) = params.log_level {
				connection.set_log_level(level);
			}
			Box::new(connection)
		}
		ConnectionKind::Multi | ConnectionKind::Rotator => {
			let params: multi::MultiParams = decode_params(kind, params)?;
			let children = build_children(kind, params, context)?;
			if kind == ConnectionKind::Rotator {
				Box::new(MultiConnection::rotating(children, &context.rotation))
			} else {
				Box::new(MultiConnection::failover(children))
			}
		}
	};

	Ok(connection)
}

/// Build the connection described by a `connection` option
pub fn build_from_options(
	options: &ConnectionOptions,
	context: &ConnectionContext,
) -> MailResult<Box<dyn Connection>> {
	let kind = options.kind.ok_or(MailError::MissingConnectionType)?;
	build(kind, &options.params, context)
}

fn build_children(
	kind: ConnectionKind,
	params: multi::MultiParams,
	context: &ConnectionContext,
) -> MailResult<Vec<(String, Box<dyn Connection>)>> {
	if params.connections.is_empty() {
		return Err(MailError::InvalidOption(format!(
			"{} connection requires at least one entry in \"connections\"",
			kind
		)));
	}

	let mut children = Vec::with_capacity(params.connections.len());
	for (name, mut child) in params.connections {
		if let Some(requires_ehlo) = params.requires_ehlo {
			child
				.params
				.entry("requires_ehlo")
				.or_insert(Value::Bool(requires_ehlo));
		}
		let connection = build_from_options(&child, context).map_err(|e| match e {
			MailError::MissingConnectionType => {
				MailError::InvalidOption(format!("connection \"{}\" has no type", name))
			}
			other => other,
		})?;
		children.push((name, connection));
	}

	Ok(children)
}

/// Decode type specific parameters
pub fn decode_params<T: DeserializeOwned>(
	kind: ConnectionKind,
	params: &Map<String, Value>,
) -> MailResult<T> {
	serde_json::from_value(Value::Object(params.clone()))
		.map_err(|e| MailError::InvalidOption(format!("{} connection parameters: {}", kind, e)))
}
