//! Failover and rotating composites

use super::Connection;
use crate::options::ConnectionOptions;
use crate::{MailError, MailResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use lettre::address::Envelope;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Parameters of the `multi` and `rotator` connection types
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MultiParams {
	/// Named children, tried in order
	pub connections: IndexMap<String, ConnectionOptions>,
	/// Applied to children that do not set it themselves
	pub requires_ehlo: Option<bool>,
}

/// Tries its connections in turn until one works
///
/// A failover composite always starts with its first connection. A rotating
/// composite starts one further along for each send drawing on the same
/// cursor.
pub struct MultiConnection {
	kind: &'static str,
	connections: Vec<(String, Box<dyn Connection>)>,
	order: Vec<usize>,
	position: Option<usize>,
}

impl MultiConnection {
	pub fn failover(connections: Vec<(String, Box<dyn Connection>)>) -> Self {
		Self::with_offset("multi", connections, 0)
	}

	/// Start at the connection the cursor points to, then advance it
	pub fn rotating(connections: Vec<(String, Box<dyn Connection>)>, cursor: &AtomicUsize) -> Self {
		let offset = cursor.fetch_add(1, Ordering::Relaxed);
		Self::with_offset("rotator", connections, offset)
	}

	fn with_offset(
		kind: &'static str,
		connections: Vec<(String, Box<dyn Connection>)>,
		offset: usize,
	) -> Self {
		let count = connections.len();
		let order = (0..count).map(|i| (offset + i) % count.max(1)).collect();

		Self {
			kind,
			connections,
			order,
			position: None,
		}
	}

	/// Name of the connection in use
	pub fn active(&self) -> Option<&str> {
		self.position
			.map(|position| self.connections[self.order[position]].0.as_str())
	}

	/// Start the first connection that accepts, from `from` on in order
	async fn start_from(&mut self, from: usize, mut last_error: Option<MailError>) -> MailResult<()> {
		for position in from..self.order.len() {
			let (name, connection) = &mut self.connections[self.order[position]];
			match connection.start().await {
				Ok(()) => {
					tracing::debug!(connection = self.kind, child = %name, "Mail connection started");
					self.position = Some(position);
					return Ok(());
				}
				Err(e) => {
					tracing::warn!(connection = self.kind, child = %name, error = %e, "Mail connection failed to start");
					last_error = Some(e);
				}
			}
		}

		self.position = None;
		Err(last_error.unwrap_or_else(|| {
			MailError::Connection(format!("{} connection has no usable connection", self.kind))
		}))
	}
}

#[async_trait]
impl Connection for MultiConnection {
	fn name(&self) -> &'static str {
		self.kind
	}

	async fn start(&mut self) -> MailResult<()> {
		self.start_from(0, None).await
	}

	async fn send_raw(&mut self, envelope: &Envelope, message: &[u8]) -> MailResult<usize> {
		loop {
			let position = self.position.ok_or_else(|| {
				MailError::Connection(format!("{} connection is not started", self.kind))
			})?;
			let (name, connection) = &mut self.connections[self.order[position]];

			let error = match connection.send_raw(envelope, message).await {
				Ok(accepted) => return Ok(accepted),
				Err(e) => e,
			};
			tracing::warn!(connection = self.kind, child = %name, error = %error, "Delivery failed, trying next connection");
			if let Err(stop_error) = connection.stop().await {
				tracing::debug!(child = %name, error = %stop_error, "Failed to stop mail connection");
			}

			self.start_from(position + 1, Some(error)).await?;
		}
	}

	async fn stop(&mut self) -> MailResult<()> {
		if let Some(position) = self.position.take() {
			self.connections[self.order[position]].1.stop().await?;
		}
		Ok(())
	}

	fn is_alive(&self) -> bool {
		self.position
			.map(|position| self.connections[self.order[position]].1.is_alive())
			.unwrap_or(false)
	}
}
