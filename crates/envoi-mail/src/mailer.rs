//! Mail dispatch
//!
//! [`Mailer`] turns [`MailOptions`] into a MIME message and hands it to the
//! configured connection.

use crate::connection::{self, Connection, ConnectionContext};
use crate::i18n::{NoopTranslator, Translator, translate_formatted};
use crate::images::ImageResolver;
use crate::logging::MailLogger;
use crate::message::{
	BodyPart, DEFAULT_CHARSET, DEFAULT_CONTENT_TYPE, EmbeddedImage, MailAttachment, MimeNode,
	assemble, replace_embedded_images,
};
use crate::options::{BodySpec, Content, MailOptions, PartSpec, Recipients, parse_mailbox};
use crate::templates::{ContentRenderer, TemplateRegistry, render_view};
use crate::{MailError, MailResult};
use envoi_conf::MailerSettings;
use indexmap::IndexMap;
use lettre::Message;
use lettre::address::Envelope;
use lettre::message::{Mailbox, SinglePart};
use std::sync::Arc;

const DEFAULT_SUBJECT_TEMPLATE: &str = "%s";

/// A message ready for delivery
#[derive(Debug, Clone)]
pub struct ComposedMail {
	message: Message,
	envelope: Envelope,
	content_ids: IndexMap<String, String>,
}

impl ComposedMail {
	pub fn message(&self) -> &Message {
		&self.message
	}

	/// Envelope sender and recipients (to, cc and bcc)
	pub fn envelope(&self) -> &Envelope {
		&self.envelope
	}

	/// Content id of every embedded image, by image name
	pub fn content_ids(&self) -> &IndexMap<String, String> {
		&self.content_ids
	}

	/// RFC 5322 bytes of the message
	pub fn formatted(&self) -> Vec<u8> {
		self.message.formatted()
	}
}

/// Composes and sends mail
///
/// Clones share the rotation cursor of `rotator` connections.
///
/// # Examples
///
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use envoi_conf::MailerSettings;
/// use envoi_mail::{Mailer, MailOptions, PartSpec};
/// use serde_json::json;
///
/// let settings = MailerSettings::new()
///     .with_default("from", "noreply@example.com")
///     .with_default("connection", json!({ "type": "smtp", "params": { "server": "localhost" } }));
/// let mailer = Mailer::new(settings)?;
///
/// let options = MailOptions::new()
///     .with_cc("manager@example.com")
///     .with_part(PartSpec::html("<p>Your order has shipped.</p>"));
/// mailer
///     .send("Order shipped", "Your order has shipped.", "customer@example.com", options)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Mailer {
	settings: MailerSettings,
	renderer: Arc<dyn ContentRenderer>,
	translator: Arc<dyn Translator>,
	images: ImageResolver,
	context: ConnectionContext,
}

impl Mailer {
	/// Partials are loaded from `templates_dir` when it is set
	pub fn new(settings: MailerSettings) -> MailResult<Self> {
		let renderer: Arc<dyn ContentRenderer> = match &settings.templates_dir {
			Some(dir) => Arc::new(TemplateRegistry::from_dir(dir)?),
			None => Arc::new(TemplateRegistry::new()),
		};

		Ok(Self {
			images: ImageResolver::from_settings(&settings),
			settings,
			renderer,
			translator: Arc::new(NoopTranslator),
			context: ConnectionContext::default(),
		})
	}

	pub fn with_renderer(mut self, renderer: impl ContentRenderer + 'static) -> Self {
		self.renderer = Arc::new(renderer);
		self
	}

	pub fn with_translator(mut self, translator: impl Translator + 'static) -> Self {
		self.translator = Arc::new(translator);
		self
	}

	/// Logger handed to debug connections
	pub fn with_logger(mut self, logger: Arc<dyn MailLogger>) -> Self {
		self.context.logger = logger;
		self
	}

	pub fn settings(&self) -> &MailerSettings {
		&self.settings
	}

	/// Send `body` to `to`; other options come from `options` and the defaults
	pub async fn send(
		&self,
		subject: impl Into<String>,
		body: impl Into<BodySpec>,
		to: impl Into<Recipients>,
		options: MailOptions,
	) -> MailResult<usize> {
		let options = options.with_subject(subject).with_body(body).with_to(to);
		self.send_options(options).await
	}

	/// Send a mail described entirely by `options`
	///
	/// Returns the number of recipients the connection accepted.
	pub async fn send_options(&self, options: MailOptions) -> MailResult<usize> {
		let options = options.merged_over(&self.settings.defaults)?;

		let connection_options = options
			.connection
			.as_ref()
			.ok_or(MailError::MissingConnection)?;
		let mut connection = connection::build_from_options(connection_options, &self.context)?;

		let mail = self.compose_merged(options).await?;
		self.deliver(connection.as_mut(), &mail).await
	}

	/// Build the message without sending it
	pub async fn compose(&self, options: MailOptions) -> MailResult<ComposedMail> {
		let options = options.merged_over(&self.settings.defaults)?;
		self.compose_merged(options).await
	}

	async fn deliver(&self, connection: &mut dyn Connection, mail: &ComposedMail) -> MailResult<usize> {
		let result = match connection.start().await {
			Ok(()) => connection.send_raw(mail.envelope(), &mail.formatted()).await,
			Err(e) => Err(e),
		};

		if let Err(e) = connection.stop().await {
			tracing::warn!(connection = connection.name(), error = %e, "Failed to stop mail connection");
		}

		match &result {
			Ok(accepted) => {
				tracing::debug!(connection = connection.name(), accepted, "Mail sent")
			}
			Err(e) => {
				tracing::debug!(connection = connection.name(), error = %e, "Mail delivery failed")
			}
		}
		result
	}

	async fn compose_merged(&self, options: MailOptions) -> MailResult<ComposedMail> {
		let from = options
			.from
			.as_deref()
			.ok_or_else(|| MailError::MissingOption("from".to_string()))
			.and_then(parse_mailbox)?;
		let to = options
			.to
			.as_ref()
			.ok_or_else(|| MailError::MissingOption("to".to_string()))?
			.mailboxes()?;
		if to.is_empty() {
			return Err(MailError::MissingOption("to".to_string()));
		}

		let subject = options.subject.as_deref().ok_or(MailError::MissingSubject)?;
		let subject = translate_formatted(
			self.translator.as_ref(),
			subject,
			options
				.subject_template
				.as_deref()
				.unwrap_or(DEFAULT_SUBJECT_TEMPLATE),
			options
				.i18n_catalogue
				.as_deref()
				.unwrap_or(&self.settings.i18n_catalogue),
		);

		let mut images = Vec::new();
		let mut references = IndexMap::new();
		let mut content_ids = IndexMap::new();
		for (name, path) in options.embed_images.iter().flatten() {
			let image = EmbeddedImage::load(name.clone(), self.images.resolve(path).await).await?;
			references.insert(name.clone(), image.cid_reference());
			content_ids.insert(name.clone(), image.content_id().to_string());
			images.push(image.to_single_part()?);
		}

		let body = options.body.clone().ok_or(MailError::MissingBody)?;
		let mut bodies = vec![self.render_part(body.into_part(), &references)?];
		for part in options.parts.iter().flatten() {
			bodies.push(self.render_part(part.clone().into_part(), &references)?);
		}

		let mut attachments = Vec::new();
		for attachment in options.attachments.iter().flatten() {
			let attachment = MailAttachment::load(attachment.clone().into_options()).await?;
			attachments.push(attachment.to_single_part()?);
		}

		let cc = optional_mailboxes(options.cc.as_ref())?;
		let bcc = optional_mailboxes(options.bcc.as_ref())?;
		let reply_to = optional_mailboxes(options.reply_to.as_ref())?;

		let sender = match options.return_path.as_deref() {
			Some(return_path) => parse_mailbox(return_path)?.email,
			None => from.email.clone(),
		};
		let recipients = to
			.iter()
			.chain(&cc)
			.chain(&bcc)
			.map(|mailbox| mailbox.email.clone())
			.collect();
		let envelope = Envelope::new(Some(sender), recipients)?;

		let mut builder = Message::builder()
			.from(from)
			.subject(subject)
			.envelope(envelope.clone());
		for mailbox in to {
			builder = builder.to(mailbox);
		}
		for mailbox in cc {
			builder = builder.cc(mailbox);
		}
		for mailbox in bcc {
			builder = builder.bcc(mailbox);
		}
		for mailbox in reply_to {
			builder = builder.reply_to(mailbox);
		}

		let message = match assemble(bodies, images, attachments)? {
			MimeNode::Single(part) => builder.singlepart(part)?,
			MimeNode::Multi(part) => builder.multipart(part)?,
		};

		Ok(ComposedMail {
			message,
			envelope,
			content_ids,
		})
	}

	fn render_part(
		&self,
		part: PartSpec,
		references: &IndexMap<String, String>,
	) -> MailResult<SinglePart> {
		let content = match &part.content {
			Content::Text(text) => text.clone(),
			Content::View(view) => render_view(self.renderer.as_ref(), view)?,
		};

		BodyPart::new(
			replace_embedded_images(&content, references),
			part.content_type
				.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
		)
		.with_encoding(part.encoding)
		.with_charset(part.charset.unwrap_or_else(|| DEFAULT_CHARSET.to_string()))
		.to_single_part()
	}
}

fn optional_mailboxes(recipients: Option<&Recipients>) -> MailResult<Vec<Mailbox>> {
	recipients.map_or_else(|| Ok(Vec::new()), Recipients::mailboxes)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::options::{ConnectionKind, ConnectionOptions};
	use rstest::rstest;

	fn mailer() -> Mailer {
		Mailer::new(MailerSettings::new().with_default("from", "site@example.com")).unwrap()
	}

	#[rstest]
	#[tokio::test]
	async fn test_connection_is_checked_before_sender() {
		// Arrange
		let mailer = Mailer::new(MailerSettings::new()).unwrap();

		// Act
		let result = mailer.send_options(MailOptions::new()).await;

		// Assert
		assert!(matches!(result, Err(MailError::MissingConnection)));
	}

	#[rstest]
	#[tokio::test]
	async fn test_connection_type_required() {
		// Arrange
		let options = MailOptions::new().with_connection(ConnectionOptions::default());

		// Act
		let result = mailer().send_options(options).await;

		// Assert
		assert!(matches!(result, Err(MailError::MissingConnectionType)));
		assert_eq!(
			result.unwrap_err().to_string(),
			"Connection type undefined"
		);
	}

	#[rstest]
	#[case(MailOptions::new().with_to("a@example.com").with_body("x"), MailError::MissingSubject)]
	#[case(MailOptions::new().with_to("a@example.com").with_subject("x"), MailError::MissingBody)]
	#[tokio::test]
	async fn test_required_options(#[case] options: MailOptions, #[case] expected: MailError) {
		// Act
		let result = mailer().compose(options).await;

		// Assert
		assert_eq!(result.unwrap_err().to_string(), expected.to_string());
	}

	#[rstest]
	#[tokio::test]
	async fn test_missing_recipient() {
		// Act
		let result = mailer()
			.compose(MailOptions::new().with_subject("x").with_body("y"))
			.await;

		// Assert
		assert!(matches!(result, Err(MailError::MissingOption(key)) if key == "to"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_return_path_is_envelope_sender() {
		// Arrange
		let options = MailOptions::new()
			.with_subject("x")
			.with_body("y")
			.with_to("a@example.com")
			.with_bcc("hidden@example.com")
			.with_return_path("bounce@example.com");

		// Act
		let mail = mailer().compose(options).await.unwrap();

		// Assert
		assert_eq!(
			mail.envelope().from().map(ToString::to_string).as_deref(),
			Some("bounce@example.com")
		);
		let recipients: Vec<String> = mail.envelope().to().iter().map(ToString::to_string).collect();
		assert_eq!(recipients, vec!["a@example.com", "hidden@example.com"]);
		let formatted = String::from_utf8(mail.formatted()).unwrap();
		assert!(!formatted.contains("hidden@example.com"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_debug_connection_kind_round_trip() {
		// Arrange
		let options = MailOptions::new()
			.with_connection(ConnectionOptions::new(ConnectionKind::Debug))
			.with_subject("x")
			.with_body("y")
			.with_to("a@example.com");

		// Act
		let accepted = mailer().send_options(options).await.unwrap();

		// Assert
		assert_eq!(accepted, 1);
	}
}
