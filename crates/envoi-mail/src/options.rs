//! Mail options
//!
//! Typed form of the option maps accepted by [`Mailer::send_options`]
//! (`crate::Mailer::send_options`). Every type deserializes from the same
//! loose shapes a configuration file would use: a body may be a bare string
//! or a detailed part, recipients a single mailbox or a list, attachments a
//! path or a table.

use crate::templates::TemplateContext;
use crate::{MailError, MailResult};
use indexmap::IndexMap;
use lettre::message::header::ContentTransferEncoding;
use lettre::message::{Mailbox, Mailboxes};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Options for a single send
///
/// Keys follow the option names used in configuration: `reply-to`,
/// `return-path`, `subject-template`, `i18n-catalogue`, `embed-images`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MailOptions {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub connection: Option<ConnectionOptions>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub from: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub to: Option<Recipients>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub cc: Option<Recipients>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub bcc: Option<Recipients>,

	#[serde(alias = "reply_to", skip_serializing_if = "Option::is_none")]
	pub reply_to: Option<Recipients>,

	#[serde(alias = "return_path", skip_serializing_if = "Option::is_none")]
	pub return_path: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub subject: Option<String>,

	#[serde(alias = "subject_template", skip_serializing_if = "Option::is_none")]
	pub subject_template: Option<String>,

	#[serde(alias = "i18n_catalogue", skip_serializing_if = "Option::is_none")]
	pub i18n_catalogue: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub body: Option<BodySpec>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub parts: Option<Vec<BodySpec>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub attachments: Option<Vec<AttachmentSpec>>,

	#[serde(alias = "embed_images", skip_serializing_if = "Option::is_none")]
	pub embed_images: Option<IndexMap<String, String>>,
}

impl MailOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_connection(mut self, connection: ConnectionOptions) -> Self {
		self.connection = Some(connection);
		self
	}

	pub fn with_from(mut self, from: impl Into<String>) -> Self {
		self.from = Some(from.into());
		self
	}

	pub fn with_to(mut self, to: impl Into<Recipients>) -> Self {
		self.to = Some(to.into());
		self
	}

	pub fn with_cc(mut self, cc: impl Into<Recipients>) -> Self {
		self.cc = Some(cc.into());
		self
	}

	pub fn with_bcc(mut self, bcc: impl Into<Recipients>) -> Self {
		self.bcc = Some(bcc.into());
		self
	}

	pub fn with_reply_to(mut self, reply_to: impl Into<Recipients>) -> Self {
		self.reply_to = Some(reply_to.into());
		self
	}

	pub fn with_return_path(mut self, return_path: impl Into<String>) -> Self {
		self.return_path = Some(return_path.into());
		self
	}

	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = Some(subject.into());
		self
	}

	pub fn with_subject_template(mut self, template: impl Into<String>) -> Self {
		self.subject_template = Some(template.into());
		self
	}

	pub fn with_i18n_catalogue(mut self, catalogue: impl Into<String>) -> Self {
		self.i18n_catalogue = Some(catalogue.into());
		self
	}

	pub fn with_body(mut self, body: impl Into<BodySpec>) -> Self {
		self.body = Some(body.into());
		self
	}

	/// Append an alternative part; the body stays the first part
	pub fn with_part(mut self, part: impl Into<BodySpec>) -> Self {
		self.parts.get_or_insert_with(Vec::new).push(part.into());
		self
	}

	pub fn with_attachment(mut self, attachment: impl Into<AttachmentSpec>) -> Self {
		self.attachments
			.get_or_insert_with(Vec::new)
			.push(attachment.into());
		self
	}

	/// Embed an image referenced as `%%IMG_<name>%%` in bodies and parts
	pub fn with_embed_image(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
		self.embed_images
			.get_or_insert_with(IndexMap::new)
			.insert(name.into(), path.into());
		self
	}

	/// Lay these options over configured defaults
	///
	/// Keys set here replace the default of the same key as a whole; nested
	/// values are not merged. Default keys may use `_` or `-` as separator.
	///
	/// # Examples
	///
	/// ```
	/// use envoi_mail::MailOptions;
	/// use serde_json::{Map, json};
	///
	/// let mut defaults = Map::new();
	/// defaults.insert("from".to_string(), json!("site@example.com"));
	/// defaults.insert("subject_template".to_string(), json!("[Site] %s"));
	///
	/// let options = MailOptions::new()
	///     .with_subject_template("%s")
	///     .merged_over(&defaults)
	///     .unwrap();
	/// assert_eq!(options.from.as_deref(), Some("site@example.com"));
	/// assert_eq!(options.subject_template.as_deref(), Some("%s"));
	/// ```
	pub fn merged_over(&self, defaults: &Map<String, Value>) -> MailResult<MailOptions> {
		let mut merged: Map<String, Value> = defaults
			.iter()
			.map(|(key, value)| (key.replace('_', "-"), value.clone()))
			.collect();

		let overrides = serde_json::to_value(self)
			.map_err(|e| MailError::InvalidOption(format!("mail options: {}", e)))?;
		if let Value::Object(overrides) = overrides {
			merged.extend(overrides);
		}

		serde_json::from_value(Value::Object(merged))
			.map_err(|e| MailError::InvalidOption(format!("mail options: {}", e)))
	}
}

/// Transport selection for a send
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionOptions {
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<ConnectionKind>,

	/// Type specific parameters, decoded when the connection is built
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub params: Map<String, Value>,
}

impl ConnectionOptions {
	pub fn new(kind: ConnectionKind) -> Self {
		Self {
			kind: Some(kind),
			params: Map::new(),
		}
	}

	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.params.insert(key.into(), value.into());
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
	Native,
	Smtp,
	Sendmail,
	Multi,
	Rotator,
	Debug,
}

impl ConnectionKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ConnectionKind::Native => "native",
			ConnectionKind::Smtp => "smtp",
			ConnectionKind::Sendmail => "sendmail",
			ConnectionKind::Multi => "multi",
			ConnectionKind::Rotator => "rotator",
			ConnectionKind::Debug => "debug",
		}
	}
}

impl fmt::Display for ConnectionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One or more recipients
///
/// A single string may hold a bare address, `Name <address>`, or several
/// mailboxes separated by commas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRecipients", into = "RawRecipients")]
pub enum Recipients {
	One(String),
	Named { name: String, address: String },
	Many(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawRecipients {
	One(String),
	Named { name: String, address: String },
	Many(Vec<String>),
}

impl From<RawRecipients> for Recipients {
	fn from(raw: RawRecipients) -> Self {
		match raw {
			RawRecipients::One(mailbox) => Recipients::One(mailbox),
			RawRecipients::Named { name, address } => Recipients::Named { name, address },
			// `[name, address]`
			RawRecipients::Many(list)
				if list.len() == 2 && !list[0].contains('@') && list[1].contains('@') =>
			{
				let mut list = list.into_iter();
				let name = list.next().unwrap_or_default();
				let address = list.next().unwrap_or_default();
				Recipients::Named { name, address }
			}
			RawRecipients::Many(list) => Recipients::Many(list),
		}
	}
}

impl From<Recipients> for RawRecipients {
	fn from(recipients: Recipients) -> Self {
		match recipients {
			Recipients::One(mailbox) => RawRecipients::One(mailbox),
			Recipients::Named { name, address } => RawRecipients::Named { name, address },
			Recipients::Many(list) => RawRecipients::Many(list),
		}
	}
}

impl Recipients {
	pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
		Recipients::Named {
			name: name.into(),
			address: address.into(),
		}
	}

	/// Parse into mailboxes
	///
	/// # Examples
	///
	/// ```
	/// use envoi_mail::Recipients;
	///
	/// let mailboxes = Recipients::from("him <his@mail.com>").mailboxes().unwrap();
	/// assert_eq!(mailboxes[0].name.as_deref(), Some("him"));
	/// assert_eq!(mailboxes[0].email.to_string(), "his@mail.com");
	/// ```
	pub fn mailboxes(&self) -> MailResult<Vec<Mailbox>> {
		match self {
			Recipients::One(mailbox) => parse_mailbox_list(mailbox),
			Recipients::Named { name, address } => {
				let email = address
					.trim()
					.parse()
					.map_err(|e| MailError::InvalidAddress(format!("{}: {}", address, e)))?;
				Ok(vec![Mailbox::new(Some(name.clone()), email)])
			}
			Recipients::Many(list) => {
				let mut mailboxes = Vec::with_capacity(list.len());
				for mailbox in list {
					mailboxes.extend(parse_mailbox_list(mailbox)?);
				}
				Ok(mailboxes)
			}
		}
	}
}

fn parse_mailbox_list(raw: &str) -> MailResult<Vec<Mailbox>> {
	let mailboxes: Mailboxes = raw
		.parse()
		.map_err(|e| MailError::InvalidAddress(format!("{}: {}", raw, e)))?;
	Ok(mailboxes.into_iter().collect())
}

/// Parse a single mailbox (`address` or `Name <address>`)
pub fn parse_mailbox(raw: &str) -> MailResult<Mailbox> {
	raw.trim()
		.parse()
		.map_err(|e| MailError::InvalidAddress(format!("{}: {}", raw, e)))
}

impl From<&str> for Recipients {
	fn from(mailbox: &str) -> Self {
		Recipients::One(mailbox.to_string())
	}
}

impl From<String> for Recipients {
	fn from(mailbox: String) -> Self {
		Recipients::One(mailbox)
	}
}

impl From<Vec<String>> for Recipients {
	fn from(list: Vec<String>) -> Self {
		Recipients::Many(list)
	}
}

impl From<Vec<&str>> for Recipients {
	fn from(list: Vec<&str>) -> Self {
		Recipients::Many(list.into_iter().map(str::to_string).collect())
	}
}

impl From<(&str, &str)> for Recipients {
	fn from((name, address): (&str, &str)) -> Self {
		Recipients::named(name, address)
	}
}

/// A body or alternative part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodySpec {
	/// Literal content, `text/plain`
	Text(String),
	/// Rendered content, `text/plain`
	View(ViewRef),
	Part(PartSpec),
}

impl BodySpec {
	pub fn into_part(self) -> PartSpec {
		match self {
			BodySpec::Text(text) => PartSpec::new(Content::Text(text)),
			BodySpec::View(view) => PartSpec::new(Content::View(view)),
			BodySpec::Part(part) => part,
		}
	}
}

impl From<&str> for BodySpec {
	fn from(text: &str) -> Self {
		BodySpec::Text(text.to_string())
	}
}

impl From<String> for BodySpec {
	fn from(text: String) -> Self {
		BodySpec::Text(text)
	}
}

impl From<ViewRef> for BodySpec {
	fn from(view: ViewRef) -> Self {
		BodySpec::View(view)
	}
}

impl From<PartSpec> for BodySpec {
	fn from(part: PartSpec) -> Self {
		BodySpec::Part(part)
	}
}

/// A MIME part description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartSpec {
	pub content: Content,

	#[serde(alias = "content_type", skip_serializing_if = "Option::is_none")]
	pub content_type: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub encoding: Option<Encoding>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub charset: Option<String>,
}

impl PartSpec {
	pub fn new(content: impl Into<Content>) -> Self {
		Self {
			content: content.into(),
			content_type: None,
			encoding: None,
			charset: None,
		}
	}

	pub fn html(content: impl Into<Content>) -> Self {
		Self::new(content).with_content_type("text/html")
	}

	pub fn plain(content: impl Into<Content>) -> Self {
		Self::new(content).with_content_type("text/plain")
	}

	pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());
		self
	}

	pub fn with_encoding(mut self, encoding: Encoding) -> Self {
		self.encoding = Some(encoding);
		self
	}

	pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
		self.charset = Some(charset.into());
		self
	}
}

/// Part content: literal or rendered from a view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
	Text(String),
	View(ViewRef),
}

impl From<&str> for Content {
	fn from(text: &str) -> Self {
		Content::Text(text.to_string())
	}
}

impl From<String> for Content {
	fn from(text: String) -> Self {
		Content::Text(text)
	}
}

impl From<ViewRef> for Content {
	fn from(view: ViewRef) -> Self {
		Content::View(view)
	}
}

/// Reference to a partial or a component
///
/// Names have the form `module/name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRef {
	#[serde(rename = "type")]
	pub kind: ViewKind,
	pub name: String,
	#[serde(default)]
	pub vars: TemplateContext,
}

impl ViewRef {
	pub fn partial(name: impl Into<String>, vars: TemplateContext) -> Self {
		Self {
			kind: ViewKind::Partial,
			name: name.into(),
			vars,
		}
	}

	pub fn component(name: impl Into<String>, vars: TemplateContext) -> Self {
		Self {
			kind: ViewKind::Component,
			name: name.into(),
			vars,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
	Partial,
	Component,
}

/// Content-Transfer-Encoding of a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
	#[serde(rename = "7bit")]
	SevenBit,
	#[serde(rename = "8bit")]
	EightBit,
	#[serde(rename = "quoted-printable")]
	QuotedPrintable,
	#[serde(rename = "base64")]
	Base64,
	#[serde(rename = "binary")]
	Binary,
}

impl From<Encoding> for ContentTransferEncoding {
	fn from(encoding: Encoding) -> Self {
		match encoding {
			Encoding::SevenBit => ContentTransferEncoding::SevenBit,
			Encoding::EightBit => ContentTransferEncoding::EightBit,
			Encoding::QuotedPrintable => ContentTransferEncoding::QuotedPrintable,
			Encoding::Base64 => ContentTransferEncoding::Base64,
			Encoding::Binary => ContentTransferEncoding::Binary,
		}
	}
}

/// A file to attach: a path, or a path with overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentSpec {
	Path(PathBuf),
	Detailed(AttachmentOptions),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AttachmentOptions {
	pub path: PathBuf,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub filename: Option<String>,

	#[serde(alias = "mime_type", skip_serializing_if = "Option::is_none")]
	pub mime_type: Option<String>,
}

impl AttachmentSpec {
	pub fn into_options(self) -> AttachmentOptions {
		match self {
			AttachmentSpec::Path(path) => AttachmentOptions {
				path,
				filename: None,
				mime_type: None,
			},
			AttachmentSpec::Detailed(options) => options,
		}
	}
}

impl From<&str> for AttachmentSpec {
	fn from(path: &str) -> Self {
		AttachmentSpec::Path(PathBuf::from(path))
	}
}

impl From<PathBuf> for AttachmentSpec {
	fn from(path: PathBuf) -> Self {
		AttachmentSpec::Path(path)
	}
}

impl From<AttachmentOptions> for AttachmentSpec {
	fn from(options: AttachmentOptions) -> Self {
		AttachmentSpec::Detailed(options)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_recipients_name_address_pair() {
		// Act
		let recipients: Recipients = serde_json::from_value(json!(["him", "his@mail.com"])).unwrap();

		// Assert
		assert_eq!(recipients, Recipients::named("him", "his@mail.com"));
	}

	#[rstest]
	fn test_recipients_two_addresses_stay_a_list() {
		// Act
		let recipients: Recipients =
			serde_json::from_value(json!(["a@example.com", "b@example.com"])).unwrap();

		// Assert
		assert_eq!(
			recipients,
			Recipients::Many(vec!["a@example.com".into(), "b@example.com".into()])
		);
		assert_eq!(recipients.mailboxes().unwrap().len(), 2);
	}

	#[rstest]
	fn test_recipients_comma_separated() {
		// Act
		let mailboxes = Recipients::from("a@example.com, Bee <b@example.com>")
			.mailboxes()
			.unwrap();

		// Assert
		assert_eq!(mailboxes.len(), 2);
		assert_eq!(mailboxes[1].name.as_deref(), Some("Bee"));
	}

	#[rstest]
	fn test_recipients_invalid_address() {
		// Act
		let result = Recipients::from("not an address").mailboxes();

		// Assert
		assert!(matches!(result, Err(MailError::InvalidAddress(_))));
	}

	#[rstest]
	fn test_body_spec_shapes() {
		// Arrange
		let text = json!("My Body");
		let view = json!({ "type": "partial", "name": "mail/welcome", "vars": { "name": "Ann" } });
		let part = json!({ "content": "<b>hi</b>", "content-type": "text/html", "encoding": "base64" });

		// Act
		let text: BodySpec = serde_json::from_value(text).unwrap();
		let view: BodySpec = serde_json::from_value(view).unwrap();
		let part: BodySpec = serde_json::from_value(part).unwrap();

		// Assert
		assert_eq!(text, BodySpec::Text("My Body".into()));
		assert!(matches!(view, BodySpec::View(ref v) if v.kind == ViewKind::Partial && v.vars["name"] == "Ann"));
		assert_eq!(
			part,
			BodySpec::Part(
				PartSpec::html("<b>hi</b>").with_encoding(Encoding::Base64)
			)
		);
	}

	#[rstest]
	fn test_part_with_view_content() {
		// Arrange
		let raw = json!({
			"content": { "type": "component", "name": "mail/footer" },
			"content-type": "text/html"
		});

		// Act
		let part = serde_json::from_value::<BodySpec>(raw).unwrap().into_part();

		// Assert
		assert_eq!(part.content_type.as_deref(), Some("text/html"));
		assert_eq!(
			part.content,
			Content::View(ViewRef::component("mail/footer", TemplateContext::new()))
		);
	}

	#[rstest]
	fn test_attachment_spec_shapes() {
		// Act
		let path: AttachmentSpec = serde_json::from_value(json!("/tmp/report.pdf")).unwrap();
		let detailed: AttachmentSpec = serde_json::from_value(json!({
			"path": "/tmp/data.bin",
			"filename": "data.csv",
			"mime-type": "text/csv"
		}))
		.unwrap();

		// Assert
		assert_eq!(path.into_options().path, PathBuf::from("/tmp/report.pdf"));
		let detailed = detailed.into_options();
		assert_eq!(detailed.filename.as_deref(), Some("data.csv"));
		assert_eq!(detailed.mime_type.as_deref(), Some("text/csv"));
	}

	#[rstest]
	fn test_merged_over_keeps_unset_defaults() {
		// Arrange
		let mut defaults = Map::new();
		defaults.insert("from".into(), json!("site@example.com"));
		defaults.insert("connection".into(), json!({ "type": "native" }));
		defaults.insert("reply_to".into(), json!("help@example.com"));

		// Act
		let merged = MailOptions::new()
			.with_connection(ConnectionOptions::new(ConnectionKind::Debug))
			.with_subject("Hello")
			.merged_over(&defaults)
			.unwrap();

		// Assert
		assert_eq!(merged.from.as_deref(), Some("site@example.com"));
		assert_eq!(merged.reply_to, Some(Recipients::from("help@example.com")));
		assert_eq!(
			merged.connection.and_then(|c| c.kind),
			Some(ConnectionKind::Debug)
		);
		assert_eq!(merged.subject.as_deref(), Some("Hello"));
	}

	#[rstest]
	fn test_merged_over_rejects_unknown_connection_type() {
		// Arrange
		let mut defaults = Map::new();
		defaults.insert("connection".into(), json!({ "type": "carrier-pigeon" }));

		// Act
		let result = MailOptions::new().merged_over(&defaults);

		// Assert
		assert!(matches!(result, Err(MailError::InvalidOption(_))));
	}
}
