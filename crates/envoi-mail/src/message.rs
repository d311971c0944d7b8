use crate::options::{AttachmentOptions, Encoding};
use crate::{MailError, MailResult};
use indexmap::IndexMap;
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment, Body, MultiPart, MultiPartBuilder, SinglePart};
use std::path::{Path, PathBuf};

/// Placeholder prefix for embedded images in bodies and parts
pub const IMAGE_PLACEHOLDER_PREFIX: &str = "%%IMG_";
/// Placeholder suffix for embedded images in bodies and parts
pub const IMAGE_PLACEHOLDER_SUFFIX: &str = "%%";

pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";
pub const DEFAULT_CHARSET: &str = "utf-8";

/// A rendered body segment of the message.
///
/// The body and every alternative part become one `BodyPart` each.
///
/// # Examples
///
/// ```
/// use envoi_mail::BodyPart;
///
/// let part = BodyPart::new("<h1>Hello!</h1>", "text/html");
/// assert_eq!(part.content_type(), "text/html");
/// assert_eq!(part.charset(), "utf-8");
/// ```
#[derive(Debug, Clone)]
pub struct BodyPart {
	content: String,
	content_type: String,
	encoding: Option<Encoding>,
	charset: String,
}

impl BodyPart {
	pub fn new(content: impl Into<String>, content_type: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			content_type: content_type.into(),
			encoding: None,
			charset: DEFAULT_CHARSET.to_string(),
		}
	}

	pub fn with_encoding(mut self, encoding: Option<Encoding>) -> Self {
		self.encoding = encoding;
		self
	}

	pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
		self.charset = charset.into();
		self
	}

	pub fn content(&self) -> &str {
		&self.content
	}

	pub fn content_type(&self) -> &str {
		&self.content_type
	}

	pub fn encoding(&self) -> Option<Encoding> {
		self.encoding
	}

	pub fn charset(&self) -> &str {
		&self.charset
	}

	/// Fails when the content cannot be carried by the requested encoding
	pub fn to_single_part(&self) -> MailResult<SinglePart> {
		let content_type = parse_content_type(&format!(
			"{}; charset={}",
			self.content_type, self.charset
		))?;

		let builder = SinglePart::builder().header(content_type);
		let Some(encoding) = self.encoding else {
			return Ok(builder.body(self.content.clone()));
		};

		let body = Body::new_with_encoding(
			self.content.clone(),
			ContentTransferEncoding::from(encoding),
		)
		.map_err(|_| {
			MailError::InvalidOption(format!(
				"encoding {:?} cannot carry this {} content",
				encoding, self.content_type
			))
		})?;
		Ok(builder.body(body))
	}
}

/// A file attached to the message.
///
/// # Examples
///
/// ```
/// use envoi_mail::MailAttachment;
///
/// let attachment = MailAttachment::new("document.pdf", b"PDF content".to_vec());
/// assert_eq!(attachment.filename(), "document.pdf");
/// assert_eq!(attachment.mime_type(), "application/pdf");
/// ```
#[derive(Debug, Clone)]
pub struct MailAttachment {
	filename: String,
	content: Vec<u8>,
	mime_type: String,
}

impl MailAttachment {
	/// MIME type is detected from the filename extension.
	pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
		let filename = filename.into();
		let mime_type = detect_mime_type(Path::new(&filename));

		Self {
			filename,
			content,
			mime_type,
		}
	}

	/// Read the file named by `options`
	///
	/// The filename defaults to the path's base name and the MIME type to
	/// the one guessed from the path.
	pub async fn load(options: AttachmentOptions) -> MailResult<Self> {
		let content = read_file(&options.path).await?;

		let filename = options
			.filename
			.filter(|name| !name.is_empty())
			.unwrap_or_else(|| base_name(&options.path));
		let mime_type = options
			.mime_type
			.filter(|mime| !mime.is_empty())
			.unwrap_or_else(|| detect_mime_type(&options.path));

		Ok(Self {
			filename,
			content,
			mime_type,
		})
	}

	pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
		self.mime_type = mime_type.into();
		self
	}

	pub fn filename(&self) -> &str {
		&self.filename
	}

	pub fn content(&self) -> &[u8] {
		&self.content
	}

	pub fn mime_type(&self) -> &str {
		&self.mime_type
	}

	pub fn to_single_part(&self) -> MailResult<SinglePart> {
		let content_type = parse_content_type(&self.mime_type)?;
		Ok(Attachment::new(self.filename.clone()).body(self.content.clone(), content_type))
	}
}

/// An image attached inline and referenced from bodies by content id
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
	name: String,
	content_id: String,
	path: PathBuf,
	content: Vec<u8>,
	mime_type: String,
}

impl EmbeddedImage {
	/// Read the image at `path` and give it a fresh content id
	pub async fn load(name: impl Into<String>, path: impl Into<PathBuf>) -> MailResult<Self> {
		let path = path.into();
		let content = read_file(&path).await?;
		let mime_type = detect_mime_type(&path);

		Ok(Self {
			name: name.into(),
			content_id: format!("{}@envoi", uuid::Uuid::new_v4().simple()),
			path,
			content,
			mime_type,
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn content_id(&self) -> &str {
		&self.content_id
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn mime_type(&self) -> &str {
		&self.mime_type
	}

	/// The value substituted for the image's placeholder
	pub fn cid_reference(&self) -> String {
		format!("cid:{}", self.content_id)
	}

	pub fn to_single_part(&self) -> MailResult<SinglePart> {
		let content_type = parse_content_type(&self.mime_type)?;
		Ok(Attachment::new_inline(self.content_id.clone()).body(self.content.clone(), content_type))
	}
}

/// Replace every `%%IMG_<name>%%` by the matching reference
///
/// # Examples
///
/// ```
/// use envoi_mail::message::replace_embedded_images;
/// use indexmap::IndexMap;
///
/// let mut images = IndexMap::new();
/// images.insert("one".to_string(), "cid:abc@envoi".to_string());
///
/// let html = replace_embedded_images(r#"<img src="%%IMG_one%%">"#, &images);
/// assert_eq!(html, r#"<img src="cid:abc@envoi">"#);
/// ```
pub fn replace_embedded_images(content: &str, references: &IndexMap<String, String>) -> String {
	let mut result = content.to_string();
	for (name, reference) in references {
		let placeholder = format!(
			"{}{}{}",
			IMAGE_PLACEHOLDER_PREFIX, name, IMAGE_PLACEHOLDER_SUFFIX
		);
		result = result.replace(&placeholder, reference);
	}
	result
}

/// Root of the MIME tree handed to the message builder
#[derive(Debug, Clone)]
pub enum MimeNode {
	Single(SinglePart),
	Multi(MultiPart),
}

impl MimeNode {
	fn into_multipart(self, builder: MultiPartBuilder) -> MultiPart {
		match self {
			MimeNode::Single(part) => builder.singlepart(part),
			MimeNode::Multi(part) => builder.multipart(part),
		}
	}
}

/// Arrange parts into a MIME tree
///
/// Several bodies form a `multipart/alternative`; inline images wrap the
/// content in `multipart/related`; attachments wrap everything in
/// `multipart/mixed`.
pub fn assemble(
	bodies: Vec<SinglePart>,
	images: Vec<SinglePart>,
	attachments: Vec<SinglePart>,
) -> MailResult<MimeNode> {
	let mut bodies = bodies.into_iter();
	let first = bodies.next().ok_or(MailError::MissingBody)?;

	let mut content = MimeNode::Single(first);
	for part in bodies {
		content = match content {
			MimeNode::Single(first) => MimeNode::Multi(MultiPart::alternative().singlepart(first)),
			multi => multi,
		};
		if let MimeNode::Multi(alternative) = content {
			content = MimeNode::Multi(alternative.singlepart(part));
		}
	}

	if !images.is_empty() {
		let related = images
			.into_iter()
			.fold(content.into_multipart(MultiPart::related()), |related, image| {
				related.singlepart(image)
			});
		content = MimeNode::Multi(related);
	}

	if !attachments.is_empty() {
		let mixed = attachments
			.into_iter()
			.fold(content.into_multipart(MultiPart::mixed()), |mixed, attachment| {
				mixed.singlepart(attachment)
			});
		content = MimeNode::Multi(mixed);
	}

	Ok(content)
}

fn parse_content_type(raw: &str) -> MailResult<ContentType> {
	ContentType::parse(raw)
		.map_err(|e| MailError::InvalidOption(format!("content type \"{}\": {}", raw, e)))
}

/// Detect MIME type from a file name
fn detect_mime_type(path: &Path) -> String {
	mime_guess::from_path(path)
		.first()
		.map(|mime| mime.to_string())
		.unwrap_or_else(|| "application/octet-stream".to_string())
}

fn base_name(path: &Path) -> String {
	path.file_name()
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_else(|| path.to_string_lossy().into_owned())
}

async fn read_file(path: &Path) -> MailResult<Vec<u8>> {
	tokio::fs::read(path)
		.await
		.map_err(|e| MailError::Attachment(format!("{}: {}", path.display(), e)))
}
