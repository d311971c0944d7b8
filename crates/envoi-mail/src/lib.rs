//! # envoi mail
//!
//! Mail composition facade: assembles bodies, alternative parts, attachments
//! and embedded images from a loose set of options, then hands the message to
//! a connection (SMTP, sendmail, native, failover/rotating composites, or a
//! debug connection that simulates an SMTP server and logs the dialogue).
//!
//! ## Features
//!
//! ### Composition
//! - **Bodies**: literal strings, partial templates or components
//! - **Alternative parts**: body plus any number of parts form a `multipart/alternative`
//! - **Attachments**: file attachments with MIME type detection
//! - **Embedded images**: `%%IMG_<name>%%` placeholders replaced by the image's content id
//! - **Subjects**: translated through a catalogue and formatted with a template
//!
//! ### Connections
//! - **native** / **sendmail**: pipe the message to a local sendmail binary
//! - **smtp**: lettre's async SMTP transport (plain, STARTTLS, implicit TLS)
//! - **multi**: failover across several connections
//! - **rotator**: round robin across several connections
//! - **debug**: fake SMTP replies, every command logged through a [`MailLogger`]
//!
//! ## Examples
//!
//! ### Simple Email
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use envoi_conf::MailerSettings;
//! use envoi_mail::{ConnectionKind, ConnectionOptions, MailOptions, Mailer};
//!
//! let settings = MailerSettings::new().with_default("from", "noreply@example.com");
//! let mailer = Mailer::new(settings)?;
//!
//! let options = MailOptions::new().with_connection(ConnectionOptions::new(ConnectionKind::Debug));
//! let accepted = mailer
//!     .send("Welcome!", "Welcome to our service", "user@example.com", options)
//!     .await?;
//! assert_eq!(accepted, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ### HTML body with a plain text alternative and an embedded image
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use envoi_conf::MailerSettings;
//! use envoi_mail::{ContentMode, MailOptions, Mailer, TemplateContext, get_body_and_alternate};
//!
//! let mailer = Mailer::new(MailerSettings::new())?;
//!
//! let (body, plain) = get_body_and_alternate(
//!     ContentMode::String,
//!     r#"<img src="%%IMG_logo%%"><h1>Newsletter</h1>"#,
//!     Some("Newsletter"),
//!     TemplateContext::new(),
//! );
//!
//! let mut options = MailOptions::new()
//!     .with_from("marketing@example.com")
//!     .with_embed_image("logo", "/var/www/images/logo.png");
//! if let Some(plain) = plain {
//!     options = options.with_part(plain);
//! }
//!
//! mailer.send("Newsletter", body, "customer@example.com", options).await?;
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod connection;
pub mod i18n;
pub mod images;
pub mod logging;
pub mod mailer;
pub mod message;
pub mod options;
pub mod templates;

use thiserror::Error;

pub use body::{ContentMode, get_body, get_body_and_alternate};
pub use connection::{
	Connection, ConnectionContext, DebugConnection, MultiConnection, SendmailConnection,
	SmtpConnection,
};
pub use i18n::{CatalogTranslator, NoopTranslator, Translator};
pub use images::ImageResolver;
pub use logging::{LogEntry, MailLogger, Priority, RecordingLogger, TracingLogger};
pub use mailer::{ComposedMail, Mailer};
pub use message::{BodyPart, EmbeddedImage, MailAttachment};
pub use options::{
	AttachmentOptions, AttachmentSpec, BodySpec, ConnectionKind, ConnectionOptions, Content,
	Encoding, MailOptions, PartSpec, Recipients, ViewKind, ViewRef,
};
pub use templates::{ContentRenderer, TemplateContext, TemplateRegistry, render_template};

#[derive(Debug, Error)]
pub enum MailError {
	#[error("Connection configuration required")]
	MissingConnection,

	#[error("Connection type undefined")]
	MissingConnectionType,

	#[error("Subject required")]
	MissingSubject,

	#[error("Body is required")]
	MissingBody,

	#[error("Missing required option: {0}")]
	MissingOption(String),

	#[error("Invalid option: {0}")]
	InvalidOption(String),

	#[error("Invalid email address: {0}")]
	InvalidAddress(String),

	#[error("Template error: {0}")]
	Template(String),

	#[error("Attachment error: {0}")]
	Attachment(String),

	#[error("Message error: {0}")]
	Message(#[from] lettre::error::Error),

	#[error("SMTP transport error: {0}")]
	Transport(#[from] lettre::transport::smtp::Error),

	#[error("SMTP error: {0}")]
	Smtp(String),

	#[error("Sendmail error: {0}")]
	Sendmail(String),

	#[error("Connection error: {0}")]
	Connection(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

pub type MailResult<T> = std::result::Result<T, MailError>;
