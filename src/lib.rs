//! # envoi
//!
//! Mail composition facade.
//!
//! envoi builds a MIME message from a loose set of options (a body, any
//! number of alternative parts, attachments and embedded images) and hands
//! it to a connection: SMTP, a local sendmail binary, a failover or rotating
//! composite of those, or a debug connection that only logs the dialogue.
//!
//! ## Feature Flags
//!
//! - `conf` - Layered settings (TOML files, environment variables)
//! - `mail` - Mailer, message composition and connections
//! - `full` (default) - Everything
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use envoi::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SettingsBuilder::new()
//!     .add_source(
//!         DefaultSource::new()
//!             .with_value("defaults", json!({
//!                 "from": "noreply@example.com",
//!                 "connection": { "type": "smtp", "params": { "server": "localhost", "port": 2525 } }
//!             })),
//!     )
//!     .add_source(EnvSource::new().with_prefix("ENVOI_"))
//!     .build_mailer()?;
//!
//! let mailer = Mailer::new(settings)?;
//! let (body, plain) = get_body_and_alternate(
//!     ContentMode::String,
//!     "<p>Your order has shipped.</p>",
//!     Some("Your order has shipped."),
//!     TemplateContext::new(),
//! );
//!
//! let mut options = MailOptions::new().with_bcc("archive@example.com");
//! if let Some(plain) = plain {
//!     options = options.with_part(plain);
//! }
//! mailer.send("Order shipped", body, "customer@example.com", options).await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "conf")]
pub mod conf;
#[cfg(feature = "mail")]
pub mod mail;

#[cfg(feature = "conf")]
pub use envoi_conf::{MailerSettings, SettingsBuilder, SettingsError};

#[cfg(feature = "mail")]
pub use envoi_mail::{MailError, MailOptions, MailResult, Mailer};

/// Common imports
pub mod prelude {
	#[cfg(feature = "conf")]
	pub use envoi_conf::{
		ConfigSource, DefaultSource, EnvSource, MailerSettings, SettingsBuilder, TomlFileSource,
	};

	#[cfg(feature = "mail")]
	pub use envoi_mail::{
		AttachmentSpec, BodySpec, CatalogTranslator, ConnectionKind, ConnectionOptions,
		ContentMode, ContentRenderer, MailError, MailLogger, MailOptions, MailResult, Mailer,
		PartSpec, Priority, Recipients, TemplateContext, TemplateRegistry, Translator, ViewRef,
		get_body, get_body_and_alternate,
	};
}
