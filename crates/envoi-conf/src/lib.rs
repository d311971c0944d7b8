//! # envoi configuration
//!
//! Layered settings for the envoi mailer.
//!
//! Settings are assembled from several [`ConfigSource`]s merged in priority
//! order (environment variables > TOML files > built-in defaults) and then
//! deserialized into [`MailerSettings`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use envoi_conf::{EnvSource, SettingsBuilder, TomlFileSource};
//!
//! # fn main() -> Result<(), envoi_conf::SettingsError> {
//! let settings = SettingsBuilder::new()
//!     .add_source(TomlFileSource::new("config/mailer.toml"))
//!     .add_source(EnvSource::new().with_prefix("ENVOI_"))
//!     .build_mailer()?;
//!
//! println!("web dir: {}", settings.web_dir.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`sources`]: configuration sources and their errors
//! - [`builder`]: merging of sources
//! - [`mailer`]: the mailer settings themselves

pub mod builder;
pub mod mailer;
pub mod sources;

pub use builder::{SettingsBuilder, merge_values};
pub use mailer::MailerSettings;
pub use sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};

/// Error raised while assembling settings
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Source error ({source_name}): {error}")]
	Source {
		source_name: String,
		#[source]
		error: SourceError,
	},

	#[error("Invalid settings: {0}")]
	Invalid(#[from] serde_json::Error),
}
