//! Mailer settings

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Settings consumed by the envoi mailer
///
/// `defaults` holds mail options applied to every send; options given for a
/// single send take precedence key by key. Its keys are the option names
/// (`from`, `connection`, `reply-to`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MailerSettings {
	/// Default mail options
	#[serde(default)]
	pub defaults: Map<String, Value>,

	/// Public web root, used to resolve embedded image names
	#[serde(default = "default_web_dir")]
	pub web_dir: PathBuf,

	/// Image directory below `web_dir`
	#[serde(default = "default_images_dir")]
	pub images_dir: String,

	/// Directory holding partial templates (`<module>/_<name>.<ext>`)
	#[serde(default)]
	pub templates_dir: Option<PathBuf>,

	/// Translation catalogue used for subjects when a send names none
	#[serde(default = "default_i18n_catalogue")]
	pub i18n_catalogue: String,
}

fn default_web_dir() -> PathBuf {
	PathBuf::from("web")
}

fn default_images_dir() -> String {
	"images".to_string()
}

fn default_i18n_catalogue() -> String {
	"messages".to_string()
}

impl Default for MailerSettings {
	fn default() -> Self {
		Self {
			defaults: Map::new(),
			web_dir: default_web_dir(),
			images_dir: default_images_dir(),
			templates_dir: None,
			i18n_catalogue: default_i18n_catalogue(),
		}
	}
}

impl MailerSettings {
	pub fn new() -> Self {
		Self::default()
	}

	/// Set a default mail option
	///
	/// # Examples
	///
	/// ```
	/// use envoi_conf::MailerSettings;
	///
	/// let settings = MailerSettings::new()
	///     .with_default("from", "noreply@example.com")
	///     .with_default("connection", serde_json::json!({ "type": "debug" }));
	/// assert_eq!(settings.defaults.len(), 2);
	/// ```
	pub fn with_default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.defaults.insert(key.into(), value.into());
		self
	}

	pub fn with_web_dir(mut self, web_dir: impl Into<PathBuf>) -> Self {
		self.web_dir = web_dir.into();
		self
	}

	pub fn with_templates_dir(mut self, templates_dir: impl Into<PathBuf>) -> Self {
		self.templates_dir = Some(templates_dir.into());
		self
	}
}
