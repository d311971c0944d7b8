//! Merging of configuration sources

use crate::mailer::MailerSettings;
use crate::sources::ConfigSource;
use crate::SettingsError;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Collects configuration sources and merges them into typed settings
///
/// Sources are applied from the lowest to the highest priority. Nested
/// objects are merged key by key; any other value is replaced.
///
/// # Examples
///
/// ```
/// use envoi_conf::{DefaultSource, EnvSource, SettingsBuilder};
///
/// let settings = SettingsBuilder::new()
///     .add_source(DefaultSource::new().with_value("web_dir", "public"))
///     .add_source(EnvSource::new().with_vars([("WEB_DIR", "/srv/public")]))
///     .build_mailer()
///     .unwrap();
///
/// assert_eq!(settings.web_dir.to_str(), Some("/srv/public"));
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Load and merge every source into a single map
	pub fn build(&self) -> Result<IndexMap<String, Value>, SettingsError> {
		let mut ordered: Vec<&dyn ConfigSource> =
			self.sources.iter().map(|source| source.as_ref()).collect();
		ordered.sort_by_key(|source| source.priority());

		let mut merged = IndexMap::new();
		for source in ordered {
			let values = source.load().map_err(|error| SettingsError::Source {
				source_name: source.description(),
				error,
			})?;
			tracing::debug!(
				source = %source.description(),
				keys = values.len(),
				"Loaded settings source"
			);

			for (key, value) in values {
				match merged.get_mut(&key) {
					Some(existing) => merge_values(existing, value),
					None => {
						merged.insert(key, value);
					}
				}
			}
		}

		Ok(merged)
	}

	/// Merge the sources and deserialize the result
	pub fn build_into<T: DeserializeOwned>(&self) -> Result<T, SettingsError> {
		let merged = self.build()?;
		let object: serde_json::Map<String, Value> = merged.into_iter().collect();
		Ok(serde_json::from_value(Value::Object(object))?)
	}

	pub fn build_mailer(&self) -> Result<MailerSettings, SettingsError> {
		self.build_into()
	}
}

/// Merge `overlay` into `target`. Objects merge recursively, everything
/// else is overwritten.
pub fn merge_values(target: &mut Value, overlay: Value) {
	match (target, overlay) {
		(Value::Object(target_map), Value::Object(overlay_map)) => {
			for (key, value) in overlay_map {
				match target_map.get_mut(&key) {
					Some(existing) => merge_values(existing, value),
					None => {
						target_map.insert(key, value);
					}
				}
			}
		}
		(target, overlay) => *target = overlay,
	}
}
