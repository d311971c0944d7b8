//! Configuration sources for layered settings
//!
//! Provides different sources of configuration that can be merged together
//! in priority order (environment variables > config files > defaults).

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Separator between nested keys in environment variable names
pub const NESTED_SEPARATOR: &str = "__";

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Invalid source: {0}")]
	InvalidSource(String),
}

/// Environment variable configuration source
///
/// Keys are lowercased after the prefix is stripped. A double underscore
/// separates nested keys, so `ENVOI_DEFAULTS__FROM` becomes `defaults.from`.
/// Values are read as JSON when they parse as such and kept as strings
/// otherwise.
pub struct EnvSource {
	prefix: Option<String>,
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	/// Create a new environment variable configuration source
	///
	/// # Examples
	///
	/// ```
	/// use envoi_conf::EnvSource;
	///
	/// let source = EnvSource::new();
	/// // Loads all environment variables
	/// ```
	pub fn new() -> Self {
		Self {
			prefix: None,
			vars: None,
		}
	}

	/// Set a prefix filter for environment variables
	///
	/// # Examples
	///
	/// ```
	/// use envoi_conf::EnvSource;
	///
	/// let source = EnvSource::new().with_prefix("ENVOI_");
	/// // Only loads env vars starting with ENVOI_
	/// ```
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}

	/// Read from a fixed list of variables instead of the process environment
	pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.vars = Some(
			vars.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		);
		self
	}

	fn parse_value(raw: &str) -> Value {
		serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let vars = match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		};

		let mut config = IndexMap::new();

		for (key, value) in vars {
			let clean_key = match &self.prefix {
				Some(prefix) => match key.strip_prefix(prefix.as_str()) {
					Some(rest) => rest,
					None => continue,
				},
				None => key.as_str(),
			};

			let path: Vec<String> = clean_key
				.split(NESTED_SEPARATOR)
				.map(|segment| segment.to_lowercase())
				.collect();
			if path.iter().any(|segment| segment.is_empty()) {
				continue;
			}

			insert_path(&mut config, &path, Self::parse_value(&value));
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		match &self.prefix {
			Some(prefix) => format!("Environment variables (prefix: {})", prefix),
			None => "Environment variables".to_string(),
		}
	}
}

fn insert_path(config: &mut IndexMap<String, Value>, path: &[String], value: Value) {
	let Some((head, rest)) = path.split_first() else {
		return;
	};

	if rest.is_empty() {
		config.insert(head.clone(), value);
		return;
	}

	let mut nested = value;
	for segment in rest.iter().rev() {
		let mut map = serde_json::Map::new();
		map.insert(segment.clone(), nested);
		nested = Value::Object(map);
	}

	match config.get_mut(head) {
		Some(existing) => crate::builder::merge_values(existing, nested),
		None => {
			config.insert(head.clone(), nested);
		}
	}
}

/// TOML file configuration source
pub struct TomlFileSource {
	path: PathBuf,
	required: bool,
}

impl TomlFileSource {
	/// Create a source reading the given TOML file. The file must exist.
	pub fn new(path: impl AsRef<Path>) -> Self {
		Self {
			path: path.as_ref().to_path_buf(),
			required: true,
		}
	}

	/// Treat a missing file as an empty configuration
	pub fn optional(mut self) -> Self {
		self.required = false;
		self
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			if self.required {
				return Err(SourceError::InvalidSource(format!(
					"Configuration file not found: {}",
					self.path.display()
				)));
			}
			tracing::debug!(path = %self.path.display(), "Optional settings file missing");
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let config: IndexMap<String, Value> = toml::from_str(&content)?;

		Ok(config)
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// In-memory defaults, the lowest priority source
#[derive(Default)]
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.values.insert(key.into(), value.into());
		self
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}
