//! Layered settings integration tests
//!
//! Loads mailer settings from a TOML file overridden by environment
//! variables, the way an application configures the mailer at startup.

use envoi_conf::{DefaultSource, EnvSource, SettingsBuilder, SettingsError, TomlFileSource};
use rstest::rstest;
use serde_json::json;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

const MAILER_TOML: &str = r#"
web_dir = "/var/www/site"
templates_dir = "/var/www/templates"

[defaults]
from = "site@example.com"
subject-template = "[Site] %s"

[defaults.connection]
type = "smtp"

[defaults.connection.params]
server = "smtp.example.com"
port = 587
encryption = "TLS"
"#;

/// Test: TOML values override defaults, env values override TOML
#[rstest]
fn test_env_overrides_toml_overrides_defaults() {
	// Arrange
	let dir = TempDir::with_prefix("envoi_conf_").unwrap();
	let path = dir.path().join("mailer.toml");
	fs::write(&path, MAILER_TOML).unwrap();

	let builder = SettingsBuilder::new()
		.add_source(DefaultSource::new().with_value("i18n_catalogue", "mail"))
		.add_source(TomlFileSource::new(&path))
		.add_source(EnvSource::new().with_prefix("ENVOI_").with_vars([
			("ENVOI_DEFAULTS__CONNECTION__PARAMS__SERVER", "relay.internal"),
			("ENVOI_IMAGES_DIR", "img"),
		]));

	// Act
	let settings = builder.build_mailer().unwrap();

	// Assert
	assert_eq!(settings.web_dir.to_str(), Some("/var/www/site"));
	assert_eq!(settings.images_dir, "img");
	assert_eq!(settings.i18n_catalogue, "mail");
	assert_eq!(
		settings.templates_dir.as_deref().and_then(|p| p.to_str()),
		Some("/var/www/templates")
	);
	assert_eq!(settings.defaults.get("from"), Some(&json!("site@example.com")));
	assert_eq!(
		settings.defaults.get("connection"),
		Some(&json!({
			"type": "smtp",
			"params": {
				"server": "relay.internal",
				"port": 587,
				"encryption": "TLS"
			}
		}))
	);
}

/// Test: a malformed TOML file reports which source failed
#[rstest]
fn test_malformed_toml_names_the_source() {
	// Arrange
	let dir = TempDir::with_prefix("envoi_conf_").unwrap();
	let path = dir.path().join("broken.toml");
	fs::write(&path, "web_dir = ").unwrap();

	// Act
	let result = SettingsBuilder::new()
		.add_source(TomlFileSource::new(&path))
		.build_mailer();

	// Assert
	match result {
		Err(SettingsError::Source { source_name, .. }) => {
			assert!(source_name.contains("broken.toml"));
		}
		other => panic!("expected source error, got {:?}", other),
	}
}

/// Test: the process environment is read when no fixed variables are given
#[rstest]
#[serial]
fn test_process_environment() {
	// Arrange
	// SAFETY: serialized test, no other thread reads the environment
	unsafe {
		std::env::set_var("ENVOI_TEST_LAYERED_WEB_DIR", "/from/env");
	}

	// Act
	let settings = SettingsBuilder::new()
		.add_source(EnvSource::new().with_prefix("ENVOI_TEST_LAYERED_"))
		.build_mailer()
		.unwrap();

	// Assert
	assert_eq!(settings.web_dir.to_str(), Some("/from/env"));

	unsafe {
		std::env::remove_var("ENVOI_TEST_LAYERED_WEB_DIR");
	}
}
