//! Mailer driven by layered settings
//!
//! Options written the way a configuration file writes them must reach the
//! composed message unchanged.

use envoi_conf::{SettingsBuilder, TomlFileSource};
use envoi_mail::{
	AttachmentSpec, BodySpec, ConnectionKind, MailError, MailOptions, Mailer, Priority,
	RecordingLogger,
};
use rstest::rstest;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const MAILER_TOML: &str = r#"
i18n_catalogue = "mail"

[defaults]
from = "Site <site@example.com>"
reply_to = "help@example.com"
subject_template = "[Site] %s"

[defaults.connection]
type = "debug"

[defaults.connection.params]
requires_ehlo = true
"#;

fn load(dir: &TempDir) -> Mailer {
	let path = dir.path().join("mailer.toml");
	fs::write(&path, MAILER_TOML).unwrap();
	let partials = dir.path().join("templates").join("mail");
	fs::create_dir_all(&partials).unwrap();
	fs::write(partials.join("_signature.txt"), "-- {{team}}").unwrap();

	let mut settings = SettingsBuilder::new()
		.add_source(TomlFileSource::new(&path))
		.build_mailer()
		.unwrap();
	settings.templates_dir = Some(dir.path().join("templates"));

	Mailer::new(settings).unwrap()
}

#[rstest]
#[tokio::test]
async fn test_defaults_from_toml() {
	// Arrange
	let dir = TempDir::with_prefix("envoi_configured_").unwrap();
	let logger = Arc::new(RecordingLogger::new(Priority::Info));
	let mailer = load(&dir).with_logger(logger.clone());

	// Act
	let accepted = mailer
		.send("Hello", "Body", "to@example.com", MailOptions::new())
		.await
		.unwrap();

	// Assert
	assert_eq!(accepted, 1);
	let transcript = logger.messages().join("\n");
	assert!(transcript.contains("EHLO localhost"));
	assert!(transcript.contains("MAIL FROM:<site@example.com>"));
	assert!(transcript.contains("Subject: [Site] Hello"));
	assert!(transcript.contains("Reply-To: help@example.com"));
}

#[rstest]
#[tokio::test]
async fn test_options_decoded_from_json() {
	// Arrange
	let dir = TempDir::with_prefix("envoi_configured_").unwrap();
	let notes = dir.path().join("notes.txt");
	fs::write(&notes, "notes").unwrap();
	let mailer = load(&dir);
	let raw = json!({
		"to": ["Ann", "ann@example.com"],
		"subject": "Weekly",
		"subject-template": "%s",
		"body": { "content": "<p>Report</p>", "content-type": "text/html", "charset": "iso-8859-1" },
		"parts": [
			{ "content": { "type": "partial", "name": "mail/signature", "vars": { "team": "Ops" } } }
		],
		"attachments": [notes.to_string_lossy()]
	});

	// Act
	let options: MailOptions = serde_json::from_value(raw).unwrap();
	let mail = mailer.compose(options.clone()).await.unwrap();

	// Assert
	assert!(matches!(options.body, Some(BodySpec::Part(_))));
	assert!(matches!(
		options.attachments.as_deref(),
		Some([AttachmentSpec::Path(_)])
	));
	let formatted = String::from_utf8(mail.formatted()).unwrap();
	assert!(formatted.contains("To: Ann <ann@example.com>"));
	assert!(formatted.contains("Subject: Weekly"));
	assert!(formatted.contains("text/html; charset=iso-8859-1"));
	assert!(formatted.contains("-- Ops"));
	assert!(formatted.contains("filename=\"notes.txt\""));
}

#[rstest]
#[case(json!({ "connection": { "type": "fax" } }))]
#[case(json!({ "connection": { "type": "smtp", "params": { "port": 25 } } }))]
#[tokio::test]
async fn test_bad_connection_options(#[case] raw: serde_json::Value) {
	// Arrange
	let dir = TempDir::with_prefix("envoi_configured_").unwrap();
	let mailer = load(&dir);
	let result = serde_json::from_value::<MailOptions>(raw);

	// Act
	let result = match result {
		Ok(options) => mailer
			.send("x", "y", "to@example.com", options)
			.await
			.map(|_| ()),
		Err(e) => Err(MailError::InvalidOption(e.to_string())),
	};

	// Assert
	assert!(matches!(
		result,
		Err(MailError::InvalidOption(_)) | Err(MailError::MissingOption(_))
	));
}

#[rstest]
fn test_connection_kind_names() {
	// Act
	let kinds: Vec<ConnectionKind> =
		serde_json::from_value(json!(["native", "smtp", "sendmail", "multi", "rotator", "debug"]))
			.unwrap();

	// Assert
	let names: Vec<String> = kinds.iter().map(ToString::to_string).collect();
	assert_eq!(
		names,
		vec!["native", "smtp", "sendmail", "multi", "rotator", "debug"]
	);
}
