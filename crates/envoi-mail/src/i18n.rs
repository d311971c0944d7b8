//! Subject translation

use std::collections::HashMap;

/// Looks up translations in named catalogues
pub trait Translator: Send + Sync {
	/// Translate `message` using `catalogue`, returning it unchanged when no
	/// translation exists
	fn translate(&self, message: &str, catalogue: &str) -> String;
}

/// Translation disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTranslator;

impl Translator for NoopTranslator {
	fn translate(&self, message: &str, _catalogue: &str) -> String {
		message.to_string()
	}
}

/// Translations grouped by catalogue
///
/// # Examples
///
/// ```
/// use envoi_mail::{CatalogTranslator, Translator};
///
/// let translator = CatalogTranslator::new()
///     .with_translation("messages", "Welcome", "Bienvenue");
///
/// assert_eq!(translator.translate("Welcome", "messages"), "Bienvenue");
/// assert_eq!(translator.translate("Welcome", "admin"), "Welcome");
/// ```
#[derive(Debug, Default, Clone)]
pub struct CatalogTranslator {
	catalogues: HashMap<String, HashMap<String, String>>,
}

impl CatalogTranslator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_translation(
		&mut self,
		catalogue: impl Into<String>,
		message: impl Into<String>,
		translation: impl Into<String>,
	) {
		self.catalogues
			.entry(catalogue.into())
			.or_default()
			.insert(message.into(), translation.into());
	}

	pub fn with_translation(
		mut self,
		catalogue: impl Into<String>,
		message: impl Into<String>,
		translation: impl Into<String>,
	) -> Self {
		self.add_translation(catalogue, message, translation);
		self
	}
}

impl Translator for CatalogTranslator {
	fn translate(&self, message: &str, catalogue: &str) -> String {
		self.catalogues
			.get(catalogue)
			.and_then(|messages| messages.get(message))
			.cloned()
			.unwrap_or_else(|| message.to_string())
	}
}

/// Translate `value` and `format`, then substitute the value for the first
/// `%s` of the format
pub fn translate_formatted(
	translator: &dyn Translator,
	value: &str,
	format: &str,
	catalogue: &str,
) -> String {
	let value = translator.translate(value, catalogue);
	let format = translator.translate(format, catalogue);
	apply_format(&format, &value)
}

/// `%s` takes the value once, `%%` is a literal percent sign
///
/// # Examples
///
/// ```
/// use envoi_mail::i18n::apply_format;
///
/// assert_eq!(apply_format("[Shop] %s", "Order shipped"), "[Shop] Order shipped");
/// assert_eq!(apply_format("100%% %s", "done"), "100% done");
/// ```
pub fn apply_format(format: &str, value: &str) -> String {
	let mut output = String::with_capacity(format.len() + value.len());
	let mut chars = format.chars().peekable();
	let mut substituted = false;

	while let Some(c) = chars.next() {
		if c != '%' {
			output.push(c);
			continue;
		}
		match chars.peek() {
			Some('%') => {
				chars.next();
				output.push('%');
			}
			Some('s') if !substituted => {
				chars.next();
				output.push_str(value);
				substituted = true;
			}
			_ => output.push('%'),
		}
	}

	output
}
