//! Body descriptor helpers

use crate::options::{BodySpec, Content, PartSpec, ViewRef};
use crate::templates::TemplateContext;
use crate::{MailError, MailResult};
use std::fmt;
use std::str::FromStr;

/// How body content is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
	/// Content names a partial (`module/partial`)
	Partial,
	/// Content names a component (`module/component`)
	Component,
	/// Content is the literal body
	String,
}

impl FromStr for ContentMode {
	type Err = MailError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"partial" => Ok(ContentMode::Partial),
			"component" => Ok(ContentMode::Component),
			"string" => Ok(ContentMode::String),
			other => Err(MailError::InvalidOption(format!(
				"content mode \"{}\" (expected partial, component or string)",
				other
			))),
		}
	}
}

impl fmt::Display for ContentMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ContentMode::Partial => "partial",
			ContentMode::Component => "component",
			ContentMode::String => "string",
		})
	}
}

impl ContentMode {
	fn content(self, source: &str, vars: &TemplateContext) -> Content {
		match self {
			ContentMode::Partial => Content::View(ViewRef::partial(source, vars.clone())),
			ContentMode::Component => Content::View(ViewRef::component(source, vars.clone())),
			ContentMode::String => Content::Text(source.to_string()),
		}
	}
}

/// HTML body descriptor
///
/// # Examples
///
/// ```
/// use envoi_mail::{BodySpec, ContentMode, Content, TemplateContext, get_body};
///
/// let body = get_body(ContentMode::String, "<p>Hi</p>", TemplateContext::new());
/// let BodySpec::Part(part) = body else { unreachable!() };
/// assert_eq!(part.content_type.as_deref(), Some("text/html"));
/// assert_eq!(part.content, Content::Text("<p>Hi</p>".to_string()));
/// ```
pub fn get_body(mode: ContentMode, body_html: &str, vars: TemplateContext) -> BodySpec {
	BodySpec::Part(PartSpec::html(mode.content(body_html, &vars)))
}

/// HTML body descriptor plus a plain text alternative
///
/// The alternative is `None` when `body_plain` is absent or empty.
pub fn get_body_and_alternate(
	mode: ContentMode,
	body_html: &str,
	body_plain: Option<&str>,
	vars: TemplateContext,
) -> (BodySpec, Option<BodySpec>) {
	let alternate = body_plain
		.filter(|plain| !plain.is_empty())
		.map(|plain| BodySpec::Part(PartSpec::plain(mode.content(plain, &vars))));

	(get_body(mode, body_html, vars), alternate)
}

/// Parse a mode name, as found in configuration
pub fn parse_mode(mode: &str) -> MailResult<ContentMode> {
	mode.parse()
}
