//! Template integration for mail content
//!
//! Bodies and parts may name a partial or a component instead of carrying
//! literal content. Rendering goes through a [`ContentRenderer`]; the
//! bundled [`TemplateRegistry`] covers simple `{{key}}` templates and
//! closures, and applications plug in their own engine through the trait.

use crate::options::{ViewKind, ViewRef};
use crate::{MailError, MailResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Context for template rendering
pub type TemplateContext = HashMap<String, serde_json::Value>;

/// Renders partials and components into mail content
pub trait ContentRenderer: Send + Sync {
	/// Render the partial `name` (`module/partial`)
	fn render_partial(&self, name: &str, vars: &TemplateContext) -> MailResult<String>;

	/// Render `component` of `module`
	fn render_component(
		&self,
		module: &str,
		component: &str,
		vars: &TemplateContext,
	) -> MailResult<String>;
}

/// Render a view reference with the given renderer
pub fn render_view(renderer: &dyn ContentRenderer, view: &ViewRef) -> MailResult<String> {
	match view.kind {
		ViewKind::Partial => renderer.render_partial(&view.name, &view.vars),
		ViewKind::Component => {
			let (module, component) = view.name.split_once('/').ok_or_else(|| {
				MailError::Template(format!(
					"Component name must be \"module/component\", got \"{}\"",
					view.name
				))
			})?;
			renderer.render_component(module, component, &view.vars)
		}
	}
}

type Component = dyn Fn(&TemplateContext) -> MailResult<String> + Send + Sync;

#[derive(Debug, Clone)]
struct Partial {
	source: String,
	html: bool,
}

/// In-memory partials and components
///
/// # Examples
///
/// ```
/// use envoi_mail::templates::{ContentRenderer, TemplateContext, TemplateRegistry};
///
/// let mut registry = TemplateRegistry::new();
/// registry.register_html_partial("mail/welcome", "<h1>Hello {{name}}</h1>");
/// registry.register_component("mail", "signature", |vars| {
///     Ok(format!("-- {}", vars.get("team").and_then(|v| v.as_str()).unwrap_or("The team")))
/// });
///
/// let mut vars = TemplateContext::new();
/// vars.insert("name".to_string(), "<Ann>".into());
/// assert_eq!(
///     registry.render_partial("mail/welcome", &vars).unwrap(),
///     "<h1>Hello &lt;Ann&gt;</h1>"
/// );
/// assert_eq!(
///     registry.render_component("mail", "signature", &vars).unwrap(),
///     "-- The team"
/// );
/// ```
#[derive(Default, Clone)]
pub struct TemplateRegistry {
	partials: HashMap<String, Partial>,
	components: HashMap<String, Arc<Component>>,
}

impl TemplateRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Load every partial below `dir`
	///
	/// Files named `<dir>/<module>/_<name>.<ext>` register as `module/name`.
	/// Values are HTML-escaped for `.html` and `.htm` files.
	pub fn from_dir(dir: impl AsRef<Path>) -> MailResult<Self> {
		let dir = dir.as_ref();
		let mut registry = Self::new();

		for module in fs::read_dir(dir)? {
			let module = module?;
			if !module.file_type()?.is_dir() {
				continue;
			}
			let module_name = module.file_name().to_string_lossy().into_owned();

			for file in fs::read_dir(module.path())? {
				let path = file?.path();
				if !path.is_file() {
					continue;
				}
				let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
					continue;
				};
				let Some(partial_name) = stem.strip_prefix('_') else {
					continue;
				};
				let html = matches!(
					path.extension().and_then(|e| e.to_str()),
					Some("html") | Some("htm")
				);

				let source = fs::read_to_string(&path)?;
				let name = format!("{}/{}", module_name, partial_name);
				tracing::debug!(partial = %name, path = %path.display(), "Registered mail partial");
				registry.partials.insert(name, Partial { source, html });
			}
		}

		Ok(registry)
	}

	/// Register a plain text partial
	pub fn register_partial(&mut self, name: impl Into<String>, source: impl Into<String>) {
		self.partials.insert(
			name.into(),
			Partial {
				source: source.into(),
				html: false,
			},
		);
	}

	/// Register an HTML partial; substituted values are escaped
	pub fn register_html_partial(&mut self, name: impl Into<String>, source: impl Into<String>) {
		self.partials.insert(
			name.into(),
			Partial {
				source: source.into(),
				html: true,
			},
		);
	}

	pub fn register_component<F>(&mut self, module: &str, component: &str, render: F)
	where
		F: Fn(&TemplateContext) -> MailResult<String> + Send + Sync + 'static,
	{
		self.components
			.insert(format!("{}/{}", module, component), Arc::new(render));
	}

	pub fn has_partial(&self, name: &str) -> bool {
		self.partials.contains_key(name)
	}
}

impl ContentRenderer for TemplateRegistry {
	fn render_partial(&self, name: &str, vars: &TemplateContext) -> MailResult<String> {
		let partial = self
			.partials
			.get(name)
			.ok_or_else(|| MailError::Template(format!("Partial \"{}\" not found", name)))?;
		render_template(&partial.source, vars, partial.html)
	}

	fn render_component(
		&self,
		module: &str,
		component: &str,
		vars: &TemplateContext,
	) -> MailResult<String> {
		let key = format!("{}/{}", module, component);
		let render = self
			.components
			.get(&key)
			.ok_or_else(|| MailError::Template(format!("Component \"{}\" not found", key)))?;
		render(vars)
	}
}

/// Render a template string with context, replacing `{{key}}` placeholders in one pass
///
/// When `html_escape` is true, dynamic values are HTML-escaped to prevent XSS.
///
/// # Examples
///
/// ```
/// use envoi_mail::templates::{render_template, TemplateContext};
///
/// let mut context = TemplateContext::new();
/// context.insert("name".to_string(), "Alice".into());
/// context.insert("age".to_string(), 30.into());
///
/// let result = render_template("Hello {{name}}, you are {{age}} years old.", &context, false).unwrap();
/// assert_eq!(result, "Hello Alice, you are 30 years old.");
/// ```
pub fn render_template(
	template: &str,
	context: &TemplateContext,
	html_escape: bool,
) -> MailResult<String> {
	let mut result = String::with_capacity(template.len());
	let mut rest = template;

	// Inserted values are never scanned again
	while let Some(start) = rest.find("{{") {
		let Some(len) = rest[start + 2..].find("}}") else {
			break;
		};
		let key = &rest[start + 2..start + 2 + len];
		result.push_str(&rest[..start]);

		match context.get(key) {
			Some(value) => {
				let raw = match value {
					serde_json::Value::String(s) => s.clone(),
					serde_json::Value::Number(n) => n.to_string(),
					serde_json::Value::Bool(b) => b.to_string(),
					serde_json::Value::Null => String::new(),
					_ => value.to_string(),
				};
				if html_escape {
					result.push_str(&escape_html(&raw));
				} else {
					result.push_str(&raw);
				}
			}
			None => {
				result.push('{');
				rest = &rest[start + 1..];
				continue;
			}
		}

		rest = &rest[start + len + 4..];
	}
	result.push_str(rest);

	Ok(result)
}

/// Escape the HTML special characters of `input`
pub fn escape_html(input: &str) -> String {
	input
		.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
		.replace('"', "&quot;")
		.replace('\'', "&#x27;")
}
