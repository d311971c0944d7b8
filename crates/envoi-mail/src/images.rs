//! Embedded image path resolution

use envoi_conf::MailerSettings;
use std::path::{Path, PathBuf};

const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// Maps an image reference to a file
///
/// A reference naming an existing file is used as is. Anything else is a web
/// path: relative names live in the images directory below the web root,
/// names starting with `/` are taken from the web root itself, and a name
/// without extension gets `.png`.
///
/// # Examples
///
/// ```
/// use envoi_mail::ImageResolver;
/// use std::path::PathBuf;
///
/// let resolver = ImageResolver::new("/var/www", "images");
/// assert_eq!(resolver.web_path("logo"), PathBuf::from("/var/www/images/logo.png"));
/// assert_eq!(resolver.web_path("/static/banner.jpg"), PathBuf::from("/var/www/static/banner.jpg"));
/// ```
#[derive(Debug, Clone)]
pub struct ImageResolver {
	web_dir: PathBuf,
	images_dir: String,
}

impl ImageResolver {
	pub fn new(web_dir: impl Into<PathBuf>, images_dir: impl Into<String>) -> Self {
		Self {
			web_dir: web_dir.into(),
			images_dir: images_dir.into(),
		}
	}

	pub fn from_settings(settings: &MailerSettings) -> Self {
		Self::new(settings.web_dir.clone(), settings.images_dir.clone())
	}

	pub async fn resolve(&self, image: &str) -> PathBuf {
		let direct = Path::new(image);
		match tokio::fs::metadata(direct).await {
			Ok(metadata) if metadata.is_file() => direct.to_path_buf(),
			_ => self.web_path(image),
		}
	}

	pub fn web_path(&self, image: &str) -> PathBuf {
		let mut relative = match image.strip_prefix('/') {
			Some(absolute) => absolute.to_string(),
			None => {
				let images_dir = self.images_dir.trim_matches('/');
				if images_dir.is_empty() {
					image.to_string()
				} else {
					format!("{}/{}", images_dir, image)
				}
			}
		};

		if Path::new(&relative).extension().is_none() {
			relative.push('.');
			relative.push_str(DEFAULT_IMAGE_EXTENSION);
		}

		self.web_dir.join(relative)
	}
}
