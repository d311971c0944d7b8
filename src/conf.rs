//! Settings module.
//!
//! Layered mailer settings: built-in defaults, TOML files and environment
//! variables.
//!
//! # Examples
//!
//! ```rust,no_run
//! use envoi::conf::{EnvSource, SettingsBuilder, TomlFileSource};
//!
//! # fn main() -> Result<(), envoi::conf::SettingsError> {
//! let settings = SettingsBuilder::new()
//!     .add_source(TomlFileSource::new("mailer.toml").optional())
//!     .add_source(EnvSource::new().with_prefix("ENVOI_"))
//!     .build_mailer()?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "conf")]
pub use envoi_conf::*;
