//! Mail module.
//!
//! Message composition and the connections delivering it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use envoi::mail::{Mailer, MailOptions};
//! ```

#[cfg(feature = "mail")]
pub use envoi_mail::*;
