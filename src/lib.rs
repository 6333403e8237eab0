// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Mail Dissection
//!
//! Turns a raw MIME message into a structured mail object and optionally
//! reconstructs the chain of quoted/forwarded messages embedded as plain
//! text inside its body.
//!
//! # Features
//!
//! - Recursive MIME tree transduction into a typed Mail model
//! - Attachment unwrapping: zip archives, PKCS#7 signed envelopes, nested
//!   `.eml` messages
//! - Structured or flattened body representation, chosen per call
//! - Heuristic thread reconstruction from quoted-reply text (English and
//!   Italian marker sets, locale-aware date parsing)
//! - Partial success: a failed attachment is carried with an error note
//!   instead of aborting the parse
//!
//! # Example
//!
//! ```rust
//! use mail_dissect::{parse_mail, thread_from_mail, ParseMode};
//!
//! let raw = b"From: sender@example.com\r\nTo: recipient@example.com\r\n\
//!             Subject: Hello\r\n\r\nBody text";
//! let mail = parse_mail(raw, ParseMode::Structured).unwrap();
//!
//! assert_eq!(mail.header.from.as_ref().unwrap().address, "sender@example.com");
//!
//! let thread = thread_from_mail(&mail);
//! assert_eq!(thread.len(), 1);
//! ```

mod error;
mod parser;
mod thread;
mod types;
mod unwrap;

pub use error::{ParseError, Result, UnwrapError};
pub use parser::{parse_mail, parse_mail_str};
pub use thread::{mail_from_text, thread_from_mail, thread_from_text};
pub use types::*;
pub use unwrap::{unwrap_file, unwrap_file_with, UnwrapOptions};
