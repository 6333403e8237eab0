//! Error types for mail dissection

use thiserror::Error;

/// Errors that can occur while parsing a MIME message
#[derive(Error, Debug)]
pub enum ParseError {
    /// Failed to parse the message structure
    #[error("Failed to parse message structure: {0}")]
    Structure(String),

    /// Failed to decode a part's content
    #[error("Failed to decode part content: {0}")]
    Decode(String),

    /// A mandatory header field is missing or unparsable at the top level
    #[error("Missing or unparsable mandatory header: {0}")]
    HeaderDefect(String),

    /// Message nesting exceeds the defensive recursion cap
    #[error("Message nesting deeper than {0} levels")]
    NestingTooDeep(usize),

    /// An attachment could not be unwrapped
    #[error(transparent)]
    Unwrap(#[from] UnwrapError),
}

/// Errors raised by the attachment unwrapping pipeline.
///
/// An `UnwrapError` is fatal for the one file being unwrapped; the transducer
/// records it on that attachment and keeps processing siblings.
#[derive(Error, Debug)]
pub enum UnwrapError {
    /// The archive could not be read
    #[error("Malformed archive {filename}: {details}")]
    Archive { filename: String, details: String },

    /// The signed envelope could not be decoded
    #[error("Signed envelope decode failed for {filename}: {details}")]
    Envelope { filename: String, details: String },

    /// Archives-of-archives nested past the defensive cap
    #[error("Attachment nesting deeper than {limit} levels at {filename}")]
    NestingLimit { filename: String, limit: usize },
}

/// Result type for mail dissection operations
pub type Result<T> = std::result::Result<T, ParseError>;
