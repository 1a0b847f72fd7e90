//! Errors raised while decoding, staging or rewriting request headers.

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

/// Errors produced by the header helpers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The header list could not be serialised.
    #[error("failed to encode header list: {0}")]
    Encode(#[from] EncodeError),
    /// The extension bytes did not hold a header list.
    #[error("failed to decode header list: {0}")]
    Decode(#[from] DecodeError),
    /// The extension held a header list followed by unrelated bytes.
    #[error("header list used {consumed} of {len} extension bytes")]
    TrailingBytes { consumed: usize, len: usize },
    /// The poll marker did not carry a whole number of seconds.
    #[error("poll interval {0:?} is not a whole number of seconds")]
    InvalidPollInterval(String),
    /// A `cache-control` value did not follow the directive list grammar.
    #[error("malformed cache-control {value:?}: {reason}")]
    MalformedCacheControl { value: String, reason: &'static str },
}
