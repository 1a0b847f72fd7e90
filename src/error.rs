//! Canonical error and result types for the crate.
//!
//! Each concern owns a focused error enum next to its implementation. This
//! module gathers them behind the single public `PushError` surface used by
//! engine setup. Stream-level failures never surface here: the state machines
//! absorb them as a reset of the offending stream.

use thiserror::Error;

pub use crate::{
    config::ConfigError,
    correlation::CorrelationError,
    header::HeaderError,
    route::RouteError,
    slab::SlabError,
};

/// Top-level error type exposed by `http_push`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PushError {
    /// The engine configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The buffer pool could not satisfy a request.
    #[error("slab error: {0}")]
    Slab(#[from] SlabError),
    /// A header list or directive could not be processed.
    #[error("header error: {0}")]
    Header(#[from] HeaderError),
    /// The correlation store rejected an operation.
    #[error("correlation error: {0}")]
    Correlation(#[from] CorrelationError),
    /// The route table rejected an operation.
    #[error("route error: {0}")]
    Route(#[from] RouteError),
    /// A frame sink with the same name was already registered.
    #[error("frame sink {0:?} was already registered")]
    DuplicateSink(String),
    /// A route or correlation named a sink that is not registered.
    #[error("no frame sink is registered as {0:?}")]
    UnknownSink(String),
}

/// Canonical result alias used by `http_push` public APIs.
pub type Result<T> = std::result::Result<T, PushError>;
