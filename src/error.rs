//! Error types crossing the aggregator's public boundary
//!
//! Per-source faults never surface as errors: they are collected as
//! `SourceFailure` values inside the result (see `records`). The only errors
//! a caller ever sees are configuration mistakes (`NoSourcesConfigured`) and
//! the single-source pass-through failure (`SourceUnavailable`).

/// Boxed error produced by a source adapter
///
/// Adapters are external collaborators; the core never inspects their error
/// types beyond the message.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum AggregateError {
    /// The resolved target source set was empty: nothing registered, nothing
    /// enabled, or the caller named only unknown/incapable sources
    NoSourcesConfigured,

    /// A single-source operation failed (rate limit timeout or adapter error)
    SourceUnavailable { source: String, message: String },
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::NoSourcesConfigured => {
                write!(f, "no sources configured for this operation")
            }
            AggregateError::SourceUnavailable { source, message } => {
                write!(f, "source '{}' unavailable: {}", source, message)
            }
        }
    }
}

impl std::error::Error for AggregateError {}
