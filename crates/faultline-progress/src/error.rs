//! Parse errors for progress-set wire text.

use thiserror::Error;

/// Failure to parse progress-set wire text.
///
/// Always fatal: the text comes from a database introspection query, and a
/// set we cannot read is a set we cannot trust recovery with. Callers never
/// retry a parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A range token was not `N` or `N-M`.
    #[error("malformed range token {token:?} in clause for {source_id:?}")]
    BadRange { source_id: String, token: String },

    /// A range token had its bounds reversed.
    #[error("inverted range {lo}-{hi} in clause for {source_id:?}")]
    InvertedRange { source_id: String, lo: u64, hi: u64 },

    /// A clause had ranges but no source id.
    #[error("clause {clause:?} has no source id")]
    MissingSource { clause: String },
}

/// Result type for progress-set parsing.
pub type Result<T> = std::result::Result<T, ParseError>;
