//! Route registration errors.

use thiserror::Error;

/// Result type for route registration.
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors raised when a route cannot be added to the tree.
///
/// Matching never fails with an error; only registration does.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    /// The pattern does not start with `/`.
    #[error("route pattern '{pattern}' must start with '/'")]
    MissingLeadingSlash {
        /// The rejected pattern
        pattern: String,
    },

    /// A `:` or `*` segment has no name.
    #[error("route pattern '{pattern}' has an unnamed parameter segment")]
    EmptyParamName {
        /// The rejected pattern
        pattern: String,
    },

    /// A wildcard segment is followed by more segments.
    #[error("wildcard '*{name}' must be the last segment in '{pattern}'")]
    WildcardNotLast {
        /// The rejected pattern
        pattern: String,
        /// Name of the misplaced wildcard
        name: String,
    },

    /// A different parameter name already occupies this tree position.
    #[error("parameter ':{new}' in '{pattern}' conflicts with existing ':{existing}'")]
    ParamNameConflict {
        /// The rejected pattern
        pattern: String,
        /// Name already registered at this position
        existing: String,
        /// Name the rejected pattern tried to use
        new: String,
    },

    /// A different wildcard name already occupies this tree position.
    #[error("wildcard '*{new}' in '{pattern}' conflicts with existing '*{existing}'")]
    WildcardNameConflict {
        /// The rejected pattern
        pattern: String,
        /// Name already registered at this position
        existing: String,
        /// Name the rejected pattern tried to use
        new: String,
    },

    /// The same method and pattern were registered twice.
    #[error("route {method} {pattern} is already registered")]
    Conflict {
        /// Method (or `ANY`) of the duplicate route
        method: String,
        /// Normalized pattern of the duplicate route
        pattern: String,
    },
}

impl RouteError {
    /// Returns the pattern that caused the error.
    pub fn pattern(&self) -> &str {
        match self {
            Self::MissingLeadingSlash { pattern }
            | Self::EmptyParamName { pattern }
            | Self::WildcardNotLast { pattern, .. }
            | Self::ParamNameConflict { pattern, .. }
            | Self::WildcardNameConflict { pattern, .. }
            | Self::Conflict { pattern, .. } => pattern,
        }
    }
}
