//! Error types for plan generation.

use thiserror::Error;

/// The main error type for ingestion planning.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The ingestion request configuration is inconsistent. Every violated
    /// rule is reported, in rule-registration order.
    #[error("validation failed: {}", reasons.join("; "))]
    Validation { reasons: Vec<String> },

    /// The chosen sink has not implemented the requested capability.
    #[error("operation '{operation}' is not supported by the {dialect} sink")]
    UnsupportedOperation {
        dialect: &'static str,
        operation: &'static str,
    },

    /// The dataset description would produce an ambiguous or unsafe plan
    /// (e.g. a nullable primary-key column in staging).
    #[error("data quality: {0}")]
    DataQuality(String),

    /// A function name was looked up that is not part of the closed
    /// function-name set. Lookups are case-sensitive.
    #[error("unknown SQL function: '{0}'")]
    UnknownFunction(String),
}

impl PlanError {
    /// Create a validation error with a single reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reasons: vec![reason.into()],
        }
    }

    pub fn unsupported(dialect: &'static str, operation: &'static str) -> Self {
        Self::UnsupportedOperation { dialect, operation }
    }
}

/// Result type alias for planning operations.
pub type PlanResult<T> = Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_joins_reasons() {
        let err = PlanError::Validation {
            reasons: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(err.to_string(), "validation failed: first; second");
    }

    #[test]
    fn test_unsupported_display() {
        let err = PlanError::unsupported("ansi", "createAndLoadTempTable");
        assert_eq!(
            err.to_string(),
            "operation 'createAndLoadTempTable' is not supported by the ansi sink"
        );
    }
}
