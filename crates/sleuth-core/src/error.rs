//! Error types for Spend Sleuth operations.
//!
//! This module defines [`SleuthError`], the error enum shared by every crate
//! in the workspace. Analysis is a pure, deterministic computation, so no
//! error here is transient: each one points at a bad input (configuration,
//! billing export, requested months) and is surfaced to the caller as-is.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`SleuthError`].
pub type Result<T> = std::result::Result<T, SleuthError>;

/// Error type for all Spend Sleuth operations.
#[derive(Debug, Error)]
pub enum SleuthError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Planning configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Planning configuration is not valid YAML or has the wrong shape
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration is well-formed but semantically invalid
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A month or period key could not be parsed
    #[error("Invalid month '{value}': {reason}")]
    InvalidMonth { value: String, reason: String },

    /// Two budget periods of one group assign different amounts to a month
    #[error(
        "Conflicting budgets for group '{group}' in {month}: \
         '{first_key}' and '{second_key}' overlap"
    )]
    BudgetConflict {
        group: String,
        month: String,
        first_key: String,
        second_key: String,
    },

    // =========================================================================
    // Data Validation Errors
    // =========================================================================
    /// Requested analysis months are missing from the billing data
    #[error("Requested months not found in billing data: {}", .invalid_months.join(", "))]
    DataValidation {
        invalid_months: Vec<String>,
        valid_months: Vec<String>,
    },

    /// No billing records could be loaded
    #[error("No billing data found in {path}")]
    NoBillingData { path: PathBuf },

    // =========================================================================
    // I/O and Parsing Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Billing CSV export could not be parsed
    #[error("CSV parse error in {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    /// Report serialization failed
    #[error("Failed to serialize {context}: {message}")]
    Serialize { context: String, message: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in Spend Sleuth)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SleuthError {
    // =========================================================================
    // Constructor helpers for common error patterns
    // =========================================================================

    /// Create a ConfigNotFound error with source
    pub fn config_not_found_with_source(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: Some(source),
        }
    }

    /// Create a Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an InvalidMonth error
    pub fn invalid_month(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMonth {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a DataValidation error
    pub fn data_validation(invalid_months: Vec<String>, valid_months: Vec<String>) -> Self {
        Self::DataValidation {
            invalid_months,
            valid_months,
        }
    }

    /// Create an I/O error
    pub fn io(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a CSV parse error
    pub fn csv_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CsvParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialize(context: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::Serialize {
            context: context.into(),
            message: source.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigInvalid { .. }
                | Self::Configuration { .. }
                | Self::InvalidMonth { .. }
                | Self::BudgetConflict { .. }
        )
    }

    /// Returns true if this error comes from the billing data itself
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::DataValidation { .. } | Self::NoBillingData { .. } | Self::CsvParse { .. }
        )
    }

    /// Months reported as invalid by a DataValidation error.
    pub fn invalid_months(&self) -> &[String] {
        match self {
            Self::DataValidation { invalid_months, .. } => invalid_months,
            _ => &[],
        }
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => Some("Pass the planning YAML with --config <FILE>"),
            Self::ConfigInvalid { .. } => {
                Some("Check YAML syntax - the file needs a top-level 'groups' list")
            }
            Self::InvalidMonth { .. } => Some(
                "Use 'Jan-25', 'Q1-25', 'H1-25', 'Annual-25' for budgets and '2025-01' for filters",
            ),
            Self::BudgetConflict { .. } => {
                Some("Remove the overlapping period or give both keys the same monthly amount")
            }
            Self::DataValidation { .. } => {
                Some("Check which billing months exist in the data directory")
            }
            Self::NoBillingData { .. } => {
                Some("Place '*instances-*.csv' billing exports in the data directory")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_error() {
        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err = SleuthError::config_not_found_with_source("/home/user/planning.yaml", io);
        assert!(err.to_string().contains("Configuration not found"));
        assert!(err.is_config_error());
        assert!(!err.is_data_error());
        assert!(err.guidance().is_some());
    }

    #[test]
    fn test_data_validation_lists_months() {
        let err = SleuthError::data_validation(
            vec!["2025-13".into(), "2024-01".into()],
            vec!["2025-10".into()],
        );
        assert_eq!(
            err.to_string(),
            "Requested months not found in billing data: 2025-13, 2024-01"
        );
        assert!(err.is_data_error());
        assert_eq!(err.invalid_months(), ["2025-13", "2024-01"]);
    }

    #[test]
    fn test_budget_conflict_is_config_error() {
        let err = SleuthError::BudgetConflict {
            group: "Oracle".into(),
            month: "Jan-25".into(),
            first_key: "Q1-25".into(),
            second_key: "Jan-25".into(),
        };
        assert!(err.is_config_error());
        assert!(err.to_string().contains("Q1-25"));
        assert!(err.invalid_months().is_empty());
    }

    #[test]
    fn test_error_guidance() {
        let err = SleuthError::NoBillingData {
            path: "/data/billing".into(),
        };
        assert_eq!(
            err.guidance(),
            Some("Place '*instances-*.csv' billing exports in the data directory")
        );
        assert_eq!(SleuthError::internal("bug").guidance(), None);
    }
}
