//! Immutable settings threaded through an analysis run.
//!
//! Exchange rates, tolerances, and currency labels live here instead of in
//! module-level state; every loader and analysis stage receives a reference.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SleuthError};

/// Default tolerance for cost comparisons.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Default BRL to USD rate used when an export carries no `Currency Rate`.
pub const DEFAULT_EXCHANGE_RATE: f64 = 5.55;

/// Settings for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Tolerance for floating-point cost comparisons
    pub epsilon: f64,

    /// Divide exported costs by the file's currency rate
    pub convert_currency: bool,

    /// Rate used when a file has no usable `Currency Rate`
    pub fallback_exchange_rate: f64,

    /// Label of the reporting currency
    pub currency: String,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            convert_currency: true,
            fallback_exchange_rate: DEFAULT_EXCHANGE_RATE,
            currency: "USD".to_string(),
        }
    }
}

impl AnalysisContext {
    /// Create a context with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the comparison tolerance.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Enable or disable currency conversion. Without conversion costs stay
    /// in the export's original currency.
    pub fn with_currency_conversion(mut self, convert: bool) -> Self {
        self.convert_currency = convert;
        if !convert {
            self.currency = "BRL".to_string();
        }
        self
    }

    /// Set the fallback exchange rate.
    pub fn with_fallback_exchange_rate(mut self, rate: f64) -> Self {
        self.fallback_exchange_rate = rate;
        self
    }

    /// Check the settings before any export is read.
    ///
    /// The fallback rate divides every cost of an export without a usable
    /// `Currency Rate`, so it must be finite and positive.
    pub fn validate(&self) -> Result<()> {
        if !self.fallback_exchange_rate.is_finite() || self.fallback_exchange_rate <= 0.0 {
            return Err(SleuthError::configuration(format!(
                "fallback exchange rate must be a positive number, got {}",
                self.fallback_exchange_rate
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(SleuthError::configuration(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// True when `a` and `b` differ by no more than epsilon.
    pub fn approx_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.epsilon
    }

    /// True when `value` is within epsilon of zero.
    pub fn is_zero(&self, value: f64) -> bool {
        value.abs() <= self.epsilon
    }
}
