//! # sleuth-core
//!
//! Core types, errors, and utilities shared by the Spend Sleuth crates.
//!
//! This crate provides:
//! - [`SleuthError`] - Error types for every stage of a billing analysis
//! - [`logging`] - Tracing setup and log management utilities
//! - [`BillingMonth`] - Calendar month used as the unit of billing and budgeting
//! - [`AnalysisContext`] - Immutable settings threaded through an analysis run
//!
//! ## Example
//!
//! ```no_run
//! use sleuth_core::{AnalysisContext, BillingMonth, logging};
//!
//! fn main() -> sleuth_core::Result<()> {
//!     let _guard = logging::init_logging(None, 0)?;
//!
//!     let ctx = AnalysisContext::default().with_epsilon(1e-4);
//!     let month: BillingMonth = "Oct-25".parse()?;
//!     tracing::info!(month = %month, epsilon = ctx.epsilon, "ready");
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod error;
pub mod logging;
pub mod month;

// Re-export main types for convenience
pub use context::AnalysisContext;
pub use error::{Result, SleuthError};
pub use logging::{LogGuard, init_logging};
pub use month::BillingMonth;
