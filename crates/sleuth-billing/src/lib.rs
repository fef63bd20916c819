//! # sleuth-billing
//!
//! Billing data for Spend Sleuth.
//!
//! This crate provides:
//! - [`Dataset`] - In-memory, read-only set of [`BillingRecord`]s
//! - [`BillingLoader`] - Load IBM Cloud `*instances-*.csv` billing exports
//! - [`FilterSpec`] / [`evaluate`] - Select rows by instance, service, region,
//!   pattern, and month
//! - [`parse_filter_command`] - Parse legacy `--instances "..."` filter strings
//! - [`FilterAnalysis`] - Summaries of a filtered row set
//!
//! ## Example
//!
//! ```no_run
//! use sleuth_billing::{BillingLoader, FilterSpec, FilterLogic, evaluate};
//! use sleuth_core::AnalysisContext;
//!
//! fn main() -> sleuth_core::Result<()> {
//!     let ctx = AnalysisContext::default();
//!     let dataset = BillingLoader::new("data/billing").load(&ctx)?;
//!
//!     let spec = FilterSpec::new()
//!         .with_instances(["*oracle*"])
//!         .with_services(["*Storage*"])
//!         .with_logic(FilterLogic::Or)
//!         .with_months(["2025-09", "2025-10"]);
//!
//!     let matched = evaluate(&dataset, &spec)?;
//!     println!("{} rows, {:.2}", matched.rows.count(), dataset.cost_of(&matched.rows));
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod command;
pub mod filter;
pub mod loader;
pub mod mask;
pub mod models;

// Re-export main types
pub use analysis::{CostEntry, FilterAnalysis, MonthlyCost};
pub use command::parse_filter_command;
pub use filter::{Criterion, FilterLogic, FilterMatch, FilterSpec, evaluate};
pub use loader::{BillingExport, BillingLoader, ExportMetadata, parse_export};
pub use mask::RowMask;
pub use models::{BillingRecord, Column, Dataset};
