//! # sleuth-planning
//!
//! Budget planning for Spend Sleuth: map billing rows to named groups, split
//! each group's monthly cost into planned and not-planned parts, and
//! reconcile how much of the bill the groups explain.
//!
//! This crate provides:
//! - [`PlanningConfig`] - YAML planning file with groups, filters, and budgets
//! - [`expand_budgets`] - Expand `Q1-25`, `H2-25`, `Annual-25` keys into months
//! - [`resolve_group`] - Union a group's filters into one row set
//! - [`allocate`] - Threshold split of actual cost against the monthly budget
//! - [`reconcile`] - Categorized versus uncategorized cost per month
//! - [`Planner`] - Run all of the above and build a [`PlanningReport`]
//! - [`export`] - JSON and CSV output of a report
//!
//! ## Example
//!
//! ```no_run
//! use sleuth_billing::BillingLoader;
//! use sleuth_core::AnalysisContext;
//! use sleuth_planning::{Planner, PlanningConfig, ReportFormat, save_report};
//!
//! fn main() -> sleuth_core::Result<()> {
//!     let ctx = AnalysisContext::default();
//!     let dataset = BillingLoader::new("data/billing").load(&ctx)?;
//!     let config = PlanningConfig::load("planning.yaml")?;
//!
//!     let report = Planner::new(&dataset, &ctx).run(&config);
//!     println!("coverage {:.1}%", report.summary.coverage_percentage);
//!
//!     save_report(&report, ReportFormat::Csv, "reports/planning.csv".as_ref())?;
//!     Ok(())
//! }
//! ```

pub mod allocation;
pub mod completeness;
pub mod config;
pub mod export;
pub mod period;
pub mod planner;
pub mod resolver;

// Re-export main types
pub use allocation::{AllocationResult, Split, allocate, split};
pub use completeness::{
    CompletenessResult, CompletenessSummary, Reconciliation, UncategorizedItem, coverage,
    detect_partial_months, is_partial_month, reconcile,
};
pub use config::{BudgetEntry, BudgetSpec, Group, PlanningConfig};
pub use export::{
    ReportFormat, save_report, to_json, write_allocations_csv, write_completeness_csv, write_report,
};
pub use period::{Budget, BudgetPlan, MonthBudget, PeriodKey, expand_budgets};
pub use planner::{GroupFailure, GroupSummary, Planner, PlanningReport, UndefinedMonthNote};
pub use resolver::{GroupMatch, resolve_group};
