//! Run a planning configuration against a dataset.
//!
//! Groups are processed in declared order. A group whose budgets or filters
//! fail is reported in [`PlanningReport::failures`] and left out of
//! allocation and reconciliation; the other groups still run.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sleuth_billing::Dataset;
use sleuth_core::{AnalysisContext, BillingMonth, log_group_event};
use tracing::{error, info, warn};

use crate::allocation::{AllocationResult, allocate};
use crate::completeness::{CompletenessResult, CompletenessSummary, UncategorizedItem, reconcile};
use crate::config::{Group, PlanningConfig};
use crate::period::BudgetPlan;
use crate::resolver::{GroupMatch, resolve_group};

/// Totals of one group over the analysis months.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub matched_records: usize,
    pub actual_total: f64,
    pub planned_total: f64,
    pub not_planned_total: f64,
    /// `None` when any month has an unbounded budget
    pub budget_total: Option<f64>,
    /// `budget_total - actual_total`
    pub variance: Option<f64>,
    pub skipped_months: Vec<String>,
    pub warnings: Vec<String>,
}

/// Cost in a month no period key of the group covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndefinedMonthNote {
    pub group: String,
    pub month: BillingMonth,
    pub actual: f64,
    pub recommendation: String,
}

/// A group that could not be analysed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupFailure {
    pub group: String,
    pub error: String,
}

/// Everything the exporters need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanningReport {
    pub currency: String,
    /// Dataset months plus budgeted months, chronological
    pub months: Vec<BillingMonth>,
    pub groups: Vec<GroupSummary>,
    /// Group order, then month order
    pub allocations: Vec<AllocationResult>,
    pub completeness: Vec<CompletenessResult>,
    pub summary: CompletenessSummary,
    pub uncategorized: BTreeMap<BillingMonth, Vec<UncategorizedItem>>,
    pub notes: Vec<UndefinedMonthNote>,
    pub failures: Vec<GroupFailure>,
}

impl PlanningReport {
    pub fn allocations_for<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = &'a AllocationResult> + 'a {
        self.allocations.iter().filter(move |a| a.group == group)
    }

    pub fn allocation(&self, group: &str, month: BillingMonth) -> Option<&AllocationResult> {
        self.allocations.iter().find(|a| a.group == group && a.month == month)
    }

    pub fn group(&self, name: &str) -> Option<&GroupSummary> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

struct ResolvedGroup {
    matched: GroupMatch,
    plan: BudgetPlan,
}

/// Runs planning over one loaded dataset.
pub struct Planner<'a> {
    dataset: &'a Dataset,
    ctx: &'a AnalysisContext,
}

impl<'a> Planner<'a> {
    pub fn new(dataset: &'a Dataset, ctx: &'a AnalysisContext) -> Self {
        Self { dataset, ctx }
    }

    pub fn run(&self, config: &PlanningConfig) -> PlanningReport {
        info!(groups = config.groups.len(), records = self.dataset.len(), "planning started");

        let mut resolved = Vec::with_capacity(config.groups.len());
        let mut failures = Vec::new();

        for group in &config.groups {
            match self.resolve(group) {
                Ok(r) => resolved.push(r),
                Err(e) => {
                    error!(group = %group.name, error = %e, "group failed");
                    failures.push(GroupFailure {
                        group: group.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let months = self.analysis_months(&resolved);

        let mut allocations = Vec::new();
        let mut groups = Vec::with_capacity(resolved.len());
        let mut notes = Vec::new();

        for r in &resolved {
            let group_allocations = allocate(&r.matched, &r.plan, &months, self.ctx);

            for a in group_allocations.iter().filter(|a| a.is_undefined_spend(self.ctx)) {
                warn!(
                    group = %a.group,
                    month = %a.month.label(),
                    actual = a.actual,
                    "cost in a month without a budget entry, allocated as not planned"
                );
                notes.push(UndefinedMonthNote {
                    group: a.group.clone(),
                    month: a.month,
                    actual: a.actual,
                    recommendation: format!(
                        "Add '{}' to the months of group '{}' to budget this cost",
                        a.month.label(),
                        a.group
                    ),
                });
            }

            groups.push(summarize(&r.matched, &group_allocations));
            allocations.extend(group_allocations);
        }

        let reconciliation = reconcile(
            self.dataset,
            resolved.iter().map(|r| &r.matched.rows),
            self.ctx,
        );

        info!(
            groups = groups.len(),
            failures = failures.len(),
            months = months.len(),
            "planning finished"
        );

        PlanningReport {
            currency: self.ctx.currency.clone(),
            months,
            groups,
            allocations,
            completeness: reconciliation.months,
            summary: reconciliation.summary,
            uncategorized: reconciliation.uncategorized,
            notes,
            failures,
        }
    }

    fn resolve(&self, group: &Group) -> sleuth_core::Result<ResolvedGroup> {
        let plan = group.budget_plan(self.ctx)?;
        let matched = resolve_group(self.dataset, group)?;
        log_group_event!(
            group.name.as_str(),
            "planned",
            budget_months = plan.months.len(),
            actual = matched.total_cost()
        );
        Ok(ResolvedGroup { matched, plan })
    }

    fn analysis_months(&self, resolved: &[ResolvedGroup]) -> Vec<BillingMonth> {
        let mut months: BTreeSet<BillingMonth> = self.dataset.months().into_iter().collect();
        for r in resolved {
            months.extend(r.plan.defined_months());
        }
        months.into_iter().collect()
    }
}

fn summarize(matched: &GroupMatch, allocations: &[AllocationResult]) -> GroupSummary {
    let actual_total: f64 = allocations.iter().map(|a| a.actual).sum();
    let budget_total = allocations
        .iter()
        .map(|a| a.budget.amount())
        .sum::<Option<f64>>();

    GroupSummary {
        name: matched.group.clone(),
        matched_records: matched.matched_records,
        actual_total,
        planned_total: allocations.iter().map(|a| a.planned).sum(),
        not_planned_total: allocations.iter().map(|a| a.not_planned).sum(),
        budget_total,
        variance: budget_total.map(|b| b - actual_total),
        skipped_months: matched.skipped_months.clone(),
        warnings: matched.warnings.clone(),
    }
}
