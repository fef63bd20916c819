//! Completeness reconciliation: how much of the bill the groups explain.
//!
//! Group row sets are unioned before costing, so a row claimed by several
//! groups is categorized once. For every month
//! `categorized + uncategorized == total` within epsilon.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sleuth_billing::{Dataset, RowMask};
use sleuth_core::{AnalysisContext, BillingMonth};
use tracing::{debug, info};

/// Reconciliation of one billing month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessResult {
    pub month: BillingMonth,
    pub total_cost: f64,
    pub categorized_cost: f64,
    pub uncategorized_cost: f64,
    pub coverage_percentage: f64,
    /// Data was extracted before the month ended
    pub is_partial: bool,
    pub record_count: usize,
    pub uncategorized_records: usize,
}

/// Reconciliation across all months.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessSummary {
    pub total_cost: f64,
    pub categorized_cost: f64,
    pub uncategorized_cost: f64,
    pub coverage_percentage: f64,
    pub partial_months: Vec<BillingMonth>,
}

/// Uncategorized cost of one service and plan in one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncategorizedItem {
    pub service: String,
    pub plan: String,
    pub cost: f64,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub months: Vec<CompletenessResult>,
    pub summary: CompletenessSummary,
    /// Per month, cost descending
    pub uncategorized: BTreeMap<BillingMonth, Vec<UncategorizedItem>>,
    #[serde(skip)]
    pub categorized_rows: RowMask,
}

/// Coverage in percent. A zero total counts as fully covered.
pub fn coverage(categorized: f64, total: f64, ctx: &AnalysisContext) -> f64 {
    if ctx.is_zero(total) {
        100.0
    } else {
        categorized / total * 100.0
    }
}

/// A month is partial when its data was created before the month ended.
/// Without a timestamp the month counts as complete.
pub fn is_partial_month(month: BillingMonth, latest_created: Option<DateTime<Utc>>) -> bool {
    latest_created.is_some_and(|created| created < month.end())
}

/// Months of `dataset` whose latest creation timestamp falls before the
/// month ended.
pub fn detect_partial_months(dataset: &Dataset) -> Vec<BillingMonth> {
    dataset
        .months()
        .into_iter()
        .filter(|&month| is_partial_month(month, dataset.latest_created_at(month)))
        .collect()
}

/// Reconcile group row sets against the whole dataset.
pub fn reconcile<'a>(
    dataset: &Dataset,
    group_rows: impl IntoIterator<Item = &'a RowMask>,
    ctx: &AnalysisContext,
) -> Reconciliation {
    let mut categorized_rows = RowMask::none(dataset.len());
    for rows in group_rows {
        categorized_rows.union_with(rows);
    }
    let uncategorized_rows = categorized_rows.complement();

    let totals = dataset.monthly_totals();
    let categorized = dataset.cost_by_month(&categorized_rows);
    let uncategorized = dataset.cost_by_month(&uncategorized_rows);

    let mut record_counts: HashMap<BillingMonth, (usize, usize)> = HashMap::new();
    for (row, record) in dataset.records().iter().enumerate() {
        let counts = record_counts.entry(record.billing_month).or_default();
        counts.0 += 1;
        if uncategorized_rows.contains(row) {
            counts.1 += 1;
        }
    }

    let months: Vec<CompletenessResult> = totals
        .iter()
        .map(|(&month, &total_cost)| {
            let categorized_cost = categorized.get(&month).copied().unwrap_or(0.0);
            let uncategorized_cost = uncategorized.get(&month).copied().unwrap_or(0.0);
            let (record_count, uncategorized_records) =
                record_counts.get(&month).copied().unwrap_or_default();
            let is_partial = is_partial_month(month, dataset.latest_created_at(month));

            debug!(
                month = %month,
                total = total_cost,
                categorized = categorized_cost,
                partial = is_partial,
                "month reconciled"
            );

            CompletenessResult {
                month,
                total_cost,
                categorized_cost,
                uncategorized_cost,
                coverage_percentage: coverage(categorized_cost, total_cost, ctx),
                is_partial,
                record_count,
                uncategorized_records,
            }
        })
        .collect();

    let total_cost = dataset.total_cost();
    let categorized_cost = dataset.cost_of(&categorized_rows);
    let uncategorized_cost = dataset.cost_of(&uncategorized_rows);
    let summary = CompletenessSummary {
        total_cost,
        categorized_cost,
        uncategorized_cost,
        coverage_percentage: coverage(categorized_cost, total_cost, ctx),
        partial_months: months.iter().filter(|m| m.is_partial).map(|m| m.month).collect(),
    };

    info!(
        total = summary.total_cost,
        categorized = summary.categorized_cost,
        uncategorized = summary.uncategorized_cost,
        coverage = summary.coverage_percentage,
        "completeness reconciled"
    );

    Reconciliation {
        months,
        summary,
        uncategorized: uncategorized_breakdown(dataset, &uncategorized_rows),
        categorized_rows,
    }
}

fn uncategorized_breakdown(
    dataset: &Dataset,
    rows: &RowMask,
) -> BTreeMap<BillingMonth, Vec<UncategorizedItem>> {
    let mut grouped: BTreeMap<BillingMonth, HashMap<(&str, &str), (f64, usize)>> = BTreeMap::new();
    for record in dataset.select(rows) {
        let entry = grouped
            .entry(record.billing_month)
            .or_default()
            .entry((record.service_name.as_str(), record.plan_name.as_str()))
            .or_default();
        entry.0 += record.cost;
        entry.1 += 1;
    }

    grouped
        .into_iter()
        .map(|(month, items)| {
            let mut items: Vec<UncategorizedItem> = items
                .into_iter()
                .map(|((service, plan), (cost, records))| UncategorizedItem {
                    service: service.to_string(),
                    plan: plan.to_string(),
                    cost,
                    records,
                })
                .collect();
            items.sort_by(|a, b| {
                b.cost
                    .total_cmp(&a.cost)
                    .then_with(|| a.service.cmp(&b.service))
                    .then_with(|| a.plan.cmp(&b.plan))
            });
            (month, items)
        })
        .collect()
}
