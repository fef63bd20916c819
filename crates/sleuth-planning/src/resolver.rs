//! Resolve a group's filters into one deduplicated row set.

use std::collections::BTreeMap;

use serde::Serialize;
use sleuth_billing::{Dataset, RowMask, evaluate};
use sleuth_core::{BillingMonth, Result, log_group_event};
use tracing::warn;

use crate::config::Group;

/// Rows and monthly cost a group claims.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMatch {
    pub group: String,
    #[serde(skip)]
    pub rows: RowMask,
    pub matched_records: usize,
    /// Actual cost per month; months without matched rows are absent
    pub monthly_costs: BTreeMap<BillingMonth, f64>,
    /// Requested filter months that were not in the data
    pub skipped_months: Vec<String>,
    pub warnings: Vec<String>,
}

impl GroupMatch {
    /// Actual cost in `month` (zero when nothing matched).
    pub fn actual(&self, month: BillingMonth) -> f64 {
        self.monthly_costs.get(&month).copied().unwrap_or(0.0)
    }

    pub fn total_cost(&self) -> f64 {
        self.monthly_costs.values().sum()
    }
}

/// Evaluate every filter of `group` and combine the matches.
///
/// Include filters are unioned, so a row matched by several filters counts
/// once. Exclude filters remove the rows their criteria select within their
/// own month scope. A group with only exclude filters starts from every row.
pub fn resolve_group(dataset: &Dataset, group: &Group) -> Result<GroupMatch> {
    let mut included = RowMask::none(dataset.len());
    let mut excluded = RowMask::none(dataset.len());
    let mut has_include = false;
    let mut skipped_months = Vec::new();
    let mut warnings = Vec::new();

    for (index, filter) in group.filters.iter().enumerate() {
        let matched = evaluate(dataset, filter)?;

        if let Some(warning) = matched.warning() {
            warn!(group = %group.name, filter = index + 1, "{warning}");
            warnings.push(format!("filter {}: {warning}", index + 1));
            for month in &matched.skipped_months {
                if !skipped_months.contains(month) {
                    skipped_months.push(month.clone());
                }
            }
        }

        if filter.exclude {
            excluded.union_with(&matched.criteria_in_scope());
        } else {
            included.union_with(&matched.rows);
            has_include = true;
        }
    }

    let base = if has_include {
        included
    } else {
        RowMask::all(dataset.len())
    };
    let rows = base.difference(&excluded);
    let monthly_costs = dataset.cost_by_month(&rows);
    let matched_records = rows.count();

    log_group_event!(
        group.name.as_str(),
        "resolved",
        filters = group.filters.len(),
        records = matched_records,
        excluded = excluded.count()
    );

    Ok(GroupMatch {
        group: group.name.clone(),
        rows,
        matched_records,
        monthly_costs,
        skipped_months,
        warnings,
    })
}
