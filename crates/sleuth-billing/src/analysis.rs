//! Summaries of a filtered row set.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

use serde::Serialize;
use sleuth_core::BillingMonth;

use crate::filter::{FilterLogic, FilterMatch, FilterSpec};
use crate::models::Dataset;

/// Cost of one month within a filtered set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCost {
    pub month: BillingMonth,
    pub cost: f64,
    pub original_cost: f64,
    pub unique_instances: usize,
    pub unique_services: usize,
}

/// Cost attributed to one name (a service or an instance).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEntry {
    pub name: String,
    pub cost: f64,
    pub months_active: usize,
}

/// Breakdown of the rows a filter selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterAnalysis {
    pub total_records: usize,
    pub total_cost: f64,
    pub total_original_cost: f64,
    pub logic: FilterLogic,
    pub exclude: bool,
    pub monthly: Vec<MonthlyCost>,
    /// Services by cost, descending
    pub services: Vec<CostEntry>,
    /// Instances by cost, descending
    pub instances: Vec<CostEntry>,
    pub skipped_months: Vec<String>,
    pub currency: String,
}

#[derive(Default)]
struct MonthAccumulator<'a> {
    cost: f64,
    original_cost: f64,
    instances: BTreeSet<&'a str>,
    services: BTreeSet<&'a str>,
}

#[derive(Default)]
struct NameAccumulator {
    cost: f64,
    months: BTreeSet<BillingMonth>,
}

impl FilterAnalysis {
    /// Summarize the rows of `matched`.
    pub fn build(
        dataset: &Dataset,
        spec: &FilterSpec,
        matched: &FilterMatch,
        currency: &str,
    ) -> Self {
        let mut monthly: BTreeMap<BillingMonth, MonthAccumulator<'_>> = BTreeMap::new();
        let mut services: HashMap<&str, NameAccumulator> = HashMap::new();
        let mut instances: HashMap<&str, NameAccumulator> = HashMap::new();
        let mut total_records = 0;
        let mut total_cost = 0.0;
        let mut total_original_cost = 0.0;

        for record in dataset.select(&matched.rows) {
            total_records += 1;
            total_cost += record.cost;
            total_original_cost += record.original_cost;

            let month = monthly.entry(record.billing_month).or_default();
            month.cost += record.cost;
            month.original_cost += record.original_cost;
            month.instances.insert(&record.instance_name);
            month.services.insert(&record.service_name);

            let service = services.entry(&record.service_name).or_default();
            service.cost += record.cost;
            service.months.insert(record.billing_month);

            let instance = instances.entry(&record.instance_name).or_default();
            instance.cost += record.cost;
            instance.months.insert(record.billing_month);
        }

        Self {
            total_records,
            total_cost,
            total_original_cost,
            logic: spec.logic,
            exclude: spec.exclude,
            monthly: monthly
                .into_iter()
                .map(|(month, acc)| MonthlyCost {
                    month,
                    cost: acc.cost,
                    original_cost: acc.original_cost,
                    unique_instances: acc.instances.len(),
                    unique_services: acc.services.len(),
                })
                .collect(),
            services: ranked(services),
            instances: ranked(instances),
            skipped_months: matched.skipped_months.clone(),
            currency: currency.to_string(),
        }
    }

    /// Cost before discounts minus billed cost.
    pub fn savings(&self) -> f64 {
        self.total_original_cost - self.total_cost
    }

    /// Plain-text report.
    pub fn summary(&self, top: usize) -> String {
        if self.total_records == 0 {
            return "No data found matching the filter criteria.".to_string();
        }

        let mode = if self.exclude { "EXCLUDE" } else { "INCLUDE" };
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Filtered Analysis (Logic: {}, Mode: {mode})",
            self.logic.to_string().to_uppercase()
        );
        let _ = writeln!(out, "Total Records: {}", self.total_records);
        let _ = writeln!(out, "Total Cost: {:.2} {}", self.total_cost, self.currency);
        let _ = writeln!(out, "Original Cost: {:.2} {}", self.total_original_cost, self.currency);
        let _ = writeln!(out, "Savings: {:.2} {}", self.savings(), self.currency);
        let _ = writeln!(out, "Unique Instances: {}", self.instances.len());
        let _ = writeln!(out, "Unique Services: {}", self.services.len());
        if !self.skipped_months.is_empty() {
            let _ = writeln!(out, "Skipped Months: {}", self.skipped_months.join(", "));
        }

        let _ = writeln!(out, "\nMonthly:");
        for m in &self.monthly {
            let _ = writeln!(
                out,
                "  {}  {:>14.2}  {:>4} instances  {:>3} services",
                m.month, m.cost, m.unique_instances, m.unique_services
            );
        }

        let _ = writeln!(out, "\nTop Services:");
        for s in self.services.iter().take(top) {
            let _ = writeln!(out, "  {:>14.2}  {}", s.cost, s.name);
        }

        let _ = writeln!(out, "\nTop Instances:");
        for i in self.instances.iter().take(top) {
            let _ = writeln!(out, "  {:>14.2}  {}", i.cost, i.name);
        }

        out
    }
}

fn ranked(entries: HashMap<&str, NameAccumulator>) -> Vec<CostEntry> {
    let mut ranked: Vec<CostEntry> = entries
        .into_iter()
        .map(|(name, acc)| CostEntry {
            name: name.to_string(),
            cost: acc.cost,
            months_active: acc.months.len(),
        })
        .collect();
    ranked.sort_by(|a, b| b.cost.total_cmp(&a.cost).then_with(|| a.name.cmp(&b.name)));
    ranked
}
