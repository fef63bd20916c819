//! Data models for billing records.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sleuth_core::{BillingMonth, SleuthError};

use crate::mask::RowMask;

/// One line item of a billing export. Costs are already converted to the
/// reporting currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    /// Service name (e.g., "Power Virtual Server Virtual Machine")
    pub service_name: String,

    /// Instance name (e.g., "oraprod01")
    pub instance_name: String,

    /// Region (e.g., "fra02")
    pub region: String,

    /// Pricing plan name
    pub plan_name: String,

    /// Consumer identifier
    pub consumer_id: String,

    /// Billed cost in the reporting currency
    pub cost: f64,

    /// Cost before discounts, in the reporting currency
    pub original_cost: f64,

    /// Billed cost in the export's own currency
    pub original_currency_cost: f64,

    /// Month the line item was billed in
    pub billing_month: BillingMonth,

    /// When the export containing this record was created
    pub created_at: Option<DateTime<Utc>>,
}

impl BillingRecord {
    /// Create a record with required fields. Optional text fields start empty
    /// and both original costs equal `cost`.
    pub fn new(
        billing_month: BillingMonth,
        service_name: impl Into<String>,
        instance_name: impl Into<String>,
        cost: f64,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            instance_name: instance_name.into(),
            region: String::new(),
            plan_name: String::new(),
            consumer_id: String::new(),
            cost,
            original_cost: cost,
            original_currency_cost: cost,
            billing_month,
            created_at: None,
        }
    }

    /// Set region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set plan name.
    pub fn with_plan(mut self, plan_name: impl Into<String>) -> Self {
        self.plan_name = plan_name.into();
        self
    }

    /// Set consumer ID.
    pub fn with_consumer(mut self, consumer_id: impl Into<String>) -> Self {
        self.consumer_id = consumer_id.into();
        self
    }

    /// Set export creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Value of a column as text, for pattern matching.
    pub fn field(&self, column: Column) -> Cow<'_, str> {
        match column {
            Column::InstanceName => Cow::Borrowed(&self.instance_name),
            Column::ServiceName => Cow::Borrowed(&self.service_name),
            Column::Region => Cow::Borrowed(&self.region),
            Column::PlanName => Cow::Borrowed(&self.plan_name),
            Column::ConsumerId => Cow::Borrowed(&self.consumer_id),
            Column::BillingMonth => Cow::Owned(self.billing_month.iso()),
        }
    }
}

/// Text columns a pattern can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    #[default]
    InstanceName,
    ServiceName,
    Region,
    PlanName,
    ConsumerId,
    BillingMonth,
}

impl Column {
    /// Column header as it appears in billing exports.
    pub fn header(&self) -> &'static str {
        match self {
            Self::InstanceName => "Instance Name",
            Self::ServiceName => "Service Name",
            Self::Region => "Region",
            Self::PlanName => "Plan Name",
            Self::ConsumerId => "Consumer ID",
            Self::BillingMonth => "Billing Month",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Column {
    type Err = SleuthError;

    /// Accepts export headers ("Service Name") and snake_case ("service_name").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "instancename" | "instance" => Ok(Self::InstanceName),
            "servicename" | "service" => Ok(Self::ServiceName),
            "region" => Ok(Self::Region),
            "planname" | "plan" => Ok(Self::PlanName),
            "consumerid" | "consumer" => Ok(Self::ConsumerId),
            "billingmonth" | "month" => Ok(Self::BillingMonth),
            _ => Err(SleuthError::configuration(format!(
                "unknown pattern column '{}' (expected one of: Instance Name, Service Name, \
                 Region, Plan Name, Consumer ID, Billing Month)",
                s.trim()
            ))),
        }
    }
}

/// Ordered, read-only collection of billing records.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<BillingRecord>,
}

impl Dataset {
    pub fn new(records: Vec<BillingRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[BillingRecord] {
        &self.records
    }

    pub fn get(&self, row: usize) -> Option<&BillingRecord> {
        self.records.get(row)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct billing months, chronological.
    pub fn months(&self) -> Vec<BillingMonth> {
        self.records
            .iter()
            .map(|r| r.billing_month)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sum of all record costs.
    pub fn total_cost(&self) -> f64 {
        self.records.iter().map(|r| r.cost).sum()
    }

    /// Sum of the costs of the selected rows.
    pub fn cost_of(&self, mask: &RowMask) -> f64 {
        mask.rows().filter_map(|i| self.records.get(i)).map(|r| r.cost).sum()
    }

    /// Total cost per month over all rows.
    pub fn monthly_totals(&self) -> BTreeMap<BillingMonth, f64> {
        self.cost_by_month(&RowMask::all(self.len()))
    }

    /// Cost per month over the selected rows. Months without selected rows
    /// are absent.
    pub fn cost_by_month(&self, mask: &RowMask) -> BTreeMap<BillingMonth, f64> {
        let mut totals = BTreeMap::new();
        for record in mask.rows().filter_map(|i| self.records.get(i)) {
            *totals.entry(record.billing_month).or_insert(0.0) += record.cost;
        }
        totals
    }

    /// Records selected by a mask, in dataset order.
    pub fn select<'a>(&'a self, mask: &'a RowMask) -> impl Iterator<Item = &'a BillingRecord> + 'a {
        mask.rows().filter_map(move |i| self.records.get(i))
    }

    /// New dataset holding only the selected rows.
    pub fn subset(&self, mask: &RowMask) -> Dataset {
        self.select(mask).cloned().collect()
    }

    /// Mask of rows billed in any of `months`.
    pub fn month_mask(&self, months: &[BillingMonth]) -> RowMask {
        RowMask::from_fn(self.len(), |i| months.contains(&self.records[i].billing_month))
    }

    /// Latest export creation timestamp among the records of `month`.
    pub fn latest_created_at(&self, month: BillingMonth) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .filter(|r| r.billing_month == month)
            .filter_map(|r| r.created_at)
            .max()
    }
}

impl FromIterator<BillingRecord> for Dataset {
    fn from_iter<T: IntoIterator<Item = BillingRecord>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
