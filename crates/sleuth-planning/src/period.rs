//! Budget period keys and their expansion into calendar months.
//!
//! A group's `months` map uses period keys:
//!
//! | Key | Months |
//! |---|---|
//! | `Jan-25` | January 2025 |
//! | `Q1-25` .. `Q4-25` | the quarter's 3 months |
//! | `H1-25`, `H2-25` | the half's 6 months |
//! | `Annual-25`, `Year-25` | all 12 months |
//!
//! Numeric amounts are split evenly over the months a key covers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sleuth_core::month::parse_short_year;
use sleuth_core::{AnalysisContext, BillingMonth, Result, SleuthError};
use tracing::debug;

use crate::config::{BudgetEntry, BudgetSpec};

/// A parsed period key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKey {
    Month(BillingMonth),
    Quarter { year: i32, quarter: u32 },
    Half { year: i32, half: u32 },
    Year { year: i32 },
}

impl PeriodKey {
    /// Parse a key such as `Mar-25`, `Q2-25`, `H1-2025`, or `Annual-25`.
    pub fn parse(key: &str) -> Result<Self> {
        let trimmed = key.trim();
        let (prefix, year) = trimmed.split_once('-').ok_or_else(|| {
            SleuthError::invalid_month(
                key,
                "expected a period key like Jan-25, Q1-25, or Annual-25",
            )
        })?;

        if prefix.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return BillingMonth::parse_iso(trimmed).map(Self::Month);
        }

        let upper = prefix.to_ascii_uppercase();
        let numbered = |letter: char, max: u32| -> Option<u32> {
            let n: u32 = upper.strip_prefix(letter)?.parse().ok()?;
            (1..=max).contains(&n).then_some(n)
        };

        let parsed_year = || {
            parse_short_year(year)
                .ok_or_else(|| SleuthError::invalid_month(key, "year must be YY or YYYY"))
        };

        if let Some(quarter) = numbered('Q', 4) {
            return Ok(Self::Quarter {
                year: parsed_year()?,
                quarter,
            });
        }
        if let Some(half) = numbered('H', 2) {
            return Ok(Self::Half {
                year: parsed_year()?,
                half,
            });
        }
        if upper == "ANNUAL" || upper == "YEAR" {
            return Ok(Self::Year { year: parsed_year()? });
        }
        if upper.starts_with('Q') || upper.starts_with('H') {
            return Err(SleuthError::invalid_month(key, "quarter must be Q1-Q4 and half H1-H2"));
        }

        BillingMonth::parse_label(trimmed).map(Self::Month)
    }

    /// Calendar months covered, chronological.
    pub fn months(&self) -> Vec<BillingMonth> {
        let (year, first, count) = match *self {
            Self::Month(month) => return vec![month],
            Self::Quarter { year, quarter } => (year, (quarter - 1) * 3 + 1, 3),
            Self::Half { year, half } => (year, (half - 1) * 6 + 1, 6),
            Self::Year { year } => (year, 1, 12),
        };
        (first..first + count)
            .filter_map(|m| BillingMonth::new(year, m).ok())
            .collect()
    }
}

impl FromStr for PeriodKey {
    type Err = SleuthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Month(month) => write!(f, "{}", month.label()),
            Self::Quarter { year, quarter } => write!(f, "Q{quarter}-{:02}", year.rem_euclid(100)),
            Self::Half { year, half } => write!(f, "H{half}-{:02}", year.rem_euclid(100)),
            Self::Year { year } => write!(f, "Annual-{:02}", year.rem_euclid(100)),
        }
    }
}

/// Budget threshold for one month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
    Amount(f64),
    /// No ceiling: every cost is planned
    Unbounded,
}

impl Budget {
    pub fn zero() -> Self {
        Self::Amount(0.0)
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            Self::Amount(v) => Some(*v),
            Self::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }

    fn agrees_with(&self, other: &Budget, ctx: &AnalysisContext) -> bool {
        match (self, other) {
            (Self::Unbounded, Self::Unbounded) => true,
            (Self::Amount(a), Self::Amount(b)) => ctx.approx_eq(*a, *b),
            _ => false,
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(v) => write!(f, "{v:.2}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Resolved budget of one group for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBudget {
    pub month: BillingMonth,
    pub budget: Budget,
    /// Period key the amount came from
    pub source: String,
}

/// All resolved month budgets of one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetPlan {
    pub group: String,
    pub months: BTreeMap<BillingMonth, MonthBudget>,
}

impl BudgetPlan {
    /// Budget for `month`; months no key covers have a zero budget.
    pub fn budget_for(&self, month: BillingMonth) -> Budget {
        self.months
            .get(&month)
            .map(|mb| mb.budget)
            .unwrap_or_else(Budget::zero)
    }

    /// True when a period key covers `month`.
    pub fn is_defined(&self, month: BillingMonth) -> bool {
        self.months.contains_key(&month)
    }

    pub fn defined_months(&self) -> impl Iterator<Item = BillingMonth> + '_ {
        self.months.keys().copied()
    }
}

/// Expand a group's period keys into per-month budgets.
///
/// Fails on negative amounts and when two keys give one month different
/// budgets. Keys that agree on a month (within epsilon) are accepted.
pub fn expand_budgets(
    group: &str,
    entries: &[BudgetEntry],
    ctx: &AnalysisContext,
) -> Result<BudgetPlan> {
    let mut plan = BudgetPlan {
        group: group.to_string(),
        months: BTreeMap::new(),
    };

    for entry in entries {
        let months = entry.period.months();
        let budget = match entry.value {
            BudgetSpec::Amount(amount) => {
                if !amount.is_finite() || amount < 0.0 {
                    return Err(SleuthError::configuration(format!(
                        "group '{group}': budget for '{}' must be a non-negative number, \
                         got {amount}",
                        entry.key
                    )));
                }
                Budget::Amount(amount / months.len() as f64)
            }
            BudgetSpec::Planned => Budget::Unbounded,
            BudgetSpec::NotPlanned | BudgetSpec::Absent => Budget::zero(),
        };

        for month in months {
            if let Some(existing) = plan.months.get(&month) {
                if !existing.budget.agrees_with(&budget, ctx) {
                    return Err(SleuthError::BudgetConflict {
                        group: group.to_string(),
                        month: month.label(),
                        first_key: existing.source.clone(),
                        second_key: entry.key.clone(),
                    });
                }
                continue;
            }
            plan.months.insert(
                month,
                MonthBudget {
                    month,
                    budget,
                    source: entry.key.clone(),
                },
            );
        }
    }

    debug!(group, months = plan.months.len(), "budgets expanded");
    Ok(plan)
}
