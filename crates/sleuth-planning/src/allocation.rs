//! Split actual cost into planned and not-planned portions.

use serde::Serialize;
use sleuth_core::{AnalysisContext, BillingMonth};

use crate::period::{Budget, BudgetPlan};
use crate::resolver::GroupMatch;

/// Planned and not-planned parts of one actual cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Split {
    pub planned: f64,
    pub not_planned: f64,
}

/// Split `actual` against `budget`.
///
/// `planned = min(actual, budget)` and `not_planned = actual - planned`.
/// Costs within epsilon of the budget are fully planned, and a zero actual
/// cost splits into zeros.
pub fn split(actual: f64, budget: Budget, ctx: &AnalysisContext) -> Split {
    if ctx.is_zero(actual) {
        return Split {
            planned: 0.0,
            not_planned: 0.0,
        };
    }

    match budget {
        Budget::Unbounded => Split {
            planned: actual,
            not_planned: 0.0,
        },
        Budget::Amount(limit) if actual <= limit + ctx.epsilon => Split {
            planned: actual,
            not_planned: 0.0,
        },
        Budget::Amount(limit) => Split {
            planned: limit,
            not_planned: actual - limit,
        },
    }
}

/// Allocation of one group in one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResult {
    pub group: String,
    pub month: BillingMonth,
    pub actual: f64,
    pub budget: Budget,
    pub planned: f64,
    pub not_planned: f64,
    /// False when no period key covers the month
    pub budget_defined: bool,
}

impl AllocationResult {
    /// `budget - actual`; `None` for unbounded budgets.
    pub fn variance(&self) -> Option<f64> {
        self.budget.amount().map(|b| b - self.actual)
    }

    /// Cost was incurred in a month the plan does not mention.
    pub fn is_undefined_spend(&self, ctx: &AnalysisContext) -> bool {
        !self.budget_defined && !ctx.is_zero(self.actual)
    }
}

/// Allocate a group's actual costs for each of `months`, in order.
pub fn allocate(
    group: &GroupMatch,
    plan: &BudgetPlan,
    months: &[BillingMonth],
    ctx: &AnalysisContext,
) -> Vec<AllocationResult> {
    months
        .iter()
        .map(|&month| {
            let actual = group.actual(month);
            let budget = plan.budget_for(month);
            let Split { planned, not_planned } = split(actual, budget, ctx);
            AllocationResult {
                group: group.group.clone(),
                month,
                actual,
                budget,
                planned,
                not_planned,
                budget_defined: plan.is_defined(month),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use sleuth_billing::RowMask;

    use crate::period::MonthBudget;

    fn ctx() -> AnalysisContext {
        AnalysisContext::default()
    }

    fn month(s: &str) -> BillingMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_threshold_split() {
        let s = split(1000.0, Budget::Amount(600.0), &ctx());
        assert_eq!(s, Split { planned: 600.0, not_planned: 400.0 });

        let s = split(400.0, Budget::Amount(600.0), &ctx());
        assert_eq!(s, Split { planned: 400.0, not_planned: 0.0 });
    }

    #[test]
    fn test_unbounded_and_zero_budgets() {
        assert_eq!(
            split(5000.0, Budget::Unbounded, &ctx()),
            Split { planned: 5000.0, not_planned: 0.0 }
        );
        assert_eq!(
            split(750.0, Budget::zero(), &ctx()),
            Split { planned: 0.0, not_planned: 750.0 }
        );
    }

    #[test]
    fn test_zero_actual_yields_zeros() {
        for budget in [Budget::Amount(600.0), Budget::Unbounded, Budget::zero()] {
            assert_eq!(split(0.0, budget, &ctx()), Split { planned: 0.0, not_planned: 0.0 });
        }
    }

    #[test]
    fn test_rounding_sliver_is_planned() {
        let s = split(600.0000001, Budget::Amount(600.0), &ctx());
        assert_eq!(s.not_planned, 0.0);
    }

    #[test]
    fn test_split_sums_to_actual() {
        let c = ctx();
        for actual in [0.01, 1.5, 599.99, 600.0, 600.5, 123456.789] {
            for budget in [Budget::Amount(600.0), Budget::Amount(0.0), Budget::Unbounded] {
                let s = split(actual, budget, &c);
                assert!((s.planned + s.not_planned - actual).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_allocate_months_in_order() {
        let c = ctx();
        let group = GroupMatch {
            group: "Oracle".into(),
            rows: RowMask::none(0),
            matched_records: 0,
            monthly_costs: BTreeMap::from([(month("Jan-25"), 70000.0), (month("Apr-25"), 10.0)]),
            skipped_months: Vec::new(),
            warnings: Vec::new(),
        };
        let plan = BudgetPlan {
            group: "Oracle".into(),
            months: BTreeMap::from([(
                month("Jan-25"),
                MonthBudget {
                    month: month("Jan-25"),
                    budget: Budget::Amount(60000.0),
                    source: "Q1-25".into(),
                },
            )]),
        };

        let months = [month("Jan-25"), month("Feb-25"), month("Apr-25")];
        let results = allocate(&group, &plan, &months, &c);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].planned, 60000.0);
        assert_eq!(results[0].not_planned, 10000.0);
        assert_eq!(results[0].variance(), Some(-10000.0));
        assert_eq!(results[1].actual, 0.0);
        assert!(!results[1].is_undefined_spend(&c));
        assert!(results[2].is_undefined_spend(&c));
        assert_eq!(results[2].not_planned, 10.0);
    }
}
