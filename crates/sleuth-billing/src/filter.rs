//! Filter predicates over billing records.
//!
//! A [`FilterSpec`] is a list of [`Criterion`] values combined by a
//! [`FilterLogic`], an optional month constraint, and an exclude flag.
//! [`evaluate`] turns a spec into a [`FilterMatch`] holding row masks.
//!
//! Matching rules:
//! - Values containing `*` or `?` are anchored, case-insensitive globs.
//!   Other values match the whole field, case-insensitively.
//! - Comma-separated values within one criterion are OR-combined.
//! - The month constraint is always intersected, independent of `logic`.
//! - With `exclude`, the result is the month scope minus the criteria match.

use std::fmt;
use std::str::FromStr;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use sleuth_core::{BillingMonth, Result, SleuthError};
use tracing::{debug, warn};

use crate::mask::RowMask;
use crate::models::{BillingRecord, Column, Dataset};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// How criteria inside one filter combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterLogic {
    /// Every criterion must match
    #[default]
    And,
    /// Any criterion may match
    Or,
}

impl fmt::Display for FilterLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
        }
    }
}

impl FromStr for FilterLogic {
    type Err = SleuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(SleuthError::configuration(format!(
                "unknown filter logic '{other}' (expected 'and' or 'or')"
            ))),
        }
    }
}

/// One predicate kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    /// Instance name is one of the values
    Instances { values: Vec<String> },
    /// Service name is one of the values
    Services { values: Vec<String> },
    /// Region is one of the values
    Regions { values: Vec<String> },
    /// A single wildcard pattern against a chosen column
    Pattern { column: Column, pattern: String },
}

impl Criterion {
    /// Column the criterion inspects.
    pub fn column(&self) -> Column {
        match self {
            Self::Instances { .. } => Column::InstanceName,
            Self::Services { .. } => Column::ServiceName,
            Self::Regions { .. } => Column::Region,
            Self::Pattern { column, .. } => *column,
        }
    }

    fn values(&self) -> Vec<&str> {
        match self {
            Self::Instances { values } | Self::Services { values } | Self::Regions { values } => {
                values.iter().map(String::as_str).collect()
            }
            Self::Pattern { pattern, .. } => vec![pattern.as_str()],
        }
    }
}

/// Description of one filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterSpec {
    pub criteria: Vec<Criterion>,

    /// Requested months as written (`2025-10` or `Oct-25`); empty means all
    pub months: Vec<String>,

    pub logic: FilterLogic,

    pub exclude: bool,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance-name criterion. Each value may itself be a
    /// comma-separated list.
    pub fn with_instances<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values = split_values(values);
        self.with_criterion_if(!values.is_empty(), Criterion::Instances { values })
    }

    /// Add a service-name criterion.
    pub fn with_services<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values = split_values(values);
        self.with_criterion_if(!values.is_empty(), Criterion::Services { values })
    }

    /// Add a region criterion.
    pub fn with_regions<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values = split_values(values);
        self.with_criterion_if(!values.is_empty(), Criterion::Regions { values })
    }

    /// Add a pattern against `column`.
    pub fn with_pattern(self, column: Column, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into().trim().to_string();
        self.with_criterion_if(!pattern.is_empty(), Criterion::Pattern { column, pattern })
    }

    /// Restrict to months. Values may be comma-separated.
    pub fn with_months<I, S>(mut self, months: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.months.extend(split_values(months));
        self
    }

    pub fn with_logic(mut self, logic: FilterLogic) -> Self {
        self.logic = logic;
        self
    }

    pub fn with_exclude(mut self, exclude: bool) -> Self {
        self.exclude = exclude;
        self
    }

    /// True when the filter has no criteria (it then matches its whole
    /// month scope).
    pub fn has_criteria(&self) -> bool {
        !self.criteria.is_empty()
    }

    /// Short human-readable form, used in logs and reports.
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .criteria
            .iter()
            .map(|c| format!("{}={}", c.column(), c.values().join(",")))
            .collect();
        if parts.is_empty() {
            parts.push("all".to_string());
        }
        let mut text = parts.join(&format!(" {} ", self.logic.to_string().to_uppercase()));
        if !self.months.is_empty() {
            text.push_str(&format!(" in [{}]", self.months.join(",")));
        }
        if self.exclude {
            text = format!("NOT ({text})");
        }
        text
    }

    fn with_criterion_if(mut self, condition: bool, criterion: Criterion) -> Self {
        if condition {
            self.criteria.push(criterion);
        }
        self
    }
}

fn split_values<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .flat_map(|v| {
            v.as_ref()
                .split(',')
                .map(|part| part.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .collect()
}

/// Compiled form of one criterion value.
enum ValueMatcher {
    Exact(String),
    Glob(Pattern),
}

impl ValueMatcher {
    fn compile(value: &str) -> Result<Self> {
        if !value.contains(['*', '?']) {
            return Ok(Self::Exact(value.to_lowercase()));
        }

        // Only `*` and `?` are wildcards; brackets are literal.
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '[' => escaped.push_str("[[]"),
                ']' => escaped.push_str("[]]"),
                _ => escaped.push(c),
            }
        }

        Pattern::new(&escaped)
            .map(Self::Glob)
            .map_err(|e| SleuthError::configuration(format!("invalid pattern '{value}': {e}")))
    }

    fn matches(&self, field: &str) -> bool {
        match self {
            Self::Exact(expected) => field.to_lowercase() == *expected,
            Self::Glob(pattern) => pattern.matches_with(field, MATCH_OPTIONS),
        }
    }
}

struct CompiledCriterion {
    column: Column,
    matchers: Vec<ValueMatcher>,
}

impl CompiledCriterion {
    fn compile(criterion: &Criterion) -> Result<Self> {
        Ok(Self {
            column: criterion.column(),
            matchers: criterion
                .values()
                .into_iter()
                .map(ValueMatcher::compile)
                .collect::<Result<_>>()?,
        })
    }

    fn matches(&self, record: &BillingRecord) -> bool {
        let field = record.field(self.column);
        self.matchers.iter().any(|m| m.matches(&field))
    }
}

/// Result of evaluating a [`FilterSpec`] against a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterMatch {
    /// Final selection
    pub rows: RowMask,

    /// Rows allowed by the month constraint (all rows when unconstrained)
    pub scope: RowMask,

    /// Rows satisfying the criteria, ignoring months and `exclude`
    pub criteria: RowMask,

    /// Requested months found in the dataset; empty when unconstrained
    pub applied_months: Vec<BillingMonth>,

    /// Requested months that were malformed or absent from the dataset
    pub skipped_months: Vec<String>,
}

impl FilterMatch {
    /// Rows the criteria select inside the month scope. For an exclude
    /// filter these are the rows it removes.
    pub fn criteria_in_scope(&self) -> RowMask {
        self.scope.intersection(&self.criteria)
    }

    /// DataValidation warning when some requested months were skipped.
    pub fn warning(&self) -> Option<SleuthError> {
        if self.skipped_months.is_empty() {
            return None;
        }
        Some(SleuthError::data_validation(
            self.skipped_months.clone(),
            self.applied_months.iter().map(BillingMonth::iso).collect(),
        ))
    }
}

/// Evaluate a filter against every row of `dataset`.
///
/// Fails with `DataValidation` when months were requested and none of them
/// exist in the dataset. When only some are missing, the result is built from
/// the valid ones and the rest are listed in `skipped_months`.
pub fn evaluate(dataset: &Dataset, spec: &FilterSpec) -> Result<FilterMatch> {
    let (applied_months, skipped_months) = resolve_months(dataset, &spec.months);

    if !spec.months.is_empty() && applied_months.is_empty() {
        return Err(SleuthError::data_validation(
            skipped_months,
            dataset.months().iter().map(BillingMonth::iso).collect(),
        ));
    }

    if !skipped_months.is_empty() {
        warn!(
            skipped = %skipped_months.join(", "),
            applied = applied_months.len(),
            "requested months not found in billing data, continuing with the valid ones"
        );
    }

    let scope = if applied_months.is_empty() {
        RowMask::all(dataset.len())
    } else {
        dataset.month_mask(&applied_months)
    };

    let criteria = criteria_mask(dataset, spec)?;

    let rows = if spec.exclude {
        scope.difference(&criteria)
    } else {
        scope.intersection(&criteria)
    };

    debug!(
        filter = %spec.describe(),
        matched = rows.count(),
        total = dataset.len(),
        "filter evaluated"
    );

    Ok(FilterMatch {
        rows,
        scope,
        criteria,
        applied_months,
        skipped_months,
    })
}

fn criteria_mask(dataset: &Dataset, spec: &FilterSpec) -> Result<RowMask> {
    if spec.criteria.is_empty() {
        return Ok(RowMask::all(dataset.len()));
    }

    let compiled: Vec<CompiledCriterion> = spec
        .criteria
        .iter()
        .map(CompiledCriterion::compile)
        .collect::<Result<_>>()?;

    let records = dataset.records();
    let mask = match spec.logic {
        FilterLogic::And => {
            RowMask::from_fn(records.len(), |i| compiled.iter().all(|c| c.matches(&records[i])))
        }
        FilterLogic::Or => {
            RowMask::from_fn(records.len(), |i| compiled.iter().any(|c| c.matches(&records[i])))
        }
    };
    Ok(mask)
}

/// Split requested months into those present in the dataset and the rest.
fn resolve_months(dataset: &Dataset, requested: &[String]) -> (Vec<BillingMonth>, Vec<String>) {
    let available = dataset.months();
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for value in requested {
        match value.parse::<BillingMonth>() {
            Ok(month) if available.contains(&month) => {
                if !applied.contains(&month) {
                    applied.push(month);
                }
            }
            _ => {
                if !skipped.contains(value) {
                    skipped.push(value.clone());
                }
            }
        }
    }

    applied.sort();
    (applied, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(s: &str) -> BillingMonth {
        s.parse().unwrap()
    }

    fn record(m: &str, service: &str, instance: &str, cost: f64) -> BillingRecord {
        BillingRecord::new(month(m), service, instance, cost)
    }

    /// foo/bar compute instances plus storage, over two months.
    fn dataset() -> Dataset {
        vec![
            record("2025-01", "Virtual Server", "foo-app-01", 100.0).with_region("us-east"),
            record("2025-01", "Virtual Server", "bar-db-01", 200.0).with_region("eu-de"),
            record("2025-01", "Cloud Object Storage", "backup-bucket", 50.0).with_region("us-east"),
            record("2025-02", "Virtual Server", "foo-app-01", 150.0).with_region("us-east"),
            record("2025-02", "Virtual Server", "bar-db-01", 250.0).with_region("eu-de"),
            record("2025-02", "Cloud Object Storage", "backup-bucket", 60.0).with_region("us-east"),
        ]
        .into_iter()
        .collect()
    }

    fn cost(ds: &Dataset, m: &FilterMatch) -> f64 {
        ds.cost_of(&m.rows)
    }

    #[test]
    fn test_and_logic_intersects_criteria() {
        let ds = dataset();
        let spec = FilterSpec::new()
            .with_instances(["*foo*"])
            .with_services(["Virtual Server"]);
        let m = evaluate(&ds, &spec).unwrap();
        assert_eq!(m.rows.rows().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(cost(&ds, &m), 250.0);
    }

    #[test]
    fn test_or_logic_unions_criteria() {
        let ds = dataset();
        let spec = FilterSpec::new()
            .with_instances(["*foo*"])
            .with_services(["*Storage*"])
            .with_logic(FilterLogic::Or);
        let m = evaluate(&ds, &spec).unwrap();
        assert_eq!(m.rows.count(), 4);
        assert_eq!(cost(&ds, &m), 360.0);
    }

    #[test]
    fn test_comma_separated_values_are_or_combined() {
        let ds = dataset();
        let spec = FilterSpec::new().with_instances(["foo-app-01, BAR-DB-01"]);
        let m = evaluate(&ds, &spec).unwrap();
        assert_eq!(m.rows.count(), 4);
    }

    #[test]
    fn test_exact_match_is_anchored_and_case_insensitive() {
        let ds = dataset();
        let m = evaluate(&ds, &FilterSpec::new().with_instances(["FOO-APP-01"])).unwrap();
        assert_eq!(m.rows.count(), 2);

        let m = evaluate(&ds, &FilterSpec::new().with_instances(["foo"])).unwrap();
        assert_eq!(m.rows.count(), 0);
    }

    #[test]
    fn test_question_mark_wildcard() {
        let ds = dataset();
        let m = evaluate(&ds, &FilterSpec::new().with_instances(["bar-db-0?"])).unwrap();
        assert_eq!(m.rows.count(), 2);
    }

    #[test]
    fn test_month_constraint_applies_under_or_logic() {
        let ds = dataset();
        let spec = FilterSpec::new()
            .with_services(["Virtual Server"])
            .with_regions(["us-east"])
            .with_logic(FilterLogic::Or)
            .with_months(["2025-01"]);
        let m = evaluate(&ds, &spec).unwrap();
        assert_eq!(m.rows.rows().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(m.applied_months, vec![month("2025-01")]);
        assert!(m.warning().is_none());
    }

    #[test]
    fn test_pattern_on_other_column() {
        let ds = dataset();
        let spec = FilterSpec::new().with_pattern(Column::ServiceName, "*object*");
        let m = evaluate(&ds, &spec).unwrap();
        assert_eq!(cost(&ds, &m), 110.0);
    }

    #[test]
    fn test_exclude_returns_complement_within_month_scope() {
        let ds = dataset();
        let spec = FilterSpec::new()
            .with_services(["*Storage*"])
            .with_months(["Feb-25"])
            .with_exclude(true);
        let m = evaluate(&ds, &spec).unwrap();
        assert_eq!(m.rows.rows().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(m.criteria_in_scope().rows().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_exclude_with_wildcard_matching_everything() {
        let ds = dataset();
        let spec = FilterSpec::new().with_instances(["*"]).with_exclude(true);
        let m = evaluate(&ds, &spec).unwrap();
        assert!(!m.rows.any());
    }

    #[test]
    fn test_no_criteria_matches_scope() {
        let ds = dataset();
        let m = evaluate(&ds, &FilterSpec::new().with_months(["2025-02"])).unwrap();
        assert_eq!(m.rows.count(), 3);
    }

    #[test]
    fn test_partially_valid_months_warn() {
        let ds = dataset();
        let spec = FilterSpec::new()
            .with_services(["Virtual Server"])
            .with_months(["2025-13", "2025-01"]);
        let m = evaluate(&ds, &spec).unwrap();
        assert_eq!(m.rows.count(), 2);
        assert_eq!(m.skipped_months, vec!["2025-13".to_string()]);

        let warning = m.warning().unwrap();
        assert!(warning.is_data_error());
        assert_eq!(warning.invalid_months(), ["2025-13"]);
    }

    #[test]
    fn test_all_invalid_months_fail() {
        let ds = dataset();
        let spec = FilterSpec::new().with_months(["2025-13", "2024-06"]);
        let err = evaluate(&ds, &spec).unwrap_err();
        assert!(matches!(err, SleuthError::DataValidation { .. }));
        assert_eq!(err.invalid_months(), ["2025-13", "2024-06"]);
    }

    #[test]
    fn test_brackets_are_literal() {
        let ds: Dataset = vec![record("2025-01", "Svc", "node[1]", 1.0)].into_iter().collect();
        let m = evaluate(&ds, &FilterSpec::new().with_instances(["*[1]"])).unwrap();
        assert_eq!(m.rows.count(), 1);
    }

    #[test]
    fn test_logic_parsing() {
        assert_eq!("OR".parse::<FilterLogic>().unwrap(), FilterLogic::Or);
        assert_eq!(FilterLogic::default(), FilterLogic::And);
        assert!("xor".parse::<FilterLogic>().is_err());
    }

    #[test]
    fn test_describe() {
        let spec = FilterSpec::new()
            .with_instances(["a", "b"])
            .with_regions(["fra02"])
            .with_logic(FilterLogic::Or)
            .with_exclude(true);
        assert_eq!(spec.describe(), "NOT (Instance Name=a,b OR Region=fra02)");
    }
}
