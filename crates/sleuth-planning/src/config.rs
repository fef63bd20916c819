//! Planning configuration loaded from YAML.
//!
//! ```yaml
//! groups:
//!   - name: Production Oracle
//!     months:
//!       Q1-25: 180000
//!       Apr-25: planned
//!       May-25: not_planned
//!     filters:
//!       - instances: "*oraprod*,*oracle*"
//!         services: "*Bare Metal*"
//!       - '--services "Cloud Object Storage" --months 2025-01'
//! ```
//!
//! Groups may also use the older `filter:`, `filter2:`, `filter3:` keys.
//! The whole file is validated on load; any error rejects the file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use sleuth_billing::{Column, FilterLogic, FilterSpec, parse_filter_command};
use sleuth_core::{AnalysisContext, Result, SleuthError};
use tracing::{debug, info};

use crate::period::{BudgetPlan, PeriodKey, expand_budgets};

/// Budget value as written in the `months` map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetSpec {
    /// Amount for the whole period
    Amount(f64),
    /// `planned`: no ceiling
    Planned,
    /// `not_planned`: zero budget
    NotPlanned,
    /// Key present with no value: zero budget
    Absent,
}

impl BudgetSpec {
    fn from_yaml(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Absent),
            Value::Number(n) => n.as_f64().map(Self::Amount),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "planned" => Some(Self::Planned),
                "not_planned" | "not planned" => Some(Self::NotPlanned),
                "" => Some(Self::Absent),
                other => other.parse::<f64>().ok().map(Self::Amount),
            },
            _ => None,
        }
    }
}

/// One entry of a group's `months` map.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetEntry {
    /// Key as written
    pub key: String,
    pub period: PeriodKey,
    pub value: BudgetSpec,
}

impl BudgetEntry {
    pub fn new(key: impl Into<String>, value: BudgetSpec) -> Result<Self> {
        let key = key.into();
        let period = PeriodKey::parse(&key)?;
        Ok(Self { key, period, value })
    }
}

/// A named budget category.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    /// OR-combined filters
    pub filters: Vec<FilterSpec>,
    /// Budget entries in file order
    pub budgets: Vec<BudgetEntry>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters: Vec::new(),
            budgets: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a budget entry. Fails when `key` is not a valid period key.
    pub fn with_budget(mut self, key: &str, value: BudgetSpec) -> Result<Self> {
        self.budgets.push(BudgetEntry::new(key, value)?);
        Ok(self)
    }

    /// Resolve this group's per-month budgets.
    pub fn budget_plan(&self, ctx: &AnalysisContext) -> Result<BudgetPlan> {
        expand_budgets(&self.name, &self.budgets, ctx)
    }
}

/// Parsed planning file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanningConfig {
    pub groups: Vec<Group>,
}

/// Structured filter mapping.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StructuredFilter {
    #[serde(default)]
    instances: Option<StringList>,
    #[serde(default)]
    services: Option<StringList>,
    #[serde(default)]
    regions: Option<StringList>,
    #[serde(default)]
    months: Option<StringList>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    pattern_column: Option<String>,
    #[serde(default)]
    logic: Option<String>,
    #[serde(default)]
    exclude: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringList {
    One(String),
    Many(Vec<String>),
}

impl StringList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FilterEntry {
    Command(String),
    Structured(StructuredFilter),
}

impl FilterEntry {
    fn into_spec(self) -> Result<FilterSpec> {
        let f = match self {
            Self::Command(command) => return parse_filter_command(&command),
            Self::Structured(f) => f,
        };

        let mut spec = FilterSpec::new()
            .with_instances(f.instances.map(StringList::into_vec).unwrap_or_default())
            .with_services(f.services.map(StringList::into_vec).unwrap_or_default())
            .with_regions(f.regions.map(StringList::into_vec).unwrap_or_default())
            .with_months(f.months.map(StringList::into_vec).unwrap_or_default())
            .with_exclude(f.exclude);

        if let Some(logic) = f.logic {
            spec = spec.with_logic(logic.parse::<FilterLogic>()?);
        }

        let column = match f.pattern_column {
            Some(name) => name.parse::<Column>()?,
            None => Column::default(),
        };
        if let Some(pattern) = f.pattern {
            spec = spec.with_pattern(column, pattern);
        }

        Ok(spec)
    }
}

impl PlanningConfig {
    /// Load and validate a planning file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SleuthError::config_not_found_with_source(path, e)
            } else {
                SleuthError::io("reading planning config", path, e)
            }
        })?;

        let config = Self::parse(&content, path)?;
        info!(
            path = %path.display(),
            groups = config.groups.len(),
            "planning config loaded"
        );
        Ok(config)
    }

    /// Parse planning YAML from a string.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::parse(content, Path::new("<inline>"))
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let invalid = |message: String| SleuthError::ConfigInvalid {
            path: PathBuf::from(path),
            message,
        };

        let document: Value = serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let groups = document
            .get("groups")
            .ok_or_else(|| invalid("missing top-level 'groups' section".into()))?
            .as_sequence()
            .ok_or_else(|| invalid("'groups' must be a list".into()))?;

        let mut parsed = Vec::with_capacity(groups.len());
        let mut names = HashSet::new();

        for (index, raw) in groups.iter().enumerate() {
            let raw = raw
                .as_mapping()
                .ok_or_else(|| invalid(format!("group #{} must be a mapping", index + 1)))?;
            let group = parse_group(raw, index)?;

            if !names.insert(group.name.clone()) {
                return Err(SleuthError::configuration(format!(
                    "duplicate group name '{}'",
                    group.name
                )));
            }
            debug!(
                group = %group.name,
                filters = group.filters.len(),
                budgets = group.budgets.len(),
                "group parsed"
            );
            parsed.push(group);
        }

        Ok(Self { groups: parsed })
    }

    /// Look up a group by name.
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }
}

fn parse_group(raw: &Mapping, index: usize) -> Result<Group> {
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            SleuthError::configuration(format!("group #{} must have a 'name'", index + 1))
        })?
        .to_string();

    let filters = collect_filters(raw, &name)?;
    if filters.is_empty() {
        return Err(SleuthError::configuration(format!(
            "group '{name}' must have a 'filter' or 'filters' field"
        )));
    }

    let months = raw.get("months").ok_or_else(|| {
        SleuthError::configuration(format!("group '{name}' must have a 'months' field"))
    })?;

    let budgets = match months {
        Value::Null => Vec::new(),
        Value::Mapping(map) => parse_budgets(map, &name)?,
        _ => {
            return Err(SleuthError::configuration(format!(
                "group '{name}': 'months' must be a mapping of period keys to budgets"
            )));
        }
    };

    Ok(Group {
        name,
        filters,
        budgets,
    })
}

fn collect_filters(raw: &Mapping, group: &str) -> Result<Vec<FilterSpec>> {
    let mut entries: Vec<Value> = Vec::new();

    if let Some(filters) = raw.get("filters") {
        match filters {
            Value::Sequence(list) => entries.extend(list.iter().cloned()),
            _ => {
                return Err(SleuthError::configuration(format!(
                    "group '{group}': 'filters' must be a list"
                )));
            }
        }
    } else if let Some(first) = raw.get("filter") {
        entries.push(first.clone());
        let mut n = 2;
        while let Some(next) = raw.get(format!("filter{n}").as_str()) {
            entries.push(next.clone());
            n += 1;
        }
    }

    entries
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let entry: FilterEntry = serde_yaml::from_value(value).map_err(|e| {
                SleuthError::configuration(format!("group '{group}' filter #{}: {e}", i + 1))
            })?;
            entry.into_spec().map_err(|e| match e {
                SleuthError::Configuration { message } => SleuthError::configuration(format!(
                    "group '{group}' filter #{}: {message}",
                    i + 1
                )),
                other => other,
            })
        })
        .collect()
}

fn parse_budgets(map: &Mapping, group: &str) -> Result<Vec<BudgetEntry>> {
    map.iter()
        .map(|(key, value)| {
            let key = match key {
                Value::String(s) => s.clone(),
                other => {
                    return Err(SleuthError::configuration(format!(
                        "group '{group}': period key {other:?} must be a string like 'Jan-25'"
                    )));
                }
            };
            let spec = BudgetSpec::from_yaml(value).ok_or_else(|| {
                SleuthError::configuration(format!(
                    "group '{group}': budget for '{key}' must be a number, 'planned', \
                     or 'not_planned'"
                ))
            })?;
            BudgetEntry::new(key, spec)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_billing::Criterion;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
groups:
  - name: Production Oracle
    months:
      Q1-25: 180000
      Apr-25: planned
      May-25: not_planned
      Jun-25:
    filters:
      - instances: "*oraprod*,*oracle*"
        services: ["Bare Metal Servers"]
        logic: or
      - '--services "Cloud Object Storage" --months 2025-01'
      - pattern: "*backup*"
        pattern_column: Service Name
        exclude: true
  - name: Legacy
    months:
    filter: '--instances "web-*"'
    filter2: '--regions "fra02"'
"#;

    #[test]
    fn test_parse_sample() {
        let config = PlanningConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.groups.len(), 2);

        let oracle = &config.groups[0];
        assert_eq!(oracle.name, "Production Oracle");
        assert_eq!(oracle.filters.len(), 3);
        assert_eq!(oracle.filters[0].logic, FilterLogic::Or);
        assert_eq!(
            oracle.filters[0].criteria[0],
            Criterion::Instances {
                values: vec!["*oraprod*".into(), "*oracle*".into()]
            }
        );
        assert_eq!(oracle.filters[1].months, vec!["2025-01"]);
        assert!(oracle.filters[2].exclude);
        assert_eq!(oracle.filters[2].criteria[0].column(), Column::ServiceName);

        let keys: Vec<&str> = oracle.budgets.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["Q1-25", "Apr-25", "May-25", "Jun-25"]);
        assert_eq!(oracle.budgets[0].value, BudgetSpec::Amount(180000.0));
        assert_eq!(oracle.budgets[1].value, BudgetSpec::Planned);
        assert_eq!(oracle.budgets[2].value, BudgetSpec::NotPlanned);
        assert_eq!(oracle.budgets[3].value, BudgetSpec::Absent);

        let legacy = config.group("Legacy").unwrap();
        assert_eq!(legacy.filters.len(), 2);
        assert!(legacy.budgets.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = PlanningConfig::load(file.path()).unwrap();
        assert_eq!(config.groups.len(), 2);

        let err = PlanningConfig::load("/nonexistent/planning.yaml").unwrap_err();
        assert!(matches!(err, SleuthError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("other: 1", "groups"),
            ("groups:\n  - months: {}\n    filter: '--instances a'", "name"),
            ("groups:\n  - name: A\n    months: {}", "filter"),
            ("groups:\n  - name: A\n    filter: '--instances a'", "months"),
            (
                "groups:\n  - name: A\n    months: {}\n    filter: '--instances a'\n  \
                 - name: A\n    months: {}\n    filter: '--instances b'",
                "duplicate",
            ),
            (
                "groups:\n  - name: A\n    months: {Q5-25: 10}\n    filter: '--instances a'",
                "Q5-25",
            ),
            (
                "groups:\n  - name: A\n    months: {Jan-25: lots}\n    filter: '--instances a'",
                "Jan-25",
            ),
            (
                "groups:\n  - name: A\n    months: {}\n    filters:\n      - colour: red",
                "filter #1",
            ),
            (
                "groups:\n  - name: A\n    months: {}\n    filters:\n      - pattern: x\n        \
                 pattern_column: Priority",
                "Priority",
            ),
        ];

        for (yaml, needle) in cases {
            let err = PlanningConfig::from_yaml_str(yaml).unwrap_err();
            assert!(err.is_config_error(), "{yaml}: {err}");
            assert!(err.to_string().contains(needle), "{yaml}: {err}");
        }
    }

    #[test]
    fn test_invalid_yaml() {
        let err = PlanningConfig::from_yaml_str("groups: [").unwrap_err();
        assert!(matches!(err, SleuthError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_group_builder() {
        let ctx = AnalysisContext::default();
        let group = Group::new("Storage")
            .with_filter(FilterSpec::new().with_services(["*Storage*"]))
            .with_budget("H1-25", BudgetSpec::Amount(600.0))
            .unwrap();
        let plan = group.budget_plan(&ctx).unwrap();
        assert_eq!(plan.months.len(), 6);
        assert!(Group::new("x").with_budget("Smarch-25", BudgetSpec::Absent).is_err());
    }
}
