//! Report exporters: JSON for the whole report, CSV for the tables.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sleuth_core::{Result, SleuthError};
use tracing::info;

use crate::planner::PlanningReport;

/// Output format of a planning report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Csv => f.write_str("csv"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = SleuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(SleuthError::configuration(format!(
                "unknown report format '{other}' (expected json or csv)"
            ))),
        }
    }
}

/// The whole report as pretty-printed JSON.
pub fn to_json(report: &PlanningReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(|e| SleuthError::serialize("planning report", e))
}

/// Write the allocation table: one row per group and month.
pub fn write_allocations_csv<W: Write>(report: &PlanningReport, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let ser = |e: csv::Error| SleuthError::serialize("allocation table", e);

    csv.write_record([
        "group",
        "month",
        "actual",
        "budget",
        "planned",
        "not_planned",
        "variance",
        "budget_defined",
    ])
    .map_err(ser)?;

    for a in &report.allocations {
        csv.write_record([
            a.group.clone(),
            a.month.label(),
            format!("{:.2}", a.actual),
            a.budget.to_string(),
            format!("{:.2}", a.planned),
            format!("{:.2}", a.not_planned),
            a.variance().map(|v| format!("{v:.2}")).unwrap_or_default(),
            a.budget_defined.to_string(),
        ])
        .map_err(ser)?;
    }

    csv.flush()
        .map_err(|e| SleuthError::serialize("allocation table", e))
}

/// Write the completeness table: one row per billing month plus a total row.
pub fn write_completeness_csv<W: Write>(report: &PlanningReport, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let ser = |e: csv::Error| SleuthError::serialize("completeness table", e);

    csv.write_record([
        "month",
        "total_cost",
        "categorized_cost",
        "uncategorized_cost",
        "coverage_percentage",
        "partial",
        "records",
        "uncategorized_records",
    ])
    .map_err(ser)?;

    for c in &report.completeness {
        csv.write_record([
            c.month.label(),
            format!("{:.2}", c.total_cost),
            format!("{:.2}", c.categorized_cost),
            format!("{:.2}", c.uncategorized_cost),
            format!("{:.1}", c.coverage_percentage),
            c.is_partial.to_string(),
            c.record_count.to_string(),
            c.uncategorized_records.to_string(),
        ])
        .map_err(ser)?;
    }

    let s = &report.summary;
    csv.write_record([
        "TOTAL".to_string(),
        format!("{:.2}", s.total_cost),
        format!("{:.2}", s.categorized_cost),
        format!("{:.2}", s.uncategorized_cost),
        format!("{:.1}", s.coverage_percentage),
        String::new(),
        report.completeness.iter().map(|c| c.record_count).sum::<usize>().to_string(),
        report
            .completeness
            .iter()
            .map(|c| c.uncategorized_records)
            .sum::<usize>()
            .to_string(),
    ])
    .map_err(ser)?;

    csv.flush()
        .map_err(|e| SleuthError::serialize("completeness table", e))
}

/// Write the report to `out`. CSV output holds both tables separated by a
/// blank line.
pub fn write_report<W: Write>(
    report: &PlanningReport,
    format: ReportFormat,
    mut out: W,
) -> Result<()> {
    let io = |e: std::io::Error| SleuthError::serialize("report output", e);
    match format {
        ReportFormat::Json => {
            let json = to_json(report)?;
            writeln!(out, "{json}").map_err(io)
        }
        ReportFormat::Csv => {
            write_allocations_csv(report, &mut out)?;
            writeln!(out).map_err(io)?;
            write_completeness_csv(report, &mut out)
        }
    }
}

/// Save the report under `path`. CSV writes the allocation table to `path`
/// and the completeness table next to it as `<stem>_completeness.csv`.
/// Returns the files written.
pub fn save_report(
    report: &PlanningReport,
    format: ReportFormat,
    path: &Path,
) -> Result<Vec<PathBuf>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SleuthError::DirectoryCreation {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let create = |p: &Path| {
        std::fs::File::create(p).map_err(|e| SleuthError::io("creating report file", p, e))
    };

    let written = match format {
        ReportFormat::Json => {
            write_report(report, format, create(path)?)?;
            vec![path.to_path_buf()]
        }
        ReportFormat::Csv => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("planning");
            let completeness = path.with_file_name(format!("{stem}_completeness.csv"));
            write_allocations_csv(report, create(path)?)?;
            write_completeness_csv(report, create(&completeness)?)?;
            vec![path.to_path_buf(), completeness]
        }
    };

    info!(format = %format, files = written.len(), path = %path.display(), "report saved");
    Ok(written)
}
