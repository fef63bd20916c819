//! IBM Cloud billing export loader.
//!
//! Exports are `*instances-*.csv` files with a two-line account metadata
//! block, a blank line, and then the line-item table:
//!
//! ```text
//! Account Name,Billing Month,Currency,Currency Rate,Created Time
//! Acme,2025-09,BRL,5.50,2025-10-06T03:29:40.308Z
//!
//! Instance Name,Service Name,Region,Plan Name,Cost,Original Cost
//! oraprod01,Bare Metal Servers,fra02,Standard,5500.0,6000.0
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use glob::Pattern;
use serde::{Deserialize, Deserializer};
use sleuth_core::{AnalysisContext, BillingMonth, Result, SleuthError};
use tracing::{debug, info, warn};

use crate::models::{BillingRecord, Dataset};

/// File name pattern of billing exports.
pub const EXPORT_FILE_PATTERN: &str = "*instances-*.csv";

/// Account metadata from the first two lines of an export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportMetadata {
    pub account_name: Option<String>,
    pub billing_month: Option<BillingMonth>,
    pub currency_rate: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ExportMetadata {
    fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let created = pairs
            .get("Created Time")
            .or_else(|| pairs.get("Creation Date"))
            .and_then(|v| parse_timestamp(v));

        Self {
            account_name: pairs.get("Account Name").cloned(),
            billing_month: pairs
                .get("Billing Month")
                .and_then(|v| BillingMonth::parse_iso(v).ok()),
            currency_rate: pairs
                .get("Currency Rate")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|rate| rate.is_finite() && *rate > 0.0),
            created_at: created,
        }
    }
}

/// One parsed export file.
#[derive(Debug, Clone)]
pub struct BillingExport {
    pub path: PathBuf,
    pub metadata: ExportMetadata,
    /// Rate the costs were divided by (1.0 without conversion)
    pub exchange_rate: f64,
    pub records: Vec<BillingRecord>,
}

/// Line-item columns read from an export; others are ignored.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Instance Name", default)]
    instance_name: String,
    #[serde(rename = "Service Name", default)]
    service_name: String,
    #[serde(rename = "Region", default)]
    region: String,
    #[serde(rename = "Plan Name", default)]
    plan_name: String,
    #[serde(rename = "Consumer ID", default)]
    consumer_id: String,
    #[serde(rename = "Cost", default, deserialize_with = "lenient_amount")]
    cost: f64,
    #[serde(rename = "Original Cost", default, deserialize_with = "lenient_amount")]
    original_cost: f64,
    #[serde(rename = "Billing Month", default)]
    billing_month: String,
}

/// Missing or non-numeric amounts read as zero.
fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Loads billing exports from a directory.
#[derive(Debug, Clone)]
pub struct BillingLoader {
    data_dir: PathBuf,
}

impl BillingLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Export files in the data directory, sorted by file name.
    pub fn find_csv_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = Pattern::new(EXPORT_FILE_PATTERN)
            .map_err(|e| SleuthError::internal(format!("bad export pattern: {e}")))?;

        let entries = std::fs::read_dir(&self.data_dir)
            .map_err(|e| SleuthError::io("reading billing directory", &self.data_dir, e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| pattern.matches(name))
            })
            .collect();

        files.sort();
        debug!(dir = %self.data_dir.display(), files = files.len(), "found billing exports");
        Ok(files)
    }

    /// Read and parse one export file.
    pub fn parse_file(&self, path: &Path, ctx: &AnalysisContext) -> Result<BillingExport> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SleuthError::io("reading billing export", path, e))?;
        parse_export(&content, path, ctx)
    }

    /// Parse every export. Files that fail to parse are skipped with a
    /// warning.
    ///
    /// An invalid context is an error rather than a reason to skip files.
    pub fn load_exports(&self, ctx: &AnalysisContext) -> Result<Vec<BillingExport>> {
        ctx.validate()?;
        let files = self.find_csv_files()?;
        let mut exports = Vec::with_capacity(files.len());

        for path in &files {
            match self.parse_file(path, ctx) {
                Ok(export) => {
                    debug!(
                        file = %path.display(),
                        records = export.records.len(),
                        rate = export.exchange_rate,
                        "parsed billing export"
                    );
                    exports.push(export);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable billing export")
                }
            }
        }

        Ok(exports)
    }

    /// Load all exports into one dataset.
    pub fn load(&self, ctx: &AnalysisContext) -> Result<Dataset> {
        let exports = self.load_exports(ctx)?;
        let files = exports.len();
        let dataset: Dataset = exports.into_iter().flat_map(|e| e.records).collect();

        if dataset.is_empty() {
            return Err(SleuthError::NoBillingData {
                path: self.data_dir.clone(),
            });
        }

        info!(
            files,
            records = dataset.len(),
            months = dataset.months().len(),
            currency = %ctx.currency,
            "billing data loaded"
        );
        Ok(dataset)
    }
}

/// Parse the text of one export. `source` is only used in messages.
///
/// Fails with a configuration error when `ctx` carries an unusable fallback
/// exchange rate.
pub fn parse_export(
    content: &str,
    source: &Path,
    ctx: &AnalysisContext,
) -> Result<BillingExport> {
    ctx.validate()?;

    let mut lines = content.split_inclusive('\n');
    let header = lines
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| SleuthError::csv_parse(source, "file is empty"))?;
    let values = lines.next().unwrap_or_default();
    let body: String = lines.skip_while(|l| l.trim().is_empty()).collect();

    let metadata = ExportMetadata::from_pairs(&parse_metadata(header, values, source)?);

    let exchange_rate = if ctx.convert_currency {
        match metadata.currency_rate {
            Some(rate) => rate,
            None => {
                warn!(
                    file = %source.display(),
                    fallback = ctx.fallback_exchange_rate,
                    "missing or invalid currency rate, using fallback"
                );
                ctx.fallback_exchange_rate
            }
        }
    } else {
        1.0
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<RawRow>().enumerate() {
        let row =
            row.map_err(|e| SleuthError::csv_parse(source, format!("row {}: {e}", index + 1)))?;

        let month = match metadata.billing_month {
            Some(month) => month,
            None => BillingMonth::parse_iso(&row.billing_month).map_err(|_| {
                SleuthError::csv_parse(source, format!("row {} has no billing month", index + 1))
            })?,
        };

        let cost = row.cost / exchange_rate;
        let mut record = BillingRecord::new(month, row.service_name, row.instance_name, cost)
            .with_region(row.region)
            .with_plan(row.plan_name)
            .with_consumer(row.consumer_id);
        record.original_cost = row.original_cost / exchange_rate;
        record.original_currency_cost = row.cost;
        record.created_at = metadata.created_at;
        records.push(record);
    }

    Ok(BillingExport {
        path: source.to_path_buf(),
        metadata,
        exchange_rate,
        records,
    })
}

fn parse_metadata(header: &str, values: &str, source: &Path) -> Result<HashMap<String, String>> {
    let block = format!("{header}{values}");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(block.as_bytes());

    let mut rows = reader.records();
    let keys = match rows.next() {
        Some(row) => {
            row.map_err(|e| SleuthError::csv_parse(source, format!("metadata header: {e}")))?
        }
        None => return Ok(HashMap::new()),
    };
    let vals = match rows.next() {
        Some(row) => {
            row.map_err(|e| SleuthError::csv_parse(source, format!("metadata values: {e}")))?
        }
        None => return Ok(HashMap::new()),
    };

    Ok(keys
        .iter()
        .zip(vals.iter())
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect())
}
