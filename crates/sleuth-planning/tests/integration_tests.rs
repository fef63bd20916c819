//! End-to-end planning tests: YAML config and billing exports on disk.

use std::path::Path;

use sleuth_billing::{BillingLoader, Dataset};
use sleuth_core::{AnalysisContext, BillingMonth, SleuthError};
use sleuth_planning::{Budget, Planner, PlanningConfig, ReportFormat, save_report};
use tempfile::{NamedTempFile, TempDir, tempdir};

const EPS: f64 = 1e-6;

fn month(s: &str) -> BillingMonth {
    s.parse().unwrap()
}

/// Write a USD export (rate 1.0) for `month`, created at `created`.
fn write_export(dir: &Path, month: &str, created: &str, rows: &[&str]) {
    let mut content = format!(
        "Account Name,Account Owner ID,Billing Month,Currency,Currency Rate,Created Time\n\
         Acme Corp,owner-1,{month},USD,1.0,{created}\n\
         \n\
         Instance Name,Service Name,Region,Plan Name,Original Cost,Cost\n"
    );
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(dir.join(format!("acme-instances-{month}.csv")), content).unwrap();
}

/// Q1 2025: January and February complete, March extracted mid-month.
fn billing_dir() -> TempDir {
    let dir = tempdir().unwrap();
    write_export(
        dir.path(),
        "2025-01",
        "2025-02-04T08:00:00Z",
        &[
            "oraprod01,Bare Metal Servers,fra02,Monthly,70000,70000",
            "web-01,Virtual Server for VPC,eu-de,Hourly,3000,3000",
            "backup-bucket,Cloud Object Storage,eu-de,Standard,1000,1000",
        ],
    );
    write_export(
        dir.path(),
        "2025-02",
        "2025-03-04T08:00:00Z",
        &[
            "oraprod01,Bare Metal Servers,fra02,Monthly,50000,50000",
            "web-01,Virtual Server for VPC,eu-de,Hourly,2500,2500",
            "backup-bucket,Cloud Object Storage,eu-de,Standard,1000,1000",
        ],
    );
    write_export(
        dir.path(),
        "2025-03",
        "2025-03-16T05:49:39Z",
        &[
            "oraprod01,Bare Metal Servers,fra02,Monthly,40000,40000",
            "web-01,Virtual Server for VPC,eu-de,Hourly,1000,1000",
        ],
    );
    dir
}

fn load(dir: &TempDir) -> Dataset {
    BillingLoader::new(dir.path())
        .load(&AnalysisContext::default())
        .unwrap()
}

const PLANNING: &str = r#"
groups:
  - name: Production Oracle
    months:
      Q1-25: 180000
    filters:
      - instances: "oraprod*"
        services: "*Bare Metal*"
  - name: Web
    months:
      Jan-25: 2000
      Feb-25: planned
      Mar-25: not_planned
    filter: '--instances "web-*"'
"#;

#[test]
fn test_plan_end_to_end() {
    let dir = billing_dir();
    let dataset = load(&dir);
    let ctx = AnalysisContext::default();
    let config = PlanningConfig::from_yaml_str(PLANNING).unwrap();

    let report = Planner::new(&dataset, &ctx).run(&config);

    assert!(!report.has_failures());
    assert_eq!(report.months, vec![month("Jan-25"), month("Feb-25"), month("Mar-25")]);
    assert_eq!(report.allocations.len(), 6);
    assert!(report.notes.is_empty());

    // Quarter budget spread evenly over its months
    for m in ["Jan-25", "Feb-25", "Mar-25"] {
        let a = report.allocation("Production Oracle", month(m)).unwrap();
        assert_eq!(a.budget, Budget::Amount(60000.0));
    }

    let jan = report.allocation("Production Oracle", month("Jan-25")).unwrap();
    assert_eq!((jan.planned, jan.not_planned), (60000.0, 10000.0));
    let feb = report.allocation("Production Oracle", month("Feb-25")).unwrap();
    assert_eq!((feb.planned, feb.not_planned), (50000.0, 0.0));

    let web_jan = report.allocation("Web", month("Jan-25")).unwrap();
    assert_eq!((web_jan.planned, web_jan.not_planned), (2000.0, 1000.0));
    let web_feb = report.allocation("Web", month("Feb-25")).unwrap();
    assert_eq!(web_feb.budget, Budget::Unbounded);
    assert_eq!((web_feb.planned, web_feb.not_planned), (2500.0, 0.0));
    let web_mar = report.allocation("Web", month("Mar-25")).unwrap();
    assert_eq!((web_mar.planned, web_mar.not_planned), (0.0, 1000.0));

    for a in &report.allocations {
        assert!((a.planned + a.not_planned - a.actual).abs() < EPS);
    }

    assert_eq!(report.group("Web").unwrap().budget_total, None);
    assert_eq!(report.group("Production Oracle").unwrap().variance, Some(20000.0));
}

#[test]
fn test_completeness_and_partial_months() {
    let dir = billing_dir();
    let dataset = load(&dir);
    let ctx = AnalysisContext::default();
    let config = PlanningConfig::from_yaml_str(PLANNING).unwrap();

    let report = Planner::new(&dataset, &ctx).run(&config);

    assert_eq!(report.completeness.len(), 3);
    for m in &report.completeness {
        assert!((m.categorized_cost + m.uncategorized_cost - m.total_cost).abs() < EPS);
    }
    assert!((report.summary.total_cost - 168500.0).abs() < EPS);
    assert!((report.summary.uncategorized_cost - 2000.0).abs() < EPS);
    assert_eq!(report.summary.partial_months, vec![month("Mar-25")]);

    let mar = report.completeness.iter().find(|c| c.month == month("Mar-25")).unwrap();
    assert_eq!(mar.coverage_percentage, 100.0);
    assert!(mar.is_partial);

    let jan_items = &report.uncategorized[&month("Jan-25")];
    assert_eq!(jan_items.len(), 1);
    assert_eq!(jan_items[0].service, "Cloud Object Storage");
}

#[test]
fn test_overlapping_groups_counted_once() {
    let dir = billing_dir();
    let dataset = load(&dir);
    let ctx = AnalysisContext::default();
    let config = PlanningConfig::from_yaml_str(
        r#"
groups:
  - name: Oracle
    months:
      Q1-25: 180000
    filter:
      instances: "oraprod*"
  - name: Oracle Again
    months:
      Q1-25: 180000
    filter:
      instances: "oraprod*"
"#,
    )
    .unwrap();

    let report = Planner::new(&dataset, &ctx).run(&config);

    // Each group sees the full cost, completeness counts it once
    assert_eq!(report.group("Oracle").unwrap().actual_total, 160000.0);
    assert_eq!(report.group("Oracle Again").unwrap().actual_total, 160000.0);
    assert!((report.summary.categorized_cost - 160000.0).abs() < EPS);
    assert!(report.summary.categorized_cost <= report.summary.total_cost);
}

#[test]
fn test_undefined_budget_month_is_noted() {
    let dir = billing_dir();
    let dataset = load(&dir);
    let ctx = AnalysisContext::default();
    let config = PlanningConfig::from_yaml_str(
        r#"
groups:
  - name: Oracle
    months:
      Jan-25: 60000
    filters:
      - instances: "oraprod*"
"#,
    )
    .unwrap();

    let report = Planner::new(&dataset, &ctx).run(&config);

    let noted: Vec<BillingMonth> = report.notes.iter().map(|n| n.month).collect();
    assert_eq!(noted, vec![month("Feb-25"), month("Mar-25")]);
    assert!(report.notes[0].recommendation.contains("Feb-25"));

    let feb = report.allocation("Oracle", month("Feb-25")).unwrap();
    assert!(!feb.budget_defined);
    assert_eq!((feb.planned, feb.not_planned), (0.0, 50000.0));
}

#[test]
fn test_invalid_filter_months() {
    let dir = billing_dir();
    let dataset = load(&dir);
    let ctx = AnalysisContext::default();
    let config = PlanningConfig::from_yaml_str(
        r#"
groups:
  - name: Partly Valid
    months:
      Jan-25: 100000
    filters:
      - instances: "oraprod*"
        months: ["2025-13", "2025-01"]
  - name: Nothing Valid
    months:
      Jan-25: 100
    filters:
      - instances: "web-*"
        months: "2024-06"
"#,
    )
    .unwrap();

    let report = Planner::new(&dataset, &ctx).run(&config);

    let partly = report.group("Partly Valid").unwrap();
    assert_eq!(partly.actual_total, 70000.0);
    assert_eq!(partly.skipped_months, vec!["2025-13"]);
    assert_eq!(partly.warnings.len(), 1);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].group, "Nothing Valid");
    assert!(report.failures[0].error.contains("2024-06"));
}

#[test]
fn test_config_file_errors() {
    let err = PlanningConfig::load("/nonexistent/planning.yaml").unwrap_err();
    assert!(matches!(err, SleuthError::ConfigNotFound { .. }));

    let file = NamedTempFile::new().unwrap();
    std::fs::write(
        file.path(),
        "groups:\n  - name: Bad\n    months:\n      Q5-25: 10\n    filter: '--instances x'\n",
    )
    .unwrap();
    let err = PlanningConfig::load(file.path()).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_save_reports() {
    let dir = billing_dir();
    let dataset = load(&dir);
    let ctx = AnalysisContext::default();
    let config = PlanningConfig::from_yaml_str(PLANNING).unwrap();
    let report = Planner::new(&dataset, &ctx).run(&config);

    let out = tempdir().unwrap();
    let json_path = out.path().join("planning.json");
    save_report(&report, ReportFormat::Json, &json_path).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(value["allocations"].as_array().unwrap().len(), 6);
    assert_eq!(value["summary"]["partial_months"][0], "2025-03");

    let csv_path = out.path().join("planning.csv");
    let written = save_report(&report, ReportFormat::Csv, &csv_path).unwrap();
    let allocations = std::fs::read_to_string(&written[0]).unwrap();
    assert_eq!(allocations.lines().count(), 7);
    assert!(allocations.contains("Web,Feb-25,2500.00,unbounded,2500.00,0.00,,true"));
    let completeness = std::fs::read_to_string(&written[1]).unwrap();
    assert!(completeness.contains("Mar-25,41000.00,41000.00,0.00,100.0,true,2,0"));
}
