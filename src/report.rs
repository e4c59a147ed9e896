// SPDX-License-Identifier: AGPL-3.0-or-later

//! Report generation and output formatting

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::Path;

use crate::compare::{Comparison, CountDelta};
use crate::snapshot::{Severity, Snapshot};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// Comma-separated rows
    Csv,
    /// Markdown format
    Markdown,
}

/// Reporter for comparisons and snapshots
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Output a comparison to stdout or file
    pub fn output_comparison(&self, comparison: &Comparison, path: Option<&Path>) -> Result<()> {
        let output = self.render_comparison(comparison)?;
        emit(&output, path)
    }

    /// Output a snapshot to stdout or file
    pub fn output_snapshot(&self, snapshot: &Snapshot, path: Option<&Path>) -> Result<()> {
        let output = self.render_snapshot(snapshot)?;
        emit(&output, path)
    }

    pub fn render_comparison(&self, comparison: &Comparison) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(comparison_text(comparison)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(comparison)?),
            OutputFormat::Csv => comparison_csv(comparison),
            OutputFormat::Markdown => Ok(comparison_markdown(comparison)),
        }
    }

    pub fn render_snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(snapshot_text(snapshot)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(snapshot)?),
            OutputFormat::Csv => snapshot_csv(snapshot),
            OutputFormat::Markdown => Ok(snapshot_markdown(snapshot)),
        }
    }
}

fn emit(output: &str, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        std::fs::write(path, output)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    } else {
        print!("{}", output);
    }
    Ok(())
}

fn rule() -> String {
    "─".repeat(50)
}

fn comparison_text(comparison: &Comparison) -> String {
    let mut output = String::new();

    let icon = if comparison.has_degradations() { "✗" } else { "✓" };
    output.push_str(&format!("\n{} Quality Snapshot Comparison\n", icon));
    output.push_str(&rule());
    output.push('\n');

    let gate = &comparison.quality_gate_change;
    output.push_str(&format!("\nQuality gate: {}", comparison.summary.quality_gate));
    if gate.available {
        output.push_str(&format!(
            " ({} -> {})",
            gate.from_status.as_deref().unwrap_or("?"),
            gate.to_status.as_deref().unwrap_or("?")
        ));
    } else {
        output.push_str(" (not available)");
    }
    output.push('\n');

    if !comparison.summary.improvements.is_empty() {
        output.push_str("\nImprovements:\n");
        for line in &comparison.summary.improvements {
            output.push_str(&format!("  + {}\n", line));
        }
    }

    if !comparison.summary.degradations.is_empty() {
        output.push_str("\nDegradations:\n");
        for line in &comparison.summary.degradations {
            output.push_str(&format!("  - {}\n", line));
        }
    }

    output.push('\n');
    output.push_str(&rule());
    output.push_str("\nMeasures:\n\n");
    if comparison.measures_change.available {
        for (metric, delta) in &comparison.measures_change.changes {
            output.push_str(&format!(
                "  {:<28} {:>10} -> {:<10} {:>+10} {}\n",
                metric,
                delta.from,
                delta.to,
                delta.diff,
                if delta.improved { "improved" } else { "" }
            ));
        }
        for warning in &comparison.measures_change.warnings {
            output.push_str(&format!("  ⚠ {}\n", warning));
        }
    } else {
        output.push_str("  not available\n");
    }

    output.push('\n');
    output.push_str(&rule());
    output.push_str("\nIssues:\n\n");
    let issues = &comparison.issues_change;
    if issues.available {
        for severity in Severity::ALL {
            if let Some(delta) = issues.changes.get(&severity) {
                output.push_str(&count_line(severity.as_str(), delta));
            }
        }
        output.push_str(&count_line("TOTAL", &issues.total));
        if issues.unrecognized.from + issues.unrecognized.to > 0 {
            output.push_str(&format!(
                "  ({} -> {} issues with unrecognized severity not counted)\n",
                issues.unrecognized.from, issues.unrecognized.to
            ));
        }
    } else {
        output.push_str("  not available\n");
    }

    output.push('\n');
    output
}

fn count_line(label: &str, delta: &CountDelta) -> String {
    format!(
        "  {:<10} {:>6} -> {:<6} {:>+6}\n",
        label, delta.from, delta.to, delta.diff
    )
}

fn comparison_csv(comparison: &Comparison) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["section", "key", "from", "to", "diff", "improved"])?;

    // The gate has no numeric diff; its diff cell carries the direction
    let gate = &comparison.quality_gate_change;
    let direction = if gate.improved {
        "improved"
    } else if gate.degraded {
        "degraded"
    } else {
        "unchanged"
    };
    writer.write_record([
        "quality_gate",
        "status",
        gate.from_status.as_deref().unwrap_or(""),
        gate.to_status.as_deref().unwrap_or(""),
        direction,
        if gate.improved { "true" } else { "false" },
    ])?;

    for (metric, delta) in &comparison.measures_change.changes {
        writer.write_record([
            "measure",
            metric.as_str(),
            delta.from.as_str(),
            delta.to.as_str(),
            delta.diff.to_string().as_str(),
            if delta.improved { "true" } else { "false" },
        ])?;
    }

    let issues = &comparison.issues_change;
    if issues.available {
        for (severity, delta) in &issues.changes {
            write_count_row(&mut writer, severity.as_str(), delta)?;
        }
        write_count_row(&mut writer, "TOTAL", &issues.total)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn write_count_row(
    writer: &mut csv::Writer<Vec<u8>>,
    key: &str,
    delta: &CountDelta,
) -> Result<()> {
    writer.write_record([
        "issues",
        key,
        delta.from.to_string().as_str(),
        delta.to.to_string().as_str(),
        delta.diff.to_string().as_str(),
        if delta.improved { "true" } else { "false" },
    ])?;
    Ok(())
}

fn comparison_markdown(comparison: &Comparison) -> String {
    let mut output = String::new();

    output.push_str("# Quality Snapshot Comparison\n\n");
    output.push_str(&format!(
        "**Quality gate:** {}\n\n",
        comparison.summary.quality_gate
    ));

    if !comparison.summary.improvements.is_empty() {
        output.push_str("## Improvements\n\n");
        for line in &comparison.summary.improvements {
            output.push_str(&format!("- {}\n", line));
        }
        output.push('\n');
    }

    if !comparison.summary.degradations.is_empty() {
        output.push_str("## Degradations\n\n");
        for line in &comparison.summary.degradations {
            output.push_str(&format!("- {}\n", line));
        }
        output.push('\n');
    }

    if comparison.measures_change.available {
        output.push_str("## Measures\n\n");
        output.push_str("| Metric | From | To | Diff | |\n");
        output.push_str("|--------|------|----|------|---|\n");
        for (metric, delta) in &comparison.measures_change.changes {
            output.push_str(&format!(
                "| {} | {} | {} | {:+} | {} |\n",
                metric,
                delta.from,
                delta.to,
                delta.diff,
                if delta.improved { "✅" } else { "" }
            ));
        }
        output.push('\n');
    }

    let issues = &comparison.issues_change;
    if issues.available {
        output.push_str("## Issues\n\n");
        output.push_str("| Severity | From | To | Diff |\n");
        output.push_str("|----------|------|----|------|\n");
        for (severity, delta) in &issues.changes {
            output.push_str(&format!(
                "| {} | {} | {} | {:+} |\n",
                severity, delta.from, delta.to, delta.diff
            ));
        }
        output.push_str(&format!(
            "| **Total** | {} | {} | {:+} |\n",
            issues.total.from, issues.total.to, issues.total.diff
        ));
    }

    output
}

fn snapshot_text(snapshot: &Snapshot) -> String {
    let mut output = String::new();

    let title = match &snapshot.project_info {
        Some(project) if !project.name.is_empty() => format!("{} ({})", project.name, project.key),
        Some(project) => project.key.clone(),
        None => "unknown project".to_string(),
    };
    output.push_str(&format!("\nQuality Snapshot: {}\n", title));
    output.push_str(&rule());
    output.push('\n');
    output.push_str(&format!("\nCaptured: {}\n", snapshot.timestamp));

    match &snapshot.quality_gate {
        Some(gate) => {
            output.push_str(&format!(
                "Quality gate: {} {}\n",
                if gate.passed() { "✓" } else { "✗" },
                gate.status
            ));
            for condition in gate.conditions.iter().filter(|c| c.status != "OK") {
                output.push_str(&format!(
                    "  {} is {} (threshold {} {})\n",
                    condition.metric_key,
                    condition.actual_value.as_deref().unwrap_or("?"),
                    condition.comparator.as_deref().unwrap_or(""),
                    condition.error_threshold.as_deref().unwrap_or("?")
                ));
            }
        }
        None => output.push_str("Quality gate: not available\n"),
    }

    if let Some(measures) = &snapshot.measures {
        output.push_str("\nMeasures:\n");
        for measure in measures {
            output.push_str(&format!("  {:<28} {}\n", measure.metric, measure.value));
        }
    }

    if let Some(issues) = &snapshot.issues {
        output.push_str(&format!("\nIssues: {}\n", issues.len()));
        for severity in Severity::ALL {
            let count = issues.iter().filter(|i| i.severity() == Some(severity)).count();
            output.push_str(&format!("  {:<10} {}\n", severity.as_str(), count));
        }
    }

    output.push('\n');
    output
}

fn snapshot_csv(snapshot: &Snapshot) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["metric", "value"])?;
    for measure in snapshot.measures.iter().flatten() {
        writer.write_record([measure.metric.as_str(), measure.value.as_str()])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn snapshot_markdown(snapshot: &Snapshot) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Quality Snapshot: {}\n\n",
        snapshot.project_key().unwrap_or("unknown project")
    ));
    output.push_str(&format!("Captured: {}\n\n", snapshot.timestamp));

    if let Some(gate) = &snapshot.quality_gate {
        let badge = if gate.passed() {
            "![Passed](https://img.shields.io/badge/quality_gate-passed-green)"
        } else {
            "![Failed](https://img.shields.io/badge/quality_gate-failed-red)"
        };
        output.push_str(&format!("{}\n\n", badge));
    }

    if let Some(measures) = &snapshot.measures {
        output.push_str("## Measures\n\n");
        output.push_str("| Metric | Value |\n");
        output.push_str("|--------|-------|\n");
        for measure in measures {
            output.push_str(&format!("| {} | {} |\n", measure.metric, measure.value));
        }
        output.push('\n');
    }

    if let Some(issues) = &snapshot.issues {
        output.push_str("## Issues\n\n");
        output.push_str("| Severity | Count |\n");
        output.push_str("|----------|-------|\n");
        for severity in Severity::ALL {
            let count = issues.iter().filter(|i| i.severity() == Some(severity)).count();
            output.push_str(&format!("| {} | {} |\n", severity, count));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare;
    use crate::snapshot::{Issue, Measure, QualityGate};

    fn sample() -> Comparison {
        let from = Snapshot {
            quality_gate: Some(QualityGate::new("ERROR")),
            measures: Some(vec![Measure::new("coverage", "70"), Measure::new("bugs", "5")]),
            issues: Some(vec![Issue::with_severity("MAJOR"), Issue::with_severity("MAJOR")]),
            ..Snapshot::default()
        };
        let to = Snapshot {
            quality_gate: Some(QualityGate::new("OK")),
            measures: Some(vec![Measure::new("coverage", "85"), Measure::new("bugs", "7")]),
            issues: Some(vec![Issue::with_severity("MAJOR")]),
            ..Snapshot::default()
        };
        compare(&from, &to)
    }

    #[test]
    fn test_text_report() {
        let text = Reporter::new(OutputFormat::Text).render_comparison(&sample()).unwrap();

        assert!(text.contains("Quality gate: Improved (Failed -> Passed) (ERROR -> OK)"));
        assert!(text.contains("  + coverage: 70 -> 85"));
        assert!(text.contains("  - bugs: 5 -> 7"));
        assert!(text.contains("  + Total issues: 2 -> 1 (1 fixed)"));
        let blocker = text.find("BLOCKER").unwrap();
        let info = text.find("INFO").unwrap();
        assert!(blocker < info, "severities should be listed in priority order");
    }

    #[test]
    fn test_text_report_unavailable_blocks() {
        let comparison = compare(&Snapshot::default(), &Snapshot::default());
        let text = Reporter::new(OutputFormat::Text).render_comparison(&comparison).unwrap();

        assert!(text.contains("Quality gate: No change (not available)"));
        assert_eq!(text.matches("not available").count(), 3);
    }

    #[test]
    fn test_csv_report() {
        let csv = Reporter::new(OutputFormat::Csv).render_comparison(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "section,key,from,to,diff,improved");
        assert!(lines.contains(&"quality_gate,status,ERROR,OK,improved,true"));
        assert!(lines.contains(&"measure,coverage,70,85,15,true"));
        assert!(lines.contains(&"measure,bugs,5,7,2,false"));
        assert!(lines.contains(&"issues,MAJOR,2,1,-1,true"));
        assert!(lines.contains(&"issues,TOTAL,2,1,-1,true"));
    }

    #[test]
    fn test_csv_gate_direction() {
        let reporter = Reporter::new(OutputFormat::Csv);
        let passed = Snapshot {
            quality_gate: Some(QualityGate::new("OK")),
            ..Snapshot::default()
        };
        let failed = Snapshot {
            quality_gate: Some(QualityGate::new("ERROR")),
            ..Snapshot::default()
        };

        let degraded = reporter.render_comparison(&compare(&passed, &failed)).unwrap();
        assert!(degraded.lines().any(|l| l == "quality_gate,status,OK,ERROR,degraded,false"));

        let same = reporter.render_comparison(&compare(&passed, &passed)).unwrap();
        assert!(same.lines().any(|l| l == "quality_gate,status,OK,OK,unchanged,false"));

        let missing = reporter.render_comparison(&compare(&Snapshot::default(), &failed)).unwrap();
        assert!(missing.lines().any(|l| l == "quality_gate,status,,ERROR,unchanged,false"));
    }

    #[test]
    fn test_json_report_parses_back() {
        let comparison = sample();
        let json = Reporter::new(OutputFormat::Json).render_comparison(&comparison).unwrap();

        let parsed: Comparison = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, comparison);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["qualityGateChange"]["fromStatus"], "ERROR");
        assert_eq!(value["issuesChange"]["changes"]["MAJOR"]["diff"], -1);
        assert!(value["measuresChange"].get("warnings").is_none());
    }

    #[test]
    fn test_markdown_report() {
        let md = Reporter::new(OutputFormat::Markdown).render_comparison(&sample()).unwrap();

        assert!(md.starts_with("# Quality Snapshot Comparison"));
        assert!(md.contains("| coverage | 70 | 85 | +15 | ✅ |"));
        assert!(md.contains("| **Total** | 2 | 1 | -1 |"));
    }

    #[test]
    fn test_snapshot_reports() {
        let snapshot = Snapshot {
            quality_gate: Some(QualityGate::new("OK")),
            measures: Some(vec![Measure::new("coverage", "81.4")]),
            issues: Some(vec![Issue::with_severity("BLOCKER")]),
            timestamp: "2024-03-01T10:00:00Z".to_string(),
            ..Snapshot::default()
        };

        let text = Reporter::new(OutputFormat::Text).render_snapshot(&snapshot).unwrap();
        assert!(text.contains("Quality gate: ✓ OK"));
        assert!(text.contains("Issues: 1"));

        let csv = Reporter::new(OutputFormat::Csv).render_snapshot(&snapshot).unwrap();
        assert_eq!(csv, "metric,value\ncoverage,81.4\n");
    }
}
