// SPDX-License-Identifier: AGPL-3.0-or-later

//! Snapshot comparison
//!
//! Computes the quality gate transition, per-metric deltas and per-severity
//! issue deltas between two snapshots, and classifies each delta as an
//! improvement or a regression. Everything here is pure: no I/O, and no
//! input shape makes it fail. Missing snapshot parts turn the matching
//! block into `available: false`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::snapshot::{Issue, Measure, QualityGate, Severity, Snapshot, GATE_PASSED};

/// Known metrics, tagged with the direction that counts as better
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metric {
    Coverage,
    BugCount,
    VulnerabilityCount,
    CodeSmellCount,
    DuplicationDensity,
    /// No polarity knowledge; never reported as improved
    Unknown(String),
}

/// Which direction of change is an improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

impl Metric {
    pub fn from_key(key: &str) -> Self {
        match key {
            "coverage" => Metric::Coverage,
            "bugs" => Metric::BugCount,
            "vulnerabilities" => Metric::VulnerabilityCount,
            "code_smells" => Metric::CodeSmellCount,
            "duplicated_lines_density" => Metric::DuplicationDensity,
            other => Metric::Unknown(other.to_string()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Metric::Coverage => "coverage",
            Metric::BugCount => "bugs",
            Metric::VulnerabilityCount => "vulnerabilities",
            Metric::CodeSmellCount => "code_smells",
            Metric::DuplicationDensity => "duplicated_lines_density",
            Metric::Unknown(key) => key,
        }
    }

    pub fn polarity(&self) -> Option<Polarity> {
        match self {
            Metric::Coverage => Some(Polarity::HigherIsBetter),
            Metric::BugCount
            | Metric::VulnerabilityCount
            | Metric::CodeSmellCount
            | Metric::DuplicationDensity => Some(Polarity::LowerIsBetter),
            Metric::Unknown(_) => None,
        }
    }

    /// Whether a signed change of this metric is an improvement
    pub fn is_improvement(&self, diff: f64) -> bool {
        match self.polarity() {
            Some(Polarity::HigherIsBetter) => diff > 0.0,
            Some(Polarity::LowerIsBetter) => diff < 0.0,
            None => false,
        }
    }
}

/// How malformed measure values are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompareMode {
    /// Malformed values count as zero, silently
    #[default]
    Lenient,
    /// Malformed values count as zero and raise a [`ParseWarning`]
    Strict,
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub quality_gate_change: QualityGateChange,
    pub measures_change: MeasuresChange,
    pub issues_change: IssuesChange,
    pub summary: Summary,
}

impl Comparison {
    /// True when the summary lists any regression or the gate degraded
    pub fn has_degradations(&self) -> bool {
        self.quality_gate_change.degraded || !self.summary.degradations.is_empty()
    }

    pub fn parse_warnings(&self) -> &[ParseWarning] {
        &self.measures_change.warnings
    }

    /// Whether the comparison breaks any of the failure conditions asked for
    pub fn fails(&self, policy: FailPolicy) -> bool {
        (policy.on_parse_warning && !self.parse_warnings().is_empty())
            || (policy.on_regression && self.has_degradations())
    }
}

/// Conditions that turn a finished comparison into a failed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailPolicy {
    /// Fail when a measure value could not be read as a number
    pub on_parse_warning: bool,

    /// Fail when the gate degraded or any metric or issue count regressed
    pub on_regression: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGateChange {
    pub available: bool,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub improved: bool,
    pub degraded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasuresChange {
    pub available: bool,
    pub changes: BTreeMap<String, MeasureDelta>,

    /// Malformed values seen in strict mode
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ParseWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureDelta {
    /// Value as stored, `"0"` when missing
    pub from: String,
    pub to: String,
    pub diff: f64,
    pub improved: bool,
}

/// A measure value that did not parse as a number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub metric: String,
    pub side: Side,
    pub value: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} value {:?} for metric '{}' is not a number, counted as 0",
            self.side, self.value, self.metric
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    From,
    To,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::From => write!(f, "from"),
            Side::To => write!(f, "to"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuesChange {
    pub available: bool,
    /// Per-severity deltas, keyed in priority order
    pub changes: BTreeMap<Severity, CountDelta>,
    /// Sum over the known severities only
    pub total: CountDelta,
    /// Issues whose severity is absent or unknown; not part of `total`
    pub unrecognized: IssueCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountDelta {
    pub from: u64,
    pub to: u64,
    pub diff: i64,
    pub improved: bool,
}

impl CountDelta {
    /// Fewer issues is always an improvement
    pub fn new(from: u64, to: u64) -> Self {
        let diff = to as i64 - from as i64;
        Self {
            from,
            to,
            diff,
            improved: diff < 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub from: u64,
    pub to: u64,
}

/// Human-readable digest of notable changes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub quality_gate: String,
    pub improvements: Vec<String>,
    pub degradations: Vec<String>,
}

pub const GATE_NO_CHANGE: &str = "No change";
pub const GATE_IMPROVED: &str = "Improved (Failed -> Passed)";
pub const GATE_DEGRADED: &str = "Degraded (Passed -> Failed)";

/// Compare two snapshots, treating malformed measure values as zero
pub fn compare(from: &Snapshot, to: &Snapshot) -> Comparison {
    compare_with(from, to, CompareMode::Lenient)
}

pub fn compare_with(from: &Snapshot, to: &Snapshot, mode: CompareMode) -> Comparison {
    let mut comparison = Comparison {
        quality_gate_change: compare_quality_gate(
            from.quality_gate.as_ref(),
            to.quality_gate.as_ref(),
        ),
        measures_change: compare_measures(from.measures.as_deref(), to.measures.as_deref(), mode),
        issues_change: compare_issues(from.issues.as_deref(), to.issues.as_deref()),
        summary: Summary::default(),
    };
    comparison.summary = generate_summary(&comparison);
    comparison
}

pub fn compare_quality_gate(from: Option<&QualityGate>, to: Option<&QualityGate>) -> QualityGateChange {
    let (Some(from), Some(to)) = (from, to) else {
        return QualityGateChange::default();
    };

    let was_passing = from.status == GATE_PASSED;
    let is_passing = to.status == GATE_PASSED;

    QualityGateChange {
        available: true,
        from_status: Some(from.status.clone()),
        to_status: Some(to.status.clone()),
        improved: !was_passing && is_passing,
        degraded: was_passing && !is_passing,
    }
}

pub fn compare_measures(
    from: Option<&[Measure]>,
    to: Option<&[Measure]>,
    mode: CompareMode,
) -> MeasuresChange {
    let (Some(from), Some(to)) = (from, to) else {
        return MeasuresChange::default();
    };

    let from_values = index_measures(from);
    let to_values = index_measures(to);
    let metrics: BTreeSet<&str> = from_values.keys().chain(to_values.keys()).copied().collect();

    let mut change = MeasuresChange {
        available: true,
        ..MeasuresChange::default()
    };

    for metric in metrics {
        let from_raw = from_values.get(metric).copied();
        let to_raw = to_values.get(metric).copied();

        let from_value = numeric_value(metric, Side::From, from_raw, mode, &mut change.warnings);
        let to_value = numeric_value(metric, Side::To, to_raw, mode, &mut change.warnings);
        let diff = to_value - from_value;

        change.changes.insert(
            metric.to_string(),
            MeasureDelta {
                from: display_value(from_raw),
                to: display_value(to_raw),
                diff,
                improved: Metric::from_key(metric).is_improvement(diff),
            },
        );
    }

    change
}

pub fn compare_issues(from: Option<&[Issue]>, to: Option<&[Issue]>) -> IssuesChange {
    let (Some(from), Some(to)) = (from, to) else {
        return IssuesChange::default();
    };

    let (from_counts, from_unrecognized) = tally_severities(from);
    let (to_counts, to_unrecognized) = tally_severities(to);

    let changes: BTreeMap<Severity, CountDelta> = Severity::ALL
        .into_iter()
        .map(|severity| {
            let from = from_counts.get(&severity).copied().unwrap_or(0);
            let to = to_counts.get(&severity).copied().unwrap_or(0);
            (severity, CountDelta::new(from, to))
        })
        .collect();

    let total = CountDelta::new(
        changes.values().map(|c| c.from).sum(),
        changes.values().map(|c| c.to).sum(),
    );

    IssuesChange {
        available: true,
        changes,
        total,
        unrecognized: IssueCounts {
            from: from_unrecognized,
            to: to_unrecognized,
        },
    }
}

/// Build the summary from the change blocks of a comparison
pub fn generate_summary(comparison: &Comparison) -> Summary {
    let gate = &comparison.quality_gate_change;
    let quality_gate = if gate.improved {
        GATE_IMPROVED
    } else if gate.degraded {
        GATE_DEGRADED
    } else {
        GATE_NO_CHANGE
    };

    let mut summary = Summary {
        quality_gate: quality_gate.to_string(),
        ..Summary::default()
    };

    for (metric, delta) in &comparison.measures_change.changes {
        if delta.diff.abs() > 0.0 {
            let line = format!("{}: {} -> {}", metric, delta.from, delta.to);
            if delta.improved {
                summary.improvements.push(line);
            } else {
                summary.degradations.push(line);
            }
        }
    }

    let total = &comparison.issues_change.total;
    if total.diff != 0 {
        let magnitude = total.diff.unsigned_abs();
        if total.improved {
            summary.improvements.push(format!(
                "Total issues: {} -> {} ({} fixed)",
                total.from, total.to, magnitude
            ));
        } else {
            summary.degradations.push(format!(
                "Total issues: {} -> {} ({} new)",
                total.from, total.to, magnitude
            ));
        }
    }

    summary
}

/// Metric to raw value; a later duplicate overwrites an earlier one
/// Records without a metric key have nothing to pair with and are skipped
fn index_measures(measures: &[Measure]) -> HashMap<&str, &str> {
    measures
        .iter()
        .filter(|m| !m.metric.is_empty())
        .map(|m| (m.metric.as_str(), m.value.as_str()))
        .collect()
}

fn display_value(raw: Option<&str>) -> String {
    match raw {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => "0".to_string(),
    }
}

/// Missing and empty values are zero. Unparseable ones are zero too, with
/// a warning in strict mode.
fn numeric_value(
    metric: &str,
    side: Side,
    raw: Option<&str>,
    mode: CompareMode,
    warnings: &mut Vec<ParseWarning>,
) -> f64 {
    let Some(raw) = raw.filter(|v| !v.trim().is_empty()) else {
        return 0.0;
    };

    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            if mode == CompareMode::Strict {
                warnings.push(ParseWarning {
                    metric: metric.to_string(),
                    side,
                    value: raw.to_string(),
                });
            }
            0.0
        }
    }
}

fn tally_severities(issues: &[Issue]) -> (HashMap<Severity, u64>, u64) {
    let mut counts = HashMap::new();
    let mut unrecognized = 0;

    for issue in issues {
        match issue.severity() {
            Some(severity) => *counts.entry(severity).or_insert(0) += 1,
            None => unrecognized += 1,
        }
    }

    (counts, unrecognized)
}
