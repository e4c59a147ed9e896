// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core snapshot data structures
//!
//! A snapshot is the frozen output of one collection run against the
//! quality server. Parts of a stored snapshot that are missing or have the
//! wrong shape load as `None` instead of failing the whole document. Inside
//! the measure and issue lists, odd records are kept and their odd fields
//! load as empty, so one bad record never hides the rest of the list.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Quality gate status reported for a passing project
pub const GATE_PASSED: &str = "OK";

/// One captured set of quality data for a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Identifying metadata of the analysed project
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub project_info: Option<ProjectInfo>,

    /// Quality gate verdict at capture time
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub quality_gate: Option<QualityGate>,

    /// Metric values, unsorted, unique by metric key
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub measures: Option<Vec<Measure>>,

    /// Open issues reported by the server
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<Issue>>,

    /// Capture time, opaque
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
}

impl Snapshot {
    /// Project key if the snapshot carries project metadata
    pub fn project_key(&self) -> Option<&str> {
        self.project_info.as_ref().map(|p| p.key.as_str())
    }

    /// Look up the raw value of a metric
    pub fn measure(&self, metric: &str) -> Option<&str> {
        self.measures
            .as_ref()?
            .iter()
            .rev()
            .find(|m| m.metric == metric)
            .map(|m| m.value.as_str())
    }
}

/// Project metadata as returned by the components endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub key: String,

    #[serde(default)]
    pub name: String,

    /// Component qualifier (`TRK` for projects)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Quality gate verdict
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityGate {
    /// `OK` when passed, anything else is a failure
    pub status: String,

    /// Individual gate conditions, when the server reports them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<GateCondition>,
}

impl QualityGate {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            conditions: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == GATE_PASSED
    }
}

/// A single threshold rule of the quality gate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCondition {
    pub status: String,
    pub metric_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<String>,
}

/// A metric value. Values are kept as the server's strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// Empty when the record carries no metric key; such records are ignored
    #[serde(default, deserialize_with = "string_or_number")]
    pub metric: String,

    #[serde(default, deserialize_with = "string_or_number")]
    pub value: String,
}

impl Measure {
    pub fn new(metric: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            value: value.into(),
        }
    }
}

/// An issue record from the issues search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// Raw severity label, see [`Severity`]. A non-string label loads as
    /// `None` and counts as unrecognized.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(rename = "type", default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
}

impl Issue {
    /// Issue with only a severity label set
    pub fn with_severity(severity: impl Into<String>) -> Self {
        Self {
            severity: Some(severity.into()),
            ..Self::default()
        }
    }

    /// Parsed severity, `None` when absent or outside the known levels
    pub fn severity(&self) -> Option<Severity> {
        self.severity.as_deref().and_then(Severity::from_label)
    }
}

/// Issue severity levels, declared in priority order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Blocker,
    Critical,
    Major,
    Minor,
    Info,
}

impl Severity {
    /// All severities, highest priority first
    pub const ALL: [Severity; 5] = [
        Severity::Blocker,
        Severity::Critical,
        Severity::Major,
        Severity::Minor,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocker => "BLOCKER",
            Severity::Critical => "CRITICAL",
            Severity::Major => "MAJOR",
            Severity::Minor => "MINOR",
            Severity::Info => "INFO",
        }
    }

    /// Parse a server label. Labels are matched exactly.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deserialize a field, turning a value of the wrong shape into `None`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Deserialize a list that must be an array. Elements that fail to load
/// are kept as their default so counts over the list stay right.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => Some(
            items
                .into_iter()
                .map(|item| serde_json::from_value(item).unwrap_or_default())
                .collect(),
        ),
        _ => None,
    })
}

/// Measure values are strings on the wire, but hand-edited files may use numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}
