// SPDX-License-Identifier: AGPL-3.0-or-later

//! Snapshot collection from a quality server

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::api::QualityApi;
use crate::config::SonarConfig;
use crate::snapshot::{Issue, Snapshot};

/// Issues requested per page
pub const ISSUE_PAGE_SIZE: u32 = 500;

/// The issue search refuses to page past this many results
pub const ISSUE_RESULT_LIMIT: u64 = 10_000;

/// What to collect
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub project_key: String,
    pub metrics: Vec<String>,
    pub page_size: u32,
}

impl CollectOptions {
    pub fn from_config(config: &SonarConfig) -> Self {
        Self {
            project_key: config.project_key.clone(),
            metrics: config.metrics.clone(),
            page_size: ISSUE_PAGE_SIZE,
        }
    }
}

/// Run one collection and assemble a snapshot.
///
/// Project metadata and the gate verdict are optional: failures there are
/// logged and leave the field empty. Measures and issues are required.
pub async fn collect_snapshot(api: &dyn QualityApi, options: &CollectOptions) -> Result<Snapshot> {
    let key = options.project_key.as_str();
    info!("Collecting quality data for project {}", key);

    let project_info = match api.project(key).await {
        Ok(project) => Some(project),
        Err(e) => {
            warn!("Could not fetch project info for {}: {:#}", key, e);
            None
        }
    };

    let quality_gate = match api.quality_gate(key).await {
        Ok(gate) => Some(gate),
        Err(e) => {
            warn!("Could not fetch quality gate status for {}: {:#}", key, e);
            None
        }
    };

    let measures = api
        .measures(key, &options.metrics)
        .await
        .with_context(|| format!("Failed to fetch measures for {}", key))?;
    debug!("Fetched {} measures", measures.len());

    let issues = fetch_all_issues(api, key, options.page_size)
        .await
        .with_context(|| format!("Failed to fetch issues for {}", key))?;

    info!(
        "Collected {} measures and {} issues for {}",
        measures.len(),
        issues.len(),
        key
    );

    Ok(Snapshot {
        project_info,
        quality_gate,
        measures: Some(measures),
        issues: Some(issues),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn fetch_all_issues(
    api: &dyn QualityApi,
    project_key: &str,
    page_size: u32,
) -> Result<Vec<Issue>> {
    let page_size = page_size.max(1);
    let mut issues = Vec::new();
    let mut page = 1;

    loop {
        let batch = api.issues_page(project_key, page, page_size).await?;
        debug!("Issue page {}: {} of {}", page, batch.issues.len(), batch.total);

        let received = batch.issues.len();
        issues.extend(batch.issues);

        let fetched = issues.len() as u64;
        if received == 0 || fetched >= batch.total {
            break;
        }
        if fetched >= ISSUE_RESULT_LIMIT {
            warn!(
                "Project has {} issues, only the first {} can be retrieved",
                batch.total, ISSUE_RESULT_LIMIT
            );
            break;
        }
        page += 1;
    }

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::IssuePage;
    use crate::snapshot::{Measure, ProjectInfo, QualityGate};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves a fixed number of issues, recording the pages asked for
    struct FakeServer {
        issue_count: usize,
        reported_total: u64,
        fail_gate: bool,
        pages: Mutex<Vec<u32>>,
    }

    impl FakeServer {
        fn new(issue_count: usize) -> Self {
            Self {
                issue_count,
                reported_total: issue_count as u64,
                fail_gate: false,
                pages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QualityApi for FakeServer {
        async fn project(&self, project_key: &str) -> Result<ProjectInfo> {
            Ok(ProjectInfo {
                key: project_key.to_string(),
                name: "Acme API".to_string(),
                ..ProjectInfo::default()
            })
        }

        async fn quality_gate(&self, _project_key: &str) -> Result<QualityGate> {
            if self.fail_gate {
                anyhow::bail!("Request to /api/qualitygates/project_status failed: 403 Forbidden");
            }
            Ok(QualityGate::new("OK"))
        }

        async fn measures(&self, _project_key: &str, metric_keys: &[String]) -> Result<Vec<Measure>> {
            Ok(metric_keys.iter().map(|m| Measure::new(m.as_str(), "1")).collect())
        }

        async fn issues_page(&self, _project_key: &str, page: u32, page_size: u32) -> Result<IssuePage> {
            self.pages.lock().unwrap().push(page);
            let start = ((page - 1) * page_size) as usize;
            let end = (start + page_size as usize).min(self.issue_count);
            let issues = (start.min(end)..end)
                .map(|i| Issue {
                    key: Some(format!("ISSUE-{}", i)),
                    ..Issue::with_severity("MINOR")
                })
                .collect();
            Ok(IssuePage {
                total: self.reported_total,
                issues,
            })
        }
    }

    fn options(page_size: u32) -> CollectOptions {
        CollectOptions {
            project_key: "acme_api".to_string(),
            metrics: vec!["bugs".to_string(), "coverage".to_string()],
            page_size,
        }
    }

    #[tokio::test]
    async fn test_collects_all_issue_pages() {
        let server = FakeServer::new(5);

        let snapshot = collect_snapshot(&server, &options(2)).await.unwrap();

        assert_eq!(snapshot.issues.as_ref().unwrap().len(), 5);
        assert_eq!(*server.pages.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(snapshot.project_key(), Some("acme_api"));
        assert_eq!(snapshot.measures.as_ref().unwrap().len(), 2);
        assert!(snapshot.quality_gate.unwrap().passed());
        assert!(!snapshot.timestamp.is_empty());
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        // Server claims more issues than it actually returns
        let server = FakeServer {
            reported_total: 50,
            ..FakeServer::new(3)
        };

        let snapshot = collect_snapshot(&server, &options(2)).await.unwrap();

        assert_eq!(snapshot.issues.unwrap().len(), 3);
        assert_eq!(*server.pages.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_no_issues_single_request() {
        let server = FakeServer::new(0);

        let snapshot = collect_snapshot(&server, &options(ISSUE_PAGE_SIZE)).await.unwrap();

        assert_eq!(snapshot.issues, Some(Vec::new()));
        assert_eq!(*server.pages.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_gate_failure_leaves_gate_empty() {
        let server = FakeServer {
            fail_gate: true,
            ..FakeServer::new(1)
        };

        let snapshot = collect_snapshot(&server, &options(10)).await.unwrap();

        assert!(snapshot.quality_gate.is_none());
        assert!(snapshot.project_info.is_some());
    }
}
