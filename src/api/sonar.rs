// SPDX-License-Identifier: AGPL-3.0-or-later

//! SonarQube / SonarCloud Web API client

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{IssuePage, QualityApi};
use crate::config::SonarConfig;
use crate::snapshot::{Issue, Measure, ProjectInfo, QualityGate};

/// `GET /api/components/show`
#[derive(Debug, Deserialize)]
struct ComponentResponse {
    component: ProjectInfo,
}

/// `GET /api/qualitygates/project_status`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectStatusResponse {
    project_status: QualityGate,
}

/// `GET /api/measures/component`
#[derive(Debug, Deserialize)]
struct MeasuresResponse {
    component: MeasuresComponent,
}

#[derive(Debug, Deserialize)]
struct MeasuresComponent {
    #[serde(default)]
    measures: Vec<Measure>,
}

/// `GET /api/issues/search`
#[derive(Debug, Deserialize)]
struct IssueSearchResponse {
    /// Older servers only report the top-level total
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    paging: Option<Paging>,
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    total: u64,
}

impl IssueSearchResponse {
    fn into_page(self) -> IssuePage {
        let total = self
            .paging
            .map(|p| p.total)
            .or(self.total)
            .unwrap_or(self.issues.len() as u64);
        IssuePage {
            total,
            issues: self.issues,
        }
    }
}

/// HTTP client for a quality server
pub struct SonarClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    organization: Option<String>,
}

impl SonarClient {
    pub fn new(config: &SonarConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("sonarsnap/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.host_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            organization: config.organization.clone(),
        })
    }

    fn request(&self, path: &str, query: &[(&str, String)]) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(query);

        // Tokens go in as the basic-auth login with an empty password
        match &self.token {
            Some(token) => request.basic_auth(token, Some("")),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        debug!("GET {}{}", self.base_url, path);

        let response = self
            .request(path, query)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}{}", self.base_url, path))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Request to {} failed: {} - {}", path, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to decode response from {}", path))
    }
}

#[async_trait]
impl QualityApi for SonarClient {
    async fn project(&self, project_key: &str) -> Result<ProjectInfo> {
        let response: ComponentResponse = self
            .get_json("/api/components/show", &[("component", project_key.to_string())])
            .await?;
        Ok(response.component)
    }

    async fn quality_gate(&self, project_key: &str) -> Result<QualityGate> {
        let response: ProjectStatusResponse = self
            .get_json(
                "/api/qualitygates/project_status",
                &[("projectKey", project_key.to_string())],
            )
            .await?;
        Ok(response.project_status)
    }

    async fn measures(&self, project_key: &str, metric_keys: &[String]) -> Result<Vec<Measure>> {
        let response: MeasuresResponse = self
            .get_json(
                "/api/measures/component",
                &[
                    ("component", project_key.to_string()),
                    ("metricKeys", metric_keys.join(",")),
                ],
            )
            .await?;
        Ok(response.component.measures)
    }

    async fn issues_page(&self, project_key: &str, page: u32, page_size: u32) -> Result<IssuePage> {
        let mut query = vec![
            ("componentKeys", project_key.to_string()),
            ("resolved", "false".to_string()),
            ("p", page.to_string()),
            ("ps", page_size.to_string()),
        ];
        if let Some(org) = &self.organization {
            query.push(("organization", org.clone()));
        }

        let response: IssueSearchResponse = self.get_json("/api/issues/search", &query).await?;
        Ok(response.into_page())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(token: Option<&str>) -> SonarClient {
        let config = SonarConfig::new("acme_api")
            .with_host_url("https://sonar.example.com/")
            .with_token(token.map(str::to_string))
            .with_organization(Some("acme".to_string()));
        SonarClient::new(&config).unwrap()
    }

    #[test]
    fn test_request_url_and_query() {
        let request = client(None)
            .request(
                "/api/measures/component",
                &[("component", "acme_api".to_string()), ("metricKeys", "bugs,coverage".to_string())],
            )
            .build()
            .unwrap();

        assert_eq!(request.url().path(), "/api/measures/component");
        assert_eq!(request.url().host_str(), Some("sonar.example.com"));
        assert_eq!(
            request.url().query(),
            Some("component=acme_api&metricKeys=bugs%2Ccoverage")
        );
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn test_token_sent_as_basic_auth() {
        let request = client(Some("squ_123"))
            .request("/api/components/show", &[])
            .build()
            .unwrap();

        let auth = request.headers().get("authorization").unwrap().to_str().unwrap();
        assert!(auth.starts_with("Basic "));
    }

    #[test]
    fn test_decode_project_status() {
        let json = r#"{"projectStatus": {"status": "ERROR", "ignoredConditions": false,
            "conditions": [{"status": "ERROR", "metricKey": "new_coverage", "comparator": "LT",
                            "errorThreshold": "80", "actualValue": "12.5"}]}}"#;

        let response: ProjectStatusResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.project_status.status, "ERROR");
        assert_eq!(response.project_status.conditions.len(), 1);
        assert_eq!(response.project_status.conditions[0].actual_value.as_deref(), Some("12.5"));
    }

    #[test]
    fn test_decode_measures() {
        let json = r#"{"component": {"key": "acme_api", "name": "Acme API", "qualifier": "TRK",
            "measures": [{"metric": "bugs", "value": "3", "bestValue": false},
                         {"metric": "coverage", "value": "81.4"}]}}"#;

        let response: MeasuresResponse = serde_json::from_str(json).unwrap();

        assert_eq!(
            response.component.measures,
            vec![Measure::new("bugs", "3"), Measure::new("coverage", "81.4")]
        );
    }

    #[test]
    fn test_decode_issue_page() {
        let json = r#"{"total": 7, "p": 1, "ps": 2,
            "paging": {"pageIndex": 1, "pageSize": 2, "total": 1204},
            "issues": [
                {"key": "AY1", "rule": "rust:S100", "severity": "MAJOR", "component": "acme_api:src/lib.rs",
                 "line": 41, "message": "Rename this function.", "type": "CODE_SMELL",
                 "status": "OPEN", "creationDate": "2024-02-11T09:12:44+0000", "effort": "5min"},
                {"key": "AY2", "severity": "BLOCKER", "type": "BUG", "component": "acme_api:src/db.rs"}
            ]}"#;

        let response: IssueSearchResponse = serde_json::from_str(json).unwrap();
        let page = response.into_page();

        assert_eq!(page.total, 1204);
        assert_eq!(page.issues.len(), 2);
        assert_eq!(page.issues[0].line, Some(41));
        assert_eq!(page.issues[0].creation_date.as_deref(), Some("2024-02-11T09:12:44+0000"));
        assert_eq!(page.issues[1].line, None);
    }

    #[test]
    fn test_issue_page_total_fallbacks() {
        let response: IssueSearchResponse =
            serde_json::from_str(r#"{"total": 9, "issues": []}"#).unwrap();
        assert_eq!(response.into_page().total, 9);

        let response: IssueSearchResponse =
            serde_json::from_str(r#"{"issues": [{"severity": "INFO"}]}"#).unwrap();
        assert_eq!(response.into_page().total, 1);
    }
}
