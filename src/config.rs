// SPDX-License-Identifier: AGPL-3.0-or-later

//! Connection settings for the quality server

/// Public SonarCloud instance
pub const DEFAULT_HOST_URL: &str = "https://sonarcloud.io";

/// Metrics requested when none are configured
pub const DEFAULT_METRICS: &[&str] = &[
    "bugs",
    "vulnerabilities",
    "code_smells",
    "coverage",
    "duplicated_lines_density",
    "ncloc",
    "sqale_index",
    "reliability_rating",
    "security_rating",
    "sqale_rating",
];

/// Quality server configuration
#[derive(Debug, Clone)]
pub struct SonarConfig {
    /// Base URL of the server, without trailing slash
    pub host_url: String,
    /// User token; anonymous access when absent
    pub token: Option<String>,
    /// SonarCloud organization, if any
    pub organization: Option<String>,
    /// Key of the project to collect
    pub project_key: String,
    /// Metric keys to request
    pub metrics: Vec<String>,
}

impl SonarConfig {
    pub fn new(project_key: impl Into<String>) -> Self {
        Self {
            host_url: DEFAULT_HOST_URL.to_string(),
            token: None,
            organization: None,
            project_key: project_key.into(),
            metrics: DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn with_host_url(mut self, url: impl Into<String>) -> Self {
        self.host_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization.filter(|o| !o.is_empty());
        self
    }

    /// Replace the metric list. An empty list keeps the defaults.
    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let metrics: Vec<String> = metrics
            .into_iter()
            .map(|m| m.as_ref().trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if !metrics.is_empty() {
            self.metrics = metrics;
        }
        self
    }
}
