// SPDX-License-Identifier: AGPL-3.0-or-later

//! Quality server integration
//!
//! The collector talks to the server through [`QualityApi`], so runs can be
//! driven by the HTTP client or by an in-memory double.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::snapshot::{Issue, Measure, ProjectInfo, QualityGate};

pub mod sonar;

pub use sonar::SonarClient;

/// Read-only view of a quality server
#[async_trait]
pub trait QualityApi: Send + Sync {
    /// Project metadata
    async fn project(&self, project_key: &str) -> Result<ProjectInfo>;

    /// Current quality gate verdict
    async fn quality_gate(&self, project_key: &str) -> Result<QualityGate>;

    /// Values for the requested metric keys
    async fn measures(&self, project_key: &str, metric_keys: &[String]) -> Result<Vec<Measure>>;

    /// One page of open issues (`page` is 1-based)
    async fn issues_page(&self, project_key: &str, page: u32, page_size: u32) -> Result<IssuePage>;
}

/// A page from the issue search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuePage {
    /// Total number of matching issues across all pages
    pub total: u64,
    pub issues: Vec<Issue>,
}
