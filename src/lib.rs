// SPDX-License-Identifier: AGPL-3.0-or-later

//! sonarsnap - quality snapshots from a SonarQube-compatible server
//!
//! Collects measures, issues and the quality gate verdict for a project,
//! stores them as JSON/CSV/text artifacts, and compares two stored
//! snapshots to show what improved and what regressed.

pub mod api;
pub mod collect;
pub mod compare;
pub mod config;
pub mod report;
pub mod snapshot;
pub mod store;

pub use compare::{compare, compare_with, CompareMode, Comparison, FailPolicy};
pub use snapshot::Snapshot;
pub use store::{SnapshotStore, StoreError};
