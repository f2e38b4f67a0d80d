// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Job postings, applications and bookmarks.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Job posting stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct JobPosting {
    /// Document ID
    pub id: String,
    /// Posting brand's actor ID
    pub brand_id: String,
    pub title: String,
    pub description: String,
    /// Athlete tier keys this job is offered to
    pub target_tiers: Vec<String>,
    /// RFC3339, second precision (sortable as a string)
    pub created_at: String,
}

/// An athlete-side actor's application to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct JobApplication {
    pub job_id: String,
    pub applicant_id: String,
    pub brand_id: String,
    #[serde(default)]
    pub message: Option<String>,
    pub created_at: String,
}

impl JobApplication {
    pub fn document_id(&self) -> String {
        composite_document_id(&self.job_id, &self.applicant_id)
    }
}

/// What a bookmark points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum BookmarkTarget {
    Job,
    Athlete,
}

/// A saved job (athlete side) or saved athlete (brand side).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Bookmark {
    pub owner_id: String,
    pub target: BookmarkTarget,
    pub target_id: String,
    pub created_at: String,
}

impl Bookmark {
    pub fn document_id(&self) -> String {
        bookmark_document_id(&self.owner_id, &self.target_id)
    }
}

pub fn bookmark_document_id(owner_id: &str, target_id: &str) -> String {
    composite_document_id(owner_id, target_id)
}

/// Join two ids into one document id.
///
/// Both parts are percent-encoded, which always escapes `:`, so the
/// separator appears exactly once.
fn composite_document_id(left: &str, right: &str) -> String {
    format!(
        "{}:{}",
        urlencoding::encode(left),
        urlencoding::encode(right)
    )
}
