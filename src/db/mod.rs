// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::{BillingUpdate, FirestoreDb, JobQueryCursor};

/// Collection names as constants.
pub mod collections {
    /// Athletes, teams and brands (keyed by identity-provider uid)
    pub const ACTORS: &str = "actors";
    pub const JOBS: &str = "jobs";
    /// Keyed by `{job_id}_{applicant_id}`
    pub const APPLICATIONS: &str = "applications";
    /// Keyed by `{owner_id}_{target_id}`
    pub const BOOKMARKS: &str = "bookmarks";
}
