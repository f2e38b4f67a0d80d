// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Actors (profiles plus mirrored subscription state)
//! - Jobs (brand postings targeted at athlete tiers)
//! - Applications (join collection keyed by job and applicant)
//! - Bookmarks

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Actor, Bookmark, JobApplication, JobPosting};
use crate::services::catalog::TierCatalog;
use crate::services::subscription::{transition, BillingEvent, Transition};
use crate::time_utils::format_utc_rfc3339;
use firestore::{FirestoreQueryCursor, FirestoreQueryDirection};

/// Actor fields a profile edit may write.
const ACTOR_PROFILE_FIELDS: [&str; 3] = ["display_name", "bio", "updated_at"];

/// Position after the last job of a page (jobs sort newest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQueryCursor {
    pub created_at: String,
    pub id: String,
}

/// Which jobs a listing covers.
#[derive(Debug, Clone, Copy)]
pub enum JobScope<'a> {
    /// Jobs posted by one brand
    PostedBy(&'a str),
    /// Jobs targeting at least one of these athlete tiers
    TargetingAny(&'a [String]),
}

/// Result of applying a billing event to a stored actor.
#[derive(Debug, Clone)]
pub enum BillingUpdate {
    /// The actor was rewritten; holds the stored result
    Applied(Box<Actor>),
    /// The event referenced a different subscription; nothing was written
    Stale { stored: Option<String>, incoming: String },
    /// The actor document disappeared between lookup and update
    ActorMissing,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator takes an unauthenticated connection
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Actor Operations ────────────────────────────────────────

    /// Get an actor by identity-provider uid.
    pub async fn get_actor(&self, actor_id: &str) -> Result<Option<Actor>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTORS)
            .obj()
            .one(actor_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create an actor; fails if the document already exists.
    pub async fn create_actor(&self, actor: &Actor) -> Result<(), AppError> {
        let _: Actor = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::ACTORS)
            .document_id(&actor.id)
            .object(actor)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write the profile fields of `actor` and return the stored document.
    ///
    /// Only the fields in `ACTOR_PROFILE_FIELDS` are written, so billing
    /// state committed concurrently by a webhook is left as stored.
    pub async fn update_actor_profile(&self, actor: &Actor) -> Result<Actor, AppError> {
        self.get_client()?
            .fluent()
            .update()
            .fields(ACTOR_PROFILE_FIELDS)
            .in_col(collections::ACTORS)
            .document_id(&actor.id)
            .object(actor)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the actor owning a billing customer.
    pub async fn find_actor_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Actor>, AppError> {
        let actors: Vec<Actor> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTORS)
            .filter(|q| q.for_all([q.field("stripe_customer_id").eq(customer_id)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(actors.into_iter().next())
    }

    // ─── Atomic Billing Updates ─────────────────────────────────────

    /// Apply a billing event to an actor as a compare-and-set.
    ///
    /// The actor is read inside a Firestore transaction, the subscription
    /// guard is evaluated against that read, and the write commits only if
    /// the document was not changed concurrently. Firestore retries the
    /// closure with fresh data on contention.
    pub async fn apply_billing_event(
        &self,
        actor_id: &str,
        event: &BillingEvent,
        catalog: &TierCatalog,
    ) -> Result<BillingUpdate, AppError> {
        let actor_id = actor_id.to_string();
        let event = event.clone();
        let catalog = catalog.clone();

        let update = self
            .get_client()?
            .run_transaction(move |db, transaction| {
                let actor_id = actor_id.clone();
                let event = event.clone();
                let catalog = catalog.clone();

                Box::pin(async move {
                    let stored: Option<Actor> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::ACTORS)
                        .obj()
                        .one(&actor_id)
                        .await?;

                    let Some(mut actor) = stored else {
                        return Ok(BillingUpdate::ActorMissing);
                    };

                    match transition(&actor, &event, &catalog) {
                        Transition::Stale { stored, incoming } => {
                            Ok(BillingUpdate::Stale { stored, incoming })
                        }
                        applied => {
                            applied.apply_to(&mut actor, &format_utc_rfc3339(chrono::Utc::now()));

                            db.fluent()
                                .update()
                                .in_col(collections::ACTORS)
                                .document_id(&actor_id)
                                .object(&actor)
                                .add_to_transaction(transaction)?;

                            Ok(BillingUpdate::Applied(Box::new(actor)))
                        }
                    }
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Billing update transaction failed: {}", e)))?;

        Ok(update)
    }

    // ─── Job Operations ──────────────────────────────────────────

    pub async fn create_job(&self, job: &JobPosting) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::JOBS)
            .document_id(&job.id)
            .object(job)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobPosting>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::JOBS)
            .obj()
            .one(job_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List jobs newest first, starting after `cursor`.
    pub async fn list_jobs(
        &self,
        scope: JobScope<'_>,
        cursor: Option<&JobQueryCursor>,
        limit: u32,
    ) -> Result<Vec<JobPosting>, AppError> {
        let query = self.get_client()?.fluent().select().from(collections::JOBS);

        let query = match scope {
            JobScope::PostedBy(brand_id) => {
                let brand_id = brand_id.to_string();
                query.filter(move |q| q.for_all([q.field("brand_id").eq(brand_id.clone())]))
            }
            JobScope::TargetingAny(tiers) => {
                let tiers = tiers.to_vec();
                query.filter(move |q| {
                    q.for_all([q.field("target_tiers").array_contains_any(tiers.clone())])
                })
            }
        };

        let query = query.order_by([
            ("created_at", FirestoreQueryDirection::Descending),
            ("id", FirestoreQueryDirection::Descending),
        ]);

        let query = if let Some(cursor) = cursor {
            query.start_at(FirestoreQueryCursor::AfterValue(vec![
                cursor.created_at.clone().into(),
                cursor.id.clone().into(),
            ]))
        } else {
            query
        };

        query
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Application Operations ──────────────────────────────────

    /// Record an application. Returns the stored one if it already existed.
    pub async fn create_application(
        &self,
        application: &JobApplication,
    ) -> Result<Option<JobApplication>, AppError> {
        let doc_id = application.document_id();
        let existing: Option<JobApplication> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::APPLICATIONS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if existing.is_some() {
            return Ok(existing);
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::APPLICATIONS)
            .document_id(&doc_id)
            .object(application)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(None)
    }

    pub async fn list_applications(&self, job_id: &str) -> Result<Vec<JobApplication>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::APPLICATIONS)
            .filter(|q| q.for_all([q.field("job_id").eq(job_id)]))
            .order_by([("created_at", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Bookmark Operations ─────────────────────────────────────

    pub async fn set_bookmark(&self, bookmark: &Bookmark) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::BOOKMARKS)
            .document_id(bookmark.document_id())
            .object(bookmark)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete one of `owner_id`'s bookmarks. Returns `false` if there was none.
    pub async fn delete_bookmark(&self, owner_id: &str, target_id: &str) -> Result<bool, AppError> {
        let doc_id = crate::models::job::bookmark_document_id(owner_id, target_id);
        let existing: Option<Bookmark> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::BOOKMARKS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !existing.is_some_and(|bookmark| bookmark.owner_id == owner_id) {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::BOOKMARKS)
            .document_id(&doc_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }

    pub async fn list_bookmarks(&self, owner_id: &str) -> Result<Vec<Bookmark>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::BOOKMARKS)
            .filter(|q| q.for_all([q.field("owner_id").eq(owner_id)]))
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
