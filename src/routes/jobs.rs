// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tier-gated marketplace routes: jobs, applications and bookmarks.

use crate::db::firestore::{JobQueryCursor, JobScope};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Actor, ActorKind, Bookmark, BookmarkTarget, JobApplication, JobPosting};
use crate::routes::api::current_actor;
use crate::services::catalog::Catalogs;
use crate::services::entitlement::AccessEvaluator;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 50;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/jobs", post(create_job).get(list_jobs))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/jobs/{id}/apply", post(apply_to_job))
        .route("/api/jobs/{id}/applications", get(list_applications))
        .route("/api/bookmarks", post(add_bookmark).get(list_bookmarks))
        .route("/api/bookmarks/{target_id}", delete(remove_bookmark))
}

/// Whether `actor` may see `job`.
///
/// Athlete-side actors need access to at least one targeted tier; brands
/// see only their own postings.
pub fn can_view_job(catalogs: &Catalogs, actor: &Actor, job: &JobPosting) -> bool {
    match actor.kind {
        ActorKind::Athlete | ActorKind::Team => AccessEvaluator::for_kind(catalogs, actor.kind)
            .has_access_to_any(Some(actor), &job.target_tiers),
        ActorKind::Brand => job.brand_id == actor.id,
    }
}

/// Athlete tier keys `actor` can currently reach.
fn accessible_tiers(catalogs: &Catalogs, actor: &Actor) -> Vec<String> {
    let evaluator = AccessEvaluator::for_kind(catalogs, actor.kind);
    catalogs
        .athlete()
        .tiers()
        .iter()
        .filter(|tier| evaluator.has_access(Some(actor), &tier.key))
        .map(|tier| tier.key.clone())
        .collect()
}

async fn load_job(state: &AppState, job_id: &str) -> Result<JobPosting> {
    state
        .db
        .get_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))
}

// ─── Jobs ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "must be 1-5000 characters"))]
    pub description: String,
    #[validate(length(min = 1, max = 10, message = "must list 1-10 tiers"))]
    pub target_tiers: Vec<String>,
}

/// Post a job. Every targeted tier must be within the brand's reach.
async fn create_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobPosting>)> {
    request.validate()?;
    let actor = current_actor(&state, &user).await?;

    if actor.kind != ActorKind::Brand {
        return Err(AppError::Forbidden("Only brands can post jobs".to_string()));
    }

    let athlete_catalog = state.catalogs.athlete();
    let reach = AccessEvaluator::brand_reach(&state.catalogs);

    let mut target_tiers = BTreeSet::new();
    for tier in &request.target_tiers {
        if athlete_catalog.rank(tier).is_none() {
            return Err(AppError::BadRequest(format!("Unknown tier '{}'", tier)));
        }
        if !reach.has_access(Some(&actor), tier) {
            return Err(AppError::Forbidden(format!(
                "Subscription does not reach tier '{}'",
                tier
            )));
        }
        target_tiers.insert(tier.clone());
    }

    let now = chrono::Utc::now();
    let job = JobPosting {
        id: format!("{}-{}", actor.id, now.timestamp_micros()),
        brand_id: actor.id.clone(),
        title: request.title.trim().to_string(),
        description: request.description.trim().to_string(),
        target_tiers: target_tiers.into_iter().collect(),
        created_at: format_utc_rfc3339(now),
    };

    state.db.create_job(&job).await?;

    tracing::info!(
        job_id = %job.id,
        brand_id = %actor.id,
        tiers = ?job.target_tiers,
        "Job posted"
    );

    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Deserialize)]
pub struct JobsQuery {
    #[serde(default = "default_per_page")]
    per_page: u32,
    cursor: Option<String>,
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

fn parse_cursor(cursor: Option<&str>) -> Result<Option<JobQueryCursor>> {
    cursor
        .map(|raw| {
            let invalid_cursor = || AppError::BadRequest("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;
            let (created_at, id) = decoded_str.split_once('|').ok_or_else(invalid_cursor)?;

            chrono::DateTime::parse_from_rfc3339(created_at).map_err(|_| invalid_cursor())?;
            if id.is_empty() {
                return Err(invalid_cursor());
            }

            Ok(JobQueryCursor {
                created_at: created_at.to_string(),
                id: id.to_string(),
            })
        })
        .transpose()
}

fn encode_cursor(cursor: &JobQueryCursor) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}|{}", cursor.created_at, cursor.id))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct JobsResponse {
    pub jobs: Vec<JobPosting>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

/// Job discovery, newest first.
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<JobsQuery>,
) -> Result<Json<JobsResponse>> {
    if params.per_page == 0 {
        return Err(AppError::BadRequest("'per_page' must be positive".to_string()));
    }
    let limit = params.per_page.min(MAX_PER_PAGE);
    let cursor = parse_cursor(params.cursor.as_deref())?;

    let actor = current_actor(&state, &user).await?;

    let tiers;
    let scope = match actor.kind {
        ActorKind::Brand => JobScope::PostedBy(&actor.id),
        ActorKind::Athlete | ActorKind::Team => {
            tiers = accessible_tiers(&state.catalogs, &actor);
            if tiers.is_empty() {
                return Ok(Json(JobsResponse {
                    jobs: Vec::new(),
                    per_page: limit,
                    next_cursor: None,
                }));
            }
            JobScope::TargetingAny(&tiers)
        }
    };

    // Fetch one extra to know whether another page exists
    let mut jobs = state
        .db
        .list_jobs(scope, cursor.as_ref(), limit.saturating_add(1))
        .await?;

    let has_more = jobs.len() > limit as usize;
    if has_more {
        jobs.truncate(limit as usize);
    }

    let next_cursor = if has_more {
        jobs.last().map(|job| {
            encode_cursor(&JobQueryCursor {
                created_at: job.created_at.clone(),
                id: job.id.clone(),
            })
        })
    } else {
        None
    };

    Ok(Json(JobsResponse {
        jobs,
        per_page: limit,
        next_cursor,
    }))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
) -> Result<Json<JobPosting>> {
    let actor = current_actor(&state, &user).await?;
    let job = load_job(&state, &job_id).await?;

    if !can_view_job(&state.catalogs, &actor, &job) {
        return Err(AppError::Forbidden(
            "Subscription tier does not include this job".to_string(),
        ));
    }

    Ok(Json(job))
}

// ─── Applications ────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyRequest {
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub message: Option<String>,
}

/// Apply to a job. Applying twice is a no-op.
async fn apply_to_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<JobApplication>)> {
    request.validate()?;

    let actor = current_actor(&state, &user).await?;
    if !actor.kind.is_athlete_side() {
        return Err(AppError::Forbidden(
            "Only athletes and teams can apply".to_string(),
        ));
    }

    let job = load_job(&state, &job_id).await?;
    if !can_view_job(&state.catalogs, &actor, &job) {
        return Err(AppError::Forbidden(
            "Subscription tier does not include this job".to_string(),
        ));
    }

    let application = JobApplication {
        job_id: job.id.clone(),
        applicant_id: actor.id.clone(),
        brand_id: job.brand_id.clone(),
        message: request.message.map(|m| m.trim().to_string()),
        created_at: format_utc_rfc3339(chrono::Utc::now()),
    };

    match state.db.create_application(&application).await? {
        Some(existing) => {
            tracing::debug!(job_id = %job.id, applicant_id = %actor.id, "Already applied");
            Ok((StatusCode::OK, Json(existing)))
        }
        None => {
            tracing::info!(job_id = %job.id, applicant_id = %actor.id, "Job application");
            Ok((StatusCode::CREATED, Json(application)))
        }
    }
}

/// Applications to a job (owning brand only).
async fn list_applications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
) -> Result<Json<Vec<JobApplication>>> {
    let actor = current_actor(&state, &user).await?;
    let job = load_job(&state, &job_id).await?;

    if job.brand_id != actor.id {
        return Err(AppError::Forbidden("Not the owner of this job".to_string()));
    }

    Ok(Json(state.db.list_applications(&job.id).await?))
}

// ─── Bookmarks ───────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct BookmarkRequest {
    pub target: BookmarkTarget,
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub target_id: String,
}

/// Athlete tier a brand needs to reach to bookmark `athlete`.
///
/// Athletes without a resolvable tier count as the lowest tier.
fn athlete_tier(catalogs: &Catalogs, athlete: &Actor) -> String {
    AccessEvaluator::for_kind(catalogs, ActorKind::Athlete)
        .own_tier(athlete)
        .map(|p| p.key().to_string())
        .unwrap_or_else(|| catalogs.athlete().lowest().key.clone())
}

async fn add_bookmark(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BookmarkRequest>,
) -> Result<(StatusCode, Json<Bookmark>)> {
    request.validate()?;
    let actor = current_actor(&state, &user).await?;

    match request.target {
        BookmarkTarget::Job => {
            if !actor.kind.is_athlete_side() {
                return Err(AppError::Forbidden(
                    "Only athletes and teams can bookmark jobs".to_string(),
                ));
            }
            let job = load_job(&state, &request.target_id).await?;
            if !can_view_job(&state.catalogs, &actor, &job) {
                return Err(AppError::Forbidden(
                    "Subscription tier does not include this job".to_string(),
                ));
            }
        }
        BookmarkTarget::Athlete => {
            if actor.kind != ActorKind::Brand {
                return Err(AppError::Forbidden(
                    "Only brands can bookmark athletes".to_string(),
                ));
            }
            let athlete = state
                .db
                .get_actor(&request.target_id)
                .await?
                .filter(|a| a.kind == ActorKind::Athlete)
                .ok_or_else(|| AppError::NotFound("Athlete not found".to_string()))?;

            let tier = athlete_tier(&state.catalogs, &athlete);
            if !AccessEvaluator::brand_reach(&state.catalogs).has_access(Some(&actor), &tier) {
                return Err(AppError::Forbidden(format!(
                    "Subscription does not reach tier '{}'",
                    tier
                )));
            }
        }
    }

    let bookmark = Bookmark {
        owner_id: actor.id,
        target: request.target,
        target_id: request.target_id,
        created_at: format_utc_rfc3339(chrono::Utc::now()),
    };
    state.db.set_bookmark(&bookmark).await?;

    Ok((StatusCode::CREATED, Json(bookmark)))
}

async fn remove_bookmark(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(target_id): Path<String>,
) -> Result<StatusCode> {
    if state.db.delete_bookmark(&user.actor_id, &target_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Bookmark not found".to_string()))
    }
}

async fn list_bookmarks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Bookmark>>> {
    Ok(Json(state.db.list_bookmarks(&user.actor_id).await?))
}
