// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for actor registration and profiles.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Actor, ActorKind, SubscriptionStatus};
use crate::services::billing::discard_customer_on_error;
use crate::services::catalog::{BillingCycle, Catalogs};
use crate::services::entitlement::AccessEvaluator;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/actors", post(register))
        .route("/api/me", get(get_me).put(update_me))
}

/// Load the signed-in identity's actor record.
pub(crate) async fn current_actor(state: &AppState, user: &AuthUser) -> Result<Actor> {
    state
        .db
        .get_actor(&user.actor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Actor not registered".to_string()))
}

// ─── Responses ───────────────────────────────────────────────

/// Subscription state as shown to the actor.
#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubscriptionSummary {
    pub status: Option<SubscriptionStatus>,
    pub price_id: Option<String>,
    /// Tier key resolved from `price_id` in the actor's catalog
    pub tier: Option<String>,
    pub tier_name: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<String>,
    /// Whether the subscription currently grants its tier
    pub has_access: bool,
}

impl SubscriptionSummary {
    pub fn for_actor(catalogs: &Catalogs, actor: &Actor) -> Self {
        let evaluator = AccessEvaluator::for_kind(catalogs, actor.kind);
        let own = evaluator.own_tier(actor);

        Self {
            status: actor.subscription_status,
            price_id: actor.price_id.clone(),
            tier: own.map(|p| p.key().to_string()),
            tier_name: own.map(|p| p.tier.name.clone()),
            billing_cycle: own.map(|p| p.cycle),
            cancel_at_period_end: actor.cancel_at_period_end,
            current_period_end: actor.subscription_end.map(format_utc_rfc3339),
            has_access: own.is_some_and(|p| evaluator.has_access(Some(actor), p.key())),
        }
    }
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActorResponse {
    pub id: String,
    pub kind: ActorKind,
    pub email: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub subscription: SubscriptionSummary,
    pub created_at: String,
}

impl ActorResponse {
    fn new(catalogs: &Catalogs, actor: Actor) -> Self {
        let subscription = SubscriptionSummary::for_actor(catalogs, &actor);
        Self {
            id: actor.id,
            kind: actor.kind,
            email: actor.email,
            display_name: actor.display_name,
            bio: actor.bio,
            subscription,
            created_at: actor.created_at,
        }
    }
}

// ─── Registration ────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    pub kind: ActorKind,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 80, message = "must be 1-80 characters"))]
    pub display_name: String,
}

impl RegisterRequest {
    /// Trim surrounding whitespace so length checks see the stored value.
    fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_string();
        self.display_name = self.display_name.trim().to_string();
        self
    }
}

/// Register the signed-in identity as an actor.
///
/// The billing customer is created first. If the actor record cannot be
/// written afterwards, the customer is deleted again.
async fn register(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ActorResponse>)> {
    let request = request.normalized();
    request.validate()?;

    if state.db.get_actor(&user.actor_id).await?.is_some() {
        return Err(AppError::BadRequest("Actor already registered".to_string()));
    }

    let customer_id = state
        .billing
        .create_customer(&user.actor_id, request.kind, &request.email, &request.display_name)
        .await?;

    let now = format_utc_rfc3339(chrono::Utc::now());
    let actor = Actor::new(
        user.actor_id.clone(),
        request.kind,
        request.email,
        request.display_name,
        customer_id.clone(),
        &now,
    );

    let written = state.db.create_actor(&actor).await;
    discard_customer_on_error(state.billing.as_ref(), &customer_id, written).await?;

    tracing::info!(actor_id = %actor.id, kind = %actor.kind, "Actor registered");

    Ok((
        StatusCode::CREATED,
        Json(ActorResponse::new(&state.catalogs, actor)),
    ))
}

// ─── Profile ─────────────────────────────────────────────────

/// Get current actor profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ActorResponse>> {
    let actor = current_actor(&state, &user).await?;
    Ok(Json(ActorResponse::new(&state.catalogs, actor)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 80, message = "must be 1-80 characters"))]
    pub display_name: Option<String>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub bio: Option<String>,
}

impl UpdateProfileRequest {
    /// Trim surrounding whitespace so length checks see the stored value.
    fn normalized(mut self) -> Self {
        self.display_name = self.display_name.map(|name| name.trim().to_string());
        self.bio = self.bio.map(|bio| bio.trim().to_string());
        self
    }
}

/// Update display name and/or bio. Billing fields are not editable here.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ActorResponse>> {
    let request = request.normalized();
    request.validate()?;

    let mut actor = current_actor(&state, &user).await?;

    if let Some(name) = request.display_name {
        actor.display_name = name;
    }
    if let Some(bio) = request.bio {
        actor.bio = (!bio.is_empty()).then_some(bio);
    }
    actor.updated_at = format_utc_rfc3339(chrono::Utc::now());

    let stored = state.db.update_actor_profile(&actor).await?;

    Ok(Json(ActorResponse::new(&state.catalogs, stored)))
}
