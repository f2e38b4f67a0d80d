// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing routes: checkout, billing portal, plan switches and the
//! pricing page.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Actor, ActorKind, SubscriptionStatus};
use crate::routes::api::{current_actor, SubscriptionSummary};
use crate::services::action::{base_entitlement, decide_action, Action, ActionHandler};
use crate::services::billing::{CheckoutRequest, PlanChange, ProrationPreview};
use crate::services::catalog::BillingCycle;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/billing/checkout", post(create_checkout))
        .route("/api/billing/portal", post(create_portal))
        .route("/api/billing/preview", post(preview_switch))
        .route("/api/billing/switch", post(switch_plan))
        .route("/api/billing/action", get(get_action))
        .route("/api/plans", get(get_plans))
}

/// Body for endpoints that act on one target price.
#[derive(Debug, Deserialize, Validate)]
pub struct PriceRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub price_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedirectResponse {
    pub url: String,
}

fn require_base_entitlement(state: &AppState, actor: &Actor, price_id: &str) -> Result<()> {
    if base_entitlement(&state.catalogs, actor, price_id) {
        Ok(())
    } else {
        tracing::warn!(
            actor_id = %actor.id,
            kind = %actor.kind,
            price_id,
            "Price outside actor's catalog"
        );
        Err(AppError::Forbidden(
            "Price is not available for this account".to_string(),
        ))
    }
}

// ─── Checkout / Portal ───────────────────────────────────────

/// Start a hosted checkout for a new subscription.
async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<PriceRequest>,
) -> Result<Json<RedirectResponse>> {
    request.validate()?;
    let actor = current_actor(&state, &user).await?;

    require_base_entitlement(&state, &actor, &request.price_id)?;

    // Brands are not status-checked here
    if actor.kind.is_athlete_side()
        && !SubscriptionStatus::permits_new_checkout(actor.subscription_status)
    {
        return Err(AppError::BadRequest(
            "Existing subscription must be changed through the billing portal or a plan switch"
                .to_string(),
        ));
    }

    let return_url = state.config.billing_return_url();
    let success_url = format!("{}?checkout=success", return_url);
    let cancel_url = format!("{}?checkout=cancel", return_url);

    let url = state
        .billing
        .create_checkout_session(CheckoutRequest {
            actor_id: &actor.id,
            actor_kind: actor.kind,
            customer_id: &actor.stripe_customer_id,
            price_id: &request.price_id,
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await?;

    tracing::info!(actor_id = %actor.id, price_id = %request.price_id, "Checkout session created");

    Ok(Json(RedirectResponse { url }))
}

/// Open the self-service billing portal.
async fn create_portal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RedirectResponse>> {
    let actor = current_actor(&state, &user).await?;

    let url = state
        .billing
        .create_portal_session(&actor.stripe_customer_id, &state.config.billing_return_url())
        .await?;

    Ok(Json(RedirectResponse { url }))
}

// ─── Plan Switch ─────────────────────────────────────────────

/// Check that switching `actor` to `price_id` is a valid plan switch and
/// return the subscription references it needs.
fn plan_change<'a>(state: &AppState, actor: &'a Actor, price_id: &'a str) -> Result<PlanChange<'a>> {
    require_base_entitlement(state, actor, price_id)?;

    if actor
        .subscription_status
        .is_some_and(|status| status.blocks_plan_switch())
    {
        return Err(AppError::BadRequest(
            "Subscription has ended; start a new checkout".to_string(),
        ));
    }

    let action = decide_action(&state.catalogs, actor, price_id);
    if !matches!(&action.handler, ActionHandler::SwitchPlan { price_id: target } if target == price_id)
    {
        return Err(AppError::BadRequest(format!(
            "Plan switch not available for this price ({:?})",
            action.label
        )));
    }

    let (Some(subscription_id), Some(subscription_item_id)) = (
        actor.subscription_id.as_deref(),
        actor.subscription_item_id.as_deref(),
    ) else {
        return Err(AppError::BadRequest(
            "No subscription to switch".to_string(),
        ));
    };

    Ok(PlanChange {
        customer_id: &actor.stripe_customer_id,
        subscription_id,
        subscription_item_id,
        price_id,
    })
}

/// Amount due now if the actor switches to the requested price.
async fn preview_switch(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<PriceRequest>,
) -> Result<Json<ProrationPreview>> {
    request.validate()?;
    let actor = current_actor(&state, &user).await?;
    let change = plan_change(&state, &actor, &request.price_id)?;

    let preview = state.billing.preview_proration(change).await?;
    Ok(Json(preview))
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SwitchResponse {
    pub status: SubscriptionStatus,
    pub price_id: Option<String>,
    /// The change waits on payment of the proration invoice
    pub pending_update: bool,
}

/// Switch the subscription to the requested price.
///
/// The actor record is not written here; the resulting
/// `customer.subscription.updated` webhook carries the new state.
async fn switch_plan(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<PriceRequest>,
) -> Result<Json<SwitchResponse>> {
    request.validate()?;
    let actor = current_actor(&state, &user).await?;
    let change = plan_change(&state, &actor, &request.price_id)?;

    let result = state.billing.switch_plan(change).await?;

    tracing::info!(
        actor_id = %actor.id,
        from = ?actor.price_id,
        to = %request.price_id,
        pending = result.pending_update,
        "Plan switch submitted"
    );

    Ok(Json(SwitchResponse {
        status: result.snapshot.status,
        price_id: result.snapshot.price_id,
        pending_update: result.pending_update,
    }))
}

// ─── Pricing Page ────────────────────────────────────────────

#[derive(Deserialize)]
struct ActionQuery {
    price_id: String,
}

/// The button to show for one price.
async fn get_action(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActionQuery>,
) -> Result<Json<Action>> {
    if params.price_id.is_empty() || params.price_id.len() > 255 {
        return Err(AppError::BadRequest("Invalid 'price_id' parameter".to_string()));
    }
    let actor = current_actor(&state, &user).await?;
    Ok(Json(decide_action(&state.catalogs, &actor, &params.price_id)))
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PlanPrice {
    pub price_id: String,
    pub cycle: BillingCycle,
    pub amount_cents: u32,
    pub action: Action,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PlanTier {
    pub key: String,
    pub name: String,
    pub features: Vec<String>,
    pub prices: Vec<PlanPrice>,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PlansResponse {
    pub kind: ActorKind,
    /// Lowest privilege first
    pub tiers: Vec<PlanTier>,
    pub current: SubscriptionSummary,
}

fn plans_for(state: &AppState, actor: &Actor) -> PlansResponse {
    let catalog = state.catalogs.for_kind(actor.kind);

    let tiers = catalog
        .tiers()
        .iter()
        .map(|tier| PlanTier {
            key: tier.key.clone(),
            name: tier.name.clone(),
            features: tier.features.clone(),
            prices: [
                (BillingCycle::Monthly, tier.monthly_price_cents),
                (BillingCycle::Yearly, tier.yearly_price_cents),
            ]
            .into_iter()
            .map(|(cycle, amount_cents)| {
                let price_id = tier.price_id(cycle);
                PlanPrice {
                    price_id: price_id.to_string(),
                    cycle,
                    amount_cents,
                    action: decide_action(&state.catalogs, actor, price_id),
                }
            })
            .collect(),
        })
        .collect();

    PlansResponse {
        kind: actor.kind,
        tiers,
        current: SubscriptionSummary::for_actor(&state.catalogs, actor),
    }
}

/// The actor's catalog with the decided action for every price.
async fn get_plans(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PlansResponse>> {
    let actor = current_actor(&state, &user).await?;
    Ok(Json(plans_for(&state, &actor)))
}
