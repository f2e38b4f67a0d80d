// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for Stripe billing events.

use crate::db::BillingUpdate;
use crate::error::{AppError, Result};
use crate::models::{Actor, ActorKind};
use crate::services::subscription::BillingEvent;
use crate::services::webhook::{classify, ClassifiedEvent, WebhookVerifier, SIGNATURE_HEADER};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/stripe", post(handle_event))
}

/// Handle a signed Stripe event.
///
/// Signature problems are rejected before anything else is looked at.
/// Events that need no action return 200 so Stripe stops retrying them.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook rejected: missing signature header");
            AppError::BadRequest("Missing signature".to_string())
        })?;

    let verifier = WebhookVerifier::new(
        state.config.stripe_webhook_secret.as_str(),
        state.config.webhook_tolerance_secs,
    );
    if let Err(e) = verifier.verify(&body, signature, chrono::Utc::now().timestamp()) {
        tracing::warn!(error = %e, "Security Alert: Webhook signature verification failed");
        return Err(AppError::BadRequest("Invalid signature".to_string()));
    }

    let event = classify(&body).map_err(|e| {
        tracing::warn!(error = %e, "Failed to parse webhook event");
        AppError::BadRequest("Invalid event payload".to_string())
    })?;

    match event {
        ClassifiedEvent::Ignored {
            event_id,
            event_type,
        } => {
            tracing::debug!(%event_id, %event_type, "Ignoring unhandled event type");
            Ok(StatusCode::OK)
        }
        ClassifiedEvent::CheckoutCompleted {
            event_id,
            customer_id,
            subscription_id,
            actor_kind,
        } => {
            let Some(actor) = athlete_side_actor(&state, &event_id, &customer_id, actor_kind).await?
            else {
                return Ok(StatusCode::OK);
            };

            let subscription = state.billing.get_subscription(&subscription_id).await?;
            if subscription.customer_id != customer_id {
                tracing::warn!(
                    %event_id,
                    %subscription_id,
                    "Security Alert: Checkout subscription belongs to another customer"
                );
                return Err(AppError::BadRequest("Subscription mismatch".to_string()));
            }

            apply(
                &state,
                &event_id,
                &actor,
                BillingEvent::CheckoutCompleted(subscription.snapshot),
            )
            .await
        }
        ClassifiedEvent::SubscriptionUpdated {
            event_id,
            customer_id,
            actor_kind,
            snapshot,
        } => {
            let Some(actor) = athlete_side_actor(&state, &event_id, &customer_id, actor_kind).await?
            else {
                return Ok(StatusCode::OK);
            };
            apply(&state, &event_id, &actor, BillingEvent::SubscriptionUpdated(snapshot)).await
        }
        ClassifiedEvent::SubscriptionDeleted {
            event_id,
            customer_id,
            actor_kind,
            snapshot,
        } => {
            let Some(actor) = athlete_side_actor(&state, &event_id, &customer_id, actor_kind).await?
            else {
                return Ok(StatusCode::OK);
            };
            apply(&state, &event_id, &actor, BillingEvent::SubscriptionDeleted(snapshot)).await
        }
    }
}

/// Find the athlete or team that owns `customer_id`.
///
/// Returns `None` for brand events, which this endpoint does not process.
/// The kind recorded in event metadata wins over the stored kind.
async fn athlete_side_actor(
    state: &AppState,
    event_id: &str,
    customer_id: &str,
    metadata_kind: Option<ActorKind>,
) -> Result<Option<Actor>> {
    if metadata_kind == Some(ActorKind::Brand) {
        tracing::info!(event_id, customer_id, "Ignoring brand billing event");
        return Ok(None);
    }

    let actor = state
        .db
        .find_actor_by_customer(customer_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!(event_id, customer_id, "Webhook for unknown customer");
            AppError::NotFound("Unknown customer".to_string())
        })?;

    if metadata_kind.unwrap_or(actor.kind) == ActorKind::Brand {
        tracing::info!(event_id, actor_id = %actor.id, "Ignoring brand billing event");
        return Ok(None);
    }

    Ok(Some(actor))
}

async fn apply(
    state: &AppState,
    event_id: &str,
    actor: &Actor,
    event: BillingEvent,
) -> Result<StatusCode> {
    let catalog = state.catalogs.for_kind(actor.kind);

    match state.db.apply_billing_event(&actor.id, &event, catalog).await? {
        BillingUpdate::Applied(updated) => {
            tracing::info!(
                event_id,
                event = event.name(),
                actor_id = %updated.id,
                status = ?updated.subscription_status,
                tier = ?updated.tier,
                "Subscription state updated"
            );
            Ok(StatusCode::OK)
        }
        BillingUpdate::Stale { stored, incoming } => {
            tracing::info!(
                event_id,
                event = event.name(),
                actor_id = %actor.id,
                stored = ?stored,
                incoming = %incoming,
                "Ignoring event for non-current subscription"
            );
            Ok(StatusCode::OK)
        }
        BillingUpdate::ActorMissing => {
            tracing::warn!(event_id, actor_id = %actor.id, "Actor disappeared during update");
            Err(AppError::NotFound("Unknown customer".to_string()))
        }
    }
}
