// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment processor abstraction.
//!
//! Handlers talk to the processor only through `BillingProvider`, so tests
//! can substitute an in-memory implementation.

use crate::error::AppError;
use crate::models::{ActorKind, SubscriptionSnapshot};
use async_trait::async_trait;
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub actor_id: &'a str,
    pub actor_kind: ActorKind,
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

/// A subscription as the processor currently sees it.
#[derive(Debug, Clone)]
pub struct ProcessorSubscription {
    pub customer_id: String,
    /// Kind recorded in subscription metadata at checkout, if any
    pub actor_kind: Option<ActorKind>,
    pub snapshot: SubscriptionSnapshot,
    /// Set when a plan change is waiting on payment
    pub pending_update: bool,
}

/// Amounts the actor would owe right now for a plan switch (minor units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProrationPreview {
    pub subtotal: i64,
    pub total: i64,
    pub amount_due: i64,
    pub currency: String,
}

/// Existing subscription to change in a plan switch.
#[derive(Debug, Clone)]
pub struct PlanChange<'a> {
    pub customer_id: &'a str,
    pub subscription_id: &'a str,
    pub subscription_item_id: &'a str,
    pub price_id: &'a str,
}

/// Payment processor operations used by the service.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer and return its id.
    async fn create_customer(
        &self,
        actor_id: &str,
        kind: ActorKind,
        email: &str,
        name: &str,
    ) -> Result<String, AppError>;

    /// Delete a customer (registration rollback).
    async fn delete_customer(&self, customer_id: &str) -> Result<(), AppError>;

    /// Create a hosted checkout session and return its URL.
    async fn create_checkout_session(&self, request: CheckoutRequest<'_>)
        -> Result<String, AppError>;

    /// Create a billing portal session and return its URL.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, AppError>;

    /// Fetch a subscription by id.
    async fn get_subscription(&self, subscription_id: &str)
        -> Result<ProcessorSubscription, AppError>;

    /// Preview the invoice a plan change would produce, without committing it.
    async fn preview_proration(&self, change: PlanChange<'_>) -> Result<ProrationPreview, AppError>;

    /// Commit a plan change, invoicing the proration immediately and leaving
    /// the change pending if that invoice cannot be paid.
    async fn switch_plan(&self, change: PlanChange<'_>) -> Result<ProcessorSubscription, AppError>;
}

/// Delete `customer_id` if `result` is an error, then hand `result` back.
///
/// Used when the local record for a freshly created customer cannot be
/// written. A failed delete is logged; the original error is returned.
pub async fn discard_customer_on_error<T>(
    provider: &dyn BillingProvider,
    customer_id: &str,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    if let Err(e) = &result {
        tracing::error!(customer_id, error = %e, "Local write failed, removing billing customer");
        if let Err(cleanup) = provider.delete_customer(customer_id).await {
            tracing::error!(
                customer_id,
                error = %cleanup,
                "Failed to delete orphaned billing customer"
            );
        }
    }
    result
}
