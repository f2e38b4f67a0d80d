// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe API client.
//!
//! Handles:
//! - Customers (create, delete on registration rollback)
//! - Hosted checkout and billing portal sessions
//! - Subscription lookup for webhook processing
//! - Proration previews and plan switches

use crate::error::AppError;
use crate::models::{ActorKind, SubscriptionSnapshot, SubscriptionStatus};
use crate::services::billing::{
    BillingProvider, CheckoutRequest, PlanChange, ProcessorSubscription, ProrationPreview,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Metadata key carrying the actor kind on customers and subscriptions.
pub const METADATA_ACTOR_KIND: &str = "actor_kind";
/// Metadata key carrying the actor id.
pub const METADATA_ACTOR_ID: &str = "actor_id";

type Form = Vec<(String, String)>;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    /// Create a new Stripe client with a secret key.
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, path: &str, form: &Form) -> Result<T, AppError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Billing(e.to_string()))?;

        self.check_response_json(response).await
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, AppError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .send()
            .await
            .map_err(|e| AppError::Billing(e.to_string()))?;

        self.check_response_json(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(format!("{}{}", self.base_url, path))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .send()
            .await
            .map_err(|e| AppError::Billing(e.to_string()))?;

        let _: serde_json::Value = self.check_response_json(response).await?;
        Ok(())
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(stripe_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Billing(format!("JSON parse error: {}", e)))
    }
}

/// Map a failed Stripe response to an error.
///
/// Stripe's own message names the missing object, so a 404 keeps it in the
/// log and hands the client a generic message.
fn stripe_error(status: reqwest::StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<StripeErrorBody>(body)
        .map(|e| e.error.message.unwrap_or(e.error.kind))
        .unwrap_or_else(|_| body.to_string());

    tracing::warn!(status = %status, error = %message, "Stripe API error");

    if status == reqwest::StatusCode::NOT_FOUND {
        return AppError::NotFound("Billing record not found".to_string());
    }
    AppError::Billing(format!("HTTP {}: {}", status, message))
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(
        &self,
        actor_id: &str,
        kind: ActorKind,
        email: &str,
        name: &str,
    ) -> Result<String, AppError> {
        let form: Form = vec![
            ("email".into(), email.into()),
            ("name".into(), name.into()),
            (format!("metadata[{}]", METADATA_ACTOR_ID), actor_id.into()),
            (format!("metadata[{}]", METADATA_ACTOR_KIND), kind.as_str().into()),
        ];
        let customer: StripeObject = self.post("/customers", &form).await?;
        tracing::info!(actor_id, customer_id = %customer.id, "Stripe customer created");
        Ok(customer.id)
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), AppError> {
        self.delete(&format!("/customers/{}", urlencoding::encode(customer_id)))
            .await?;
        tracing::info!(customer_id, "Stripe customer deleted");
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> Result<String, AppError> {
        let kind = request.actor_kind.as_str();
        let form: Form = vec![
            ("mode".into(), "subscription".into()),
            ("customer".into(), request.customer_id.into()),
            ("client_reference_id".into(), request.actor_id.into()),
            ("line_items[0][price]".into(), request.price_id.into()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("success_url".into(), request.success_url.into()),
            ("cancel_url".into(), request.cancel_url.into()),
            (format!("metadata[{}]", METADATA_ACTOR_ID), request.actor_id.into()),
            (format!("metadata[{}]", METADATA_ACTOR_KIND), kind.into()),
            (
                format!("subscription_data[metadata][{}]", METADATA_ACTOR_ID),
                request.actor_id.into(),
            ),
            (
                format!("subscription_data[metadata][{}]", METADATA_ACTOR_KIND),
                kind.into(),
            ),
        ];

        let session: StripeSession = self.post("/checkout/sessions", &form).await?;
        session
            .url
            .ok_or_else(|| AppError::Billing("Checkout session has no URL".to_string()))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, AppError> {
        let form: Form = vec![
            ("customer".into(), customer_id.into()),
            ("return_url".into(), return_url.into()),
        ];
        let session: StripeSession = self.post("/billing_portal/sessions", &form).await?;
        session
            .url
            .ok_or_else(|| AppError::Billing("Portal session has no URL".to_string()))
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProcessorSubscription, AppError> {
        let subscription: StripeSubscription = self
            .get(&format!(
                "/subscriptions/{}",
                urlencoding::encode(subscription_id)
            ))
            .await?;
        subscription.into_processor_subscription()
    }

    async fn preview_proration(&self, change: PlanChange<'_>) -> Result<ProrationPreview, AppError> {
        let form: Form = vec![
            ("customer".into(), change.customer_id.into()),
            ("subscription".into(), change.subscription_id.into()),
            (
                "subscription_details[items][0][id]".into(),
                change.subscription_item_id.into(),
            ),
            (
                "subscription_details[items][0][price]".into(),
                change.price_id.into(),
            ),
            (
                "subscription_details[proration_behavior]".into(),
                "always_invoice".into(),
            ),
        ];
        let invoice: StripeInvoicePreview = self.post("/invoices/create_preview", &form).await?;
        Ok(ProrationPreview {
            subtotal: invoice.subtotal,
            total: invoice.total,
            amount_due: invoice.amount_due,
            currency: invoice.currency,
        })
    }

    async fn switch_plan(&self, change: PlanChange<'_>) -> Result<ProcessorSubscription, AppError> {
        let form: Form = vec![
            ("items[0][id]".into(), change.subscription_item_id.into()),
            ("items[0][price]".into(), change.price_id.into()),
            ("payment_behavior".into(), "pending_if_incomplete".into()),
            ("proration_behavior".into(), "always_invoice".into()),
        ];
        let subscription: StripeSubscription = self
            .post(
                &format!("/subscriptions/{}", urlencoding::encode(change.subscription_id)),
                &form,
            )
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            price_id = change.price_id,
            pending = subscription.pending_update.is_some(),
            "Subscription plan switched"
        );
        subscription.into_processor_subscription()
    }
}

// ─── Stripe API response types ───────────────────────────────────

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type", default)]
    kind: String,
    message: Option<String>,
}

/// Any object where only the id matters.
#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
}

/// Checkout or billing portal session.
#[derive(Debug, Deserialize)]
struct StripeSession {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeInvoicePreview {
    subtotal: i64,
    total: i64,
    amount_due: i64,
    currency: String,
}

/// Stripe list wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
    pub price: StripePrice,
    /// Newer API versions report billing periods per item
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Stripe subscription object (API responses and webhook payloads).
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub items: StripeList<StripeSubscriptionItem>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub pending_update: Option<serde_json::Value>,
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

impl StripeSubscription {
    /// Kind recorded in subscription metadata, if present and recognised.
    pub fn actor_kind(&self) -> Option<ActorKind> {
        self.metadata
            .get(METADATA_ACTOR_KIND)
            .and_then(|kind| kind.parse().ok())
    }

    /// Reduce to the fields stored on an actor.
    pub fn snapshot(&self) -> Result<SubscriptionSnapshot, AppError> {
        let status: SubscriptionStatus = self
            .status
            .parse()
            .map_err(|e: crate::models::subscription::UnknownStatus| AppError::Billing(e.to_string()))?;

        let item = self.items.data.first();

        Ok(SubscriptionSnapshot {
            subscription_id: self.id.clone(),
            subscription_item_id: item.map(|i| i.id.clone()),
            price_id: item.map(|i| i.price.id.clone()),
            status,
            current_period_start: timestamp(
                self.current_period_start
                    .or_else(|| item.and_then(|i| i.current_period_start)),
            ),
            current_period_end: timestamp(
                self.current_period_end
                    .or_else(|| item.and_then(|i| i.current_period_end)),
            ),
            cancel_at_period_end: self.cancel_at_period_end,
        })
    }

    pub fn into_processor_subscription(self) -> Result<ProcessorSubscription, AppError> {
        Ok(ProcessorSubscription {
            snapshot: self.snapshot()?,
            actor_kind: self.actor_kind(),
            pending_update: self.pending_update.is_some(),
            customer_id: self.customer,
        })
    }
}
