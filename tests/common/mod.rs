// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
};
use bndls::config::Config;
use bndls::db::FirestoreDb;
use bndls::error::AppError;
use bndls::models::{ActorKind, SubscriptionSnapshot};
use bndls::routes::create_router;
use bndls::services::billing::{
    BillingProvider, CheckoutRequest, PlanChange, ProcessorSubscription, ProrationPreview,
};
use bndls::services::{Catalogs, WebhookVerifier};
use bndls::AppState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Unique id for test isolation.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

/// In-memory billing provider.
///
/// Records every call and serves subscriptions registered with
/// `add_subscription`.
#[derive(Default)]
pub struct MockBilling {
    calls: Mutex<Vec<String>>,
    subscriptions: Mutex<HashMap<String, ProcessorSubscription>>,
}

#[allow(dead_code)]
impl MockBilling {
    pub fn add_subscription(
        &self,
        customer_id: &str,
        actor_kind: Option<ActorKind>,
        snapshot: SubscriptionSnapshot,
    ) {
        self.subscriptions.lock().unwrap().insert(
            snapshot.subscription_id.clone(),
            ProcessorSubscription {
                customer_id: customer_id.to_string(),
                actor_kind,
                snapshot,
                pending_update: false,
            },
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BillingProvider for MockBilling {
    async fn create_customer(
        &self,
        actor_id: &str,
        _kind: ActorKind,
        _email: &str,
        _name: &str,
    ) -> Result<String, AppError> {
        self.record(format!("create_customer:{}", actor_id));
        Ok(format!("cus_{}", actor_id))
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), AppError> {
        self.record(format!("delete_customer:{}", customer_id));
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> Result<String, AppError> {
        self.record(format!("checkout:{}", request.price_id));
        Ok(format!("https://checkout.test/{}", request.price_id))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<String, AppError> {
        self.record(format!("portal:{}", customer_id));
        Ok("https://portal.test/session".to_string())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProcessorSubscription, AppError> {
        self.record(format!("get_subscription:{}", subscription_id));
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No such subscription: {}", subscription_id)))
    }

    async fn preview_proration(&self, change: PlanChange<'_>) -> Result<ProrationPreview, AppError> {
        self.record(format!("preview:{}", change.price_id));
        Ok(ProrationPreview {
            subtotal: 1_000,
            total: 1_000,
            amount_due: 1_000,
            currency: "usd".to_string(),
        })
    }

    async fn switch_plan(&self, change: PlanChange<'_>) -> Result<ProcessorSubscription, AppError> {
        self.record(format!("switch:{}", change.price_id));
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions
            .get_mut(change.subscription_id)
            .ok_or_else(|| AppError::NotFound("No such subscription".to_string()))?;
        subscription.snapshot.price_id = Some(change.price_id.to_string());
        Ok(subscription.clone())
    }
}

/// Create a test app over `db` and a fresh mock billing provider.
#[allow(dead_code)]
pub fn create_test_app_with_db(db: FirestoreDb) -> (axum::Router, Arc<AppState>, Arc<MockBilling>) {
    let billing = Arc::new(MockBilling::default());
    let state = Arc::new(AppState {
        config: Config::test_default(),
        db,
        catalogs: Catalogs::builtin().expect("built-in catalogs"),
        billing: billing.clone(),
    });

    (create_router(state.clone()), state, billing)
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let (app, state, _) = create_test_app_with_db(test_db_offline());
    (app, state)
}

/// Create a session JWT for `actor_id`.
#[allow(dead_code)]
pub fn create_test_jwt(actor_id: &str, signing_key: &[u8]) -> String {
    bndls::middleware::auth::create_jwt(actor_id, signing_key).expect("Failed to create JWT")
}

/// Build an authenticated JSON request.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a webhook request signed with the test config's secret.
#[allow(dead_code)]
pub fn signed_webhook_request(config: &Config, payload: &serde_json::Value) -> Request<Body> {
    let body = payload.to_string();
    let timestamp = chrono::Utc::now().timestamp();
    let signature = WebhookVerifier::new(
        config.stripe_webhook_secret.as_str(),
        config.webhook_tolerance_secs,
    )
    .sign(timestamp, body.as_bytes())
    .unwrap();

    Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header("stripe-signature", format!("t={},v1={}", timestamp, signature))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
