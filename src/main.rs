// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! BNDLS Billing API Server
//!
//! Serves subscription checkout, plan switching and tier-gated marketplace
//! routes, and applies Stripe webhook events to actor records.

use bndls::{
    config::Config,
    db::FirestoreDb,
    services::{Catalogs, StripeClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting BNDLS billing API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Load tier catalogs
    let catalogs = match &config.tier_catalog_file {
        Some(path) => {
            tracing::info!(path = %path, "Loading tier catalogs");
            Catalogs::load_from_file(path).expect("Failed to load tier catalogs")
        }
        None => Catalogs::builtin().expect("Built-in tier catalogs are invalid"),
    };

    let billing = Arc::new(StripeClient::new(
        config.stripe_api_base.clone(),
        config.stripe_secret_key.clone(),
    ));
    tracing::info!(api_base = %config.stripe_api_base, "Stripe client initialized");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        catalogs,
        billing,
    });

    // Build router
    let app = bndls::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bndls=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
