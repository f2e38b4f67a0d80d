// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! BNDLS: subscription tiers and billing for an athlete/brand marketplace
//!
//! This crate provides the backend API that mirrors Stripe subscription
//! state onto actors, decides tier-gated access, and routes pricing-page
//! actions to checkout, the billing portal, or a plan switch.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{BillingProvider, Catalogs};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    /// Tier catalogs, fixed at startup
    pub catalogs: Catalogs,
    pub billing: Arc<dyn BillingProvider>,
}
