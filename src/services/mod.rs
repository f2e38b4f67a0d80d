// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod action;
pub mod billing;
pub mod catalog;
pub mod entitlement;
pub mod stripe;
pub mod subscription;
pub mod webhook;

pub use action::{decide_action, Action, ActionHandler, ActionLabel};
pub use billing::BillingProvider;
pub use catalog::{Catalogs, TierCatalog};
pub use entitlement::AccessEvaluator;
pub use stripe::StripeClient;
pub use webhook::WebhookVerifier;
