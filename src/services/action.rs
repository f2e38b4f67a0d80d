// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pricing-page action routing.
//!
//! For each price shown to an actor, decide which button to render and what
//! pressing it does: start a checkout, open the billing portal, or switch the
//! existing subscription to another price.

use crate::models::{Actor, ActorKind, SubscriptionStatus};
use crate::services::catalog::{BillingCycle, Catalogs};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Button label shown for a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ActionLabel {
    #[serde(rename = "Get-Started")]
    GetStarted,
    Upgrade,
    Downgrade,
    #[serde(rename = "Current-Plan")]
    CurrentPlan,
    Renew,
    Locked,
    #[serde(rename = "Switch-to-Monthly")]
    SwitchToMonthly,
    #[serde(rename = "Switch-to-Yearly")]
    SwitchToYearly,
}

/// What the button does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ActionHandler {
    /// Nothing happens
    None,
    /// Open a hosted checkout for `price_id`
    Checkout { price_id: String },
    /// Redirect to the self-service billing portal
    BillingPortal,
    /// Preview proration, then switch the subscription to `price_id`
    SwitchPlan { price_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Action {
    pub label: ActionLabel,
    pub handler: ActionHandler,
}

impl Action {
    fn new(label: ActionLabel, handler: ActionHandler) -> Self {
        Self { label, handler }
    }

    fn locked() -> Self {
        Self::new(ActionLabel::Locked, ActionHandler::None)
    }

    fn checkout(price_id: &str) -> Self {
        Self::new(
            ActionLabel::GetStarted,
            ActionHandler::Checkout {
                price_id: price_id.to_string(),
            },
        )
    }
}

/// Whether the actor's kind can buy `target_price_id` at all.
pub fn base_entitlement(catalogs: &Catalogs, actor: &Actor, target_price_id: &str) -> bool {
    catalogs
        .for_kind(actor.kind)
        .resolve(target_price_id)
        .is_some()
}

/// What a delinquent (past due / unpaid) actor is offered.
fn delinquent_action(kind: ActorKind) -> Action {
    match kind {
        // Athlete accounts can recover in the billing portal.
        ActorKind::Athlete | ActorKind::Team => {
            Action::new(ActionLabel::Renew, ActionHandler::BillingPortal)
        }
        // Brands have no self-serve recovery.
        ActorKind::Brand => Action::locked(),
    }
}

/// Decide the action for `actor` looking at `target_price_id`.
pub fn decide_action(catalogs: &Catalogs, actor: &Actor, target_price_id: &str) -> Action {
    let catalog = catalogs.for_kind(actor.kind);

    let Some(target) = catalog.resolve(target_price_id) else {
        return Action::locked();
    };

    let (Some(status), Some(current_price)) =
        (actor.subscription_status, actor.price_id.as_deref())
    else {
        return Action::checkout(target_price_id);
    };

    if status.is_delinquent() {
        return delinquent_action(actor.kind);
    }

    if matches!(status, SubscriptionStatus::Active | SubscriptionStatus::Trialing) {
        if let Some(current) = catalog.resolve(current_price) {
            let switch = ActionHandler::SwitchPlan {
                price_id: target_price_id.to_string(),
            };

            if current.rank == target.rank && current.cycle != target.cycle {
                let label = match target.cycle {
                    BillingCycle::Monthly => ActionLabel::SwitchToMonthly,
                    BillingCycle::Yearly => ActionLabel::SwitchToYearly,
                };
                return Action::new(label, switch);
            }

            if current.rank == target.rank {
                return Action::new(ActionLabel::CurrentPlan, ActionHandler::BillingPortal);
            }

            let label = if target.rank > current.rank {
                ActionLabel::Upgrade
            } else {
                ActionLabel::Downgrade
            };
            return Action::new(label, switch);
        }
    }

    Action::checkout(target_price_id)
}
