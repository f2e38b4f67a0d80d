// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription state transitions driven by billing events.
//!
//! `transition` is pure: it looks at the stored actor and an inbound event
//! and says what to write. The database layer runs it inside a transaction
//! so the subscription-id comparison and the write happen atomically.

use crate::models::{Actor, SubscriptionSnapshot, SubscriptionStatus};
use crate::services::catalog::TierCatalog;

/// A billing event reduced to what the state machine needs.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    /// `checkout.session.completed`, with the subscription it created
    CheckoutCompleted(SubscriptionSnapshot),
    /// `customer.subscription.updated`
    SubscriptionUpdated(SubscriptionSnapshot),
    /// `customer.subscription.deleted`
    SubscriptionDeleted(SubscriptionSnapshot),
}

impl BillingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckoutCompleted(_) => "checkout.session.completed",
            Self::SubscriptionUpdated(_) => "customer.subscription.updated",
            Self::SubscriptionDeleted(_) => "customer.subscription.deleted",
        }
    }

    pub fn snapshot(&self) -> &SubscriptionSnapshot {
        match self {
            Self::CheckoutCompleted(s) | Self::SubscriptionUpdated(s) | Self::SubscriptionDeleted(s) => s,
        }
    }
}

/// Outcome of applying an event to a stored actor.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Overwrite the actor's billing fields with `snapshot`.
    Apply {
        snapshot: SubscriptionSnapshot,
        tier: Option<String>,
    },
    /// The event is about a subscription the actor no longer (or never) held.
    Stale {
        stored: Option<String>,
        incoming: String,
    },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Apply { .. })
    }

    /// Write an accepted transition into `actor`. Returns false for stale events.
    pub fn apply_to(&self, actor: &mut Actor, now: &str) -> bool {
        match self {
            Self::Apply { snapshot, tier } => {
                actor.apply_snapshot(snapshot, tier.clone());
                actor.updated_at = now.to_string();
                true
            }
            Self::Stale { .. } => false,
        }
    }
}

/// Decide how `event` changes `actor`.
///
/// Checkout completion applies when the actor holds no subscription, holds
/// the same one, or holds one whose status allows a new checkout. A
/// redelivered checkout for an older subscription never replaces a live one.
/// Updates and deletions only apply when the event's subscription id equals
/// the one stored on the actor.
pub fn transition(actor: &Actor, event: &BillingEvent, catalog: &TierCatalog) -> Transition {
    let mut snapshot = event.snapshot().clone();

    match event {
        BillingEvent::CheckoutCompleted(_) => {
            if let Some(previous) = actor
                .subscription_id
                .as_deref()
                .filter(|&id| id != snapshot.subscription_id)
            {
                if !SubscriptionStatus::permits_new_checkout(actor.subscription_status) {
                    return Transition::Stale {
                        stored: actor.subscription_id.clone(),
                        incoming: snapshot.subscription_id,
                    };
                }
                tracing::info!(
                    actor_id = %actor.id,
                    previous_subscription = %previous,
                    subscription_id = %snapshot.subscription_id,
                    "Checkout replaced stored subscription"
                );
            }
        }
        BillingEvent::SubscriptionUpdated(_) | BillingEvent::SubscriptionDeleted(_) => {
            if actor.subscription_id.as_deref() != Some(snapshot.subscription_id.as_str()) {
                return Transition::Stale {
                    stored: actor.subscription_id.clone(),
                    incoming: snapshot.subscription_id,
                };
            }
        }
    }

    if matches!(event, BillingEvent::SubscriptionDeleted(_)) {
        snapshot.status = SubscriptionStatus::Canceled;
    }

    let tier = snapshot
        .price_id
        .as_deref()
        .and_then(|price_id| catalog.resolve(price_id))
        .map(|resolved| resolved.key().to_string());

    Transition::Apply { snapshot, tier }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActorKind;
    use crate::services::catalog::Catalogs;
    use chrono::{TimeZone, Utc};

    fn athlete() -> Actor {
        Actor::new(
            "uid-athlete",
            ActorKind::Athlete,
            "a@example.com",
            "Ada",
            "cus_a",
            "2026-01-01T00:00:00Z",
        )
    }

    fn snapshot(id: &str, status: SubscriptionStatus, price: &str) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            subscription_id: id.to_string(),
            subscription_item_id: Some(format!("si_{}", id)),
            price_id: Some(price.to_string()),
            status,
            current_period_start: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            current_period_end: Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()),
            cancel_at_period_end: false,
        }
    }

    #[test]
    fn test_checkout_from_no_subscription() {
        let catalogs = Catalogs::builtin().unwrap();
        let mut actor = athlete();
        let event = BillingEvent::CheckoutCompleted(snapshot(
            "sub_1",
            SubscriptionStatus::Active,
            "price_athlete_tier2_monthly",
        ));

        let t = transition(&actor, &event, catalogs.athlete());
        assert!(t.apply_to(&mut actor, "2026-01-02T00:00:00Z"));

        assert_eq!(actor.subscription_status, Some(SubscriptionStatus::Active));
        assert_eq!(actor.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(actor.subscription_item_id.as_deref(), Some("si_sub_1"));
        assert_eq!(actor.tier.as_deref(), Some("2"));
        assert_eq!(actor.updated_at, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn test_update_with_matching_id_overwrites_everything() {
        let catalogs = Catalogs::builtin().unwrap();
        let mut actor = athlete();
        let start = snapshot("sub_1", SubscriptionStatus::Active, "price_athlete_tier2_monthly");
        actor.apply_snapshot(&start, Some("2".to_string()));

        let mut next = snapshot("sub_1", SubscriptionStatus::PastDue, "price_athlete_tier1_yearly");
        next.cancel_at_period_end = true;
        next.subscription_item_id = Some("si_new".to_string());

        let t = transition(
            &actor,
            &BillingEvent::SubscriptionUpdated(next.clone()),
            catalogs.athlete(),
        );
        assert!(t.apply_to(&mut actor, "2026-01-03T00:00:00Z"));

        assert_eq!(actor.subscription_status, Some(SubscriptionStatus::PastDue));
        assert_eq!(actor.price_id.as_deref(), Some("price_athlete_tier1_yearly"));
        assert_eq!(actor.subscription_item_id.as_deref(), Some("si_new"));
        assert!(actor.cancel_at_period_end);
        assert_eq!(actor.tier.as_deref(), Some("1"));
    }

    #[test]
    fn test_update_with_other_subscription_is_stale() {
        let catalogs = Catalogs::builtin().unwrap();
        let mut actor = athlete();
        actor.apply_snapshot(
            &snapshot("sub_new", SubscriptionStatus::Active, "price_athlete_tier1_monthly"),
            Some("1".to_string()),
        );
        let before = actor.clone();

        let old = snapshot("sub_old", SubscriptionStatus::Canceled, "price_athlete_tier3_monthly");
        for event in [
            BillingEvent::SubscriptionUpdated(old.clone()),
            BillingEvent::SubscriptionDeleted(old.clone()),
        ] {
            let t = transition(&actor, &event, catalogs.athlete());
            assert_eq!(
                t,
                Transition::Stale {
                    stored: Some("sub_new".to_string()),
                    incoming: "sub_old".to_string(),
                }
            );
            assert!(!t.apply_to(&mut actor, "2026-01-04T00:00:00Z"));
        }

        assert_eq!(actor.subscription_id, before.subscription_id);
        assert_eq!(actor.subscription_status, before.subscription_status);
        assert_eq!(actor.price_id, before.price_id);
        assert_eq!(actor.updated_at, before.updated_at);
    }

    #[test]
    fn test_update_without_stored_subscription_is_stale() {
        let catalogs = Catalogs::builtin().unwrap();
        let actor = athlete();
        let event = BillingEvent::SubscriptionUpdated(snapshot(
            "sub_1",
            SubscriptionStatus::Active,
            "price_athlete_tier1_monthly",
        ));
        assert!(!transition(&actor, &event, catalogs.athlete()).is_applied());
    }

    #[test]
    fn test_redelivered_checkout_does_not_replace_live_subscription() {
        let catalogs = Catalogs::builtin().unwrap();
        let mut actor = athlete();
        actor.apply_snapshot(
            &snapshot("sub_new", SubscriptionStatus::Active, "price_athlete_tier1_monthly"),
            Some("1".to_string()),
        );
        let before = actor.clone();

        let event = BillingEvent::CheckoutCompleted(snapshot(
            "sub_old",
            SubscriptionStatus::Canceled,
            "price_athlete_tier3_monthly",
        ));
        let t = transition(&actor, &event, catalogs.athlete());
        assert_eq!(
            t,
            Transition::Stale {
                stored: Some("sub_new".to_string()),
                incoming: "sub_old".to_string(),
            }
        );
        assert!(!t.apply_to(&mut actor, "2026-01-06T00:00:00Z"));

        assert_eq!(actor.subscription_id.as_deref(), Some("sub_new"));
        assert_eq!(actor.subscription_status, Some(SubscriptionStatus::Active));
        assert_eq!(actor.tier.as_deref(), Some("1"));
        assert_eq!(actor.updated_at, before.updated_at);
    }

    #[test]
    fn test_checkout_replaces_ended_subscription() {
        let catalogs = Catalogs::builtin().unwrap();
        let mut actor = athlete();
        actor.apply_snapshot(
            &snapshot("sub_old", SubscriptionStatus::Canceled, "price_athlete_tier3_monthly"),
            Some("3".to_string()),
        );

        let event = BillingEvent::CheckoutCompleted(snapshot(
            "sub_new",
            SubscriptionStatus::Active,
            "price_athlete_tier2_monthly",
        ));
        assert!(transition(&actor, &event, catalogs.athlete())
            .apply_to(&mut actor, "2026-01-07T00:00:00Z"));

        assert_eq!(actor.subscription_id.as_deref(), Some("sub_new"));
        assert_eq!(actor.tier.as_deref(), Some("2"));
    }

    #[test]
    fn test_repeated_checkout_for_same_subscription_applies() {
        let catalogs = Catalogs::builtin().unwrap();
        let mut actor = athlete();
        actor.apply_snapshot(
            &snapshot("sub_1", SubscriptionStatus::Active, "price_athlete_tier2_monthly"),
            Some("2".to_string()),
        );

        let event = BillingEvent::CheckoutCompleted(snapshot(
            "sub_1",
            SubscriptionStatus::PastDue,
            "price_athlete_tier2_monthly",
        ));
        assert!(transition(&actor, &event, catalogs.athlete()).is_applied());
    }

    #[test]
    fn test_deleted_forces_canceled() {
        let catalogs = Catalogs::builtin().unwrap();
        let mut actor = athlete();
        actor.apply_snapshot(
            &snapshot("sub_1", SubscriptionStatus::Active, "price_athlete_tier3_monthly"),
            Some("3".to_string()),
        );

        // The processor may still report the last live status on deletion.
        let event = BillingEvent::SubscriptionDeleted(snapshot(
            "sub_1",
            SubscriptionStatus::Active,
            "price_athlete_tier3_monthly",
        ));
        transition(&actor, &event, catalogs.athlete()).apply_to(&mut actor, "2026-01-05T00:00:00Z");

        assert_eq!(actor.subscription_status, Some(SubscriptionStatus::Canceled));
    }

    #[test]
    fn test_foreign_price_clears_tier() {
        let catalogs = Catalogs::builtin().unwrap();
        let actor = athlete();
        let event = BillingEvent::CheckoutCompleted(snapshot(
            "sub_1",
            SubscriptionStatus::Active,
            "price_unknown",
        ));

        match transition(&actor, &event, catalogs.athlete()) {
            Transition::Apply { tier, .. } => assert!(tier.is_none()),
            other => panic!("expected apply, got {:?}", other),
        }
    }
}
