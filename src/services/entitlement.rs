// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tier access evaluation.
//!
//! A single evaluator handles every actor kind. What differs per kind is
//! data: which catalog resolves the actor's price, how a resolved tier is
//! compared with the requested one, and whether `trialing` alone is enough.

use crate::models::{Actor, ActorKind, SubscriptionStatus};
use crate::services::catalog::{Catalogs, PriceRef, TierCatalog};
use std::collections::{BTreeMap, BTreeSet};

/// How an actor's own tier is compared with a requested tier.
#[derive(Debug, Clone, Copy)]
pub enum AccessPolicy<'a> {
    /// Own rank must be at least the requested rank in the same catalog.
    Ordinal,
    /// Own tier grants an explicit set of tiers from another catalog.
    Grants(&'a BTreeMap<String, BTreeSet<String>>),
}

/// Whether `trialing` needs a resolvable price to grant access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialingRule {
    RequiresPrice,
    AlwaysGranted,
}

/// Decides tier-gated access for one actor kind.
#[derive(Debug, Clone, Copy)]
pub struct AccessEvaluator<'a> {
    catalog: &'a TierCatalog,
    policy: AccessPolicy<'a>,
    trialing: TrialingRule,
}

impl<'a> AccessEvaluator<'a> {
    pub fn new(catalog: &'a TierCatalog, policy: AccessPolicy<'a>, trialing: TrialingRule) -> Self {
        Self {
            catalog,
            policy,
            trialing,
        }
    }

    /// Access to content of the actor's own kind.
    ///
    /// Teams keep access while trialing even before a price is attached;
    /// athletes and brands need a resolvable price.
    pub fn for_kind(catalogs: &'a Catalogs, kind: ActorKind) -> Self {
        let trialing = match kind {
            ActorKind::Team => TrialingRule::AlwaysGranted,
            ActorKind::Athlete | ActorKind::Brand => TrialingRule::RequiresPrice,
        };
        Self::new(catalogs.for_kind(kind), AccessPolicy::Ordinal, trialing)
    }

    /// A brand's access to athlete tiers (set membership, not rank).
    pub fn brand_reach(catalogs: &'a Catalogs) -> Self {
        Self::new(
            catalogs.brand(),
            AccessPolicy::Grants(catalogs.brand_reach()),
            TrialingRule::RequiresPrice,
        )
    }

    pub fn catalog(&self) -> &'a TierCatalog {
        self.catalog
    }

    /// The actor's tier as resolved from its stored price id.
    pub fn own_tier(&self, actor: &Actor) -> Option<PriceRef<'a>> {
        actor
            .price_id
            .as_deref()
            .and_then(|price_id| self.catalog.resolve(price_id))
    }

    /// Whether `actor` may reach content gated at `requested_tier`.
    pub fn has_access(&self, actor: Option<&Actor>, requested_tier: &str) -> bool {
        let Some(actor) = actor else {
            return false;
        };
        let Some(status) = actor.subscription_status else {
            return false;
        };
        if !status.grants_access() {
            return false;
        }

        if status == SubscriptionStatus::Trialing && self.trialing == TrialingRule::AlwaysGranted {
            return true;
        }

        let Some(own) = self.own_tier(actor) else {
            return false;
        };

        if own.key() == requested_tier {
            return true;
        }

        match self.policy {
            AccessPolicy::Ordinal => self
                .catalog
                .rank(requested_tier)
                .is_some_and(|requested| own.rank >= requested),
            AccessPolicy::Grants(grants) => grants
                .get(own.key())
                .is_some_and(|reach| reach.contains(requested_tier)),
        }
    }

    /// Access to at least one of `tiers`.
    pub fn has_access_to_any(&self, actor: Option<&Actor>, tiers: &[String]) -> bool {
        tiers.iter().any(|tier| self.has_access(actor, tier))
    }
}
