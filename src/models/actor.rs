// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Actor model (athletes, teams and brands) for storage and API.

use crate::models::subscription::{SubscriptionSnapshot, SubscriptionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Which side of the marketplace an actor is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ActorKind {
    /// Individual athlete
    Athlete,
    /// Team account (athlete side, own catalog)
    Team,
    /// Sponsoring brand
    Brand,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Athlete => "athlete",
            Self::Team => "team",
            Self::Brand => "brand",
        }
    }

    /// Athletes and teams both sit on the talent side.
    pub fn is_athlete_side(&self) -> bool {
        matches!(self, Self::Athlete | Self::Team)
    }
}

impl std::fmt::Display for ActorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "athlete" => Ok(Self::Athlete),
            "team" => Ok(Self::Team),
            "brand" => Ok(Self::Brand),
            other => Err(format!("unknown actor kind: {}", other)),
        }
    }
}

/// Actor profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// Identity-provider uid (also used as document ID)
    pub id: String,
    pub kind: ActorKind,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    /// Payment processor customer reference
    pub stripe_customer_id: String,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub subscription_item_id: Option<String>,
    #[serde(default)]
    pub price_id: Option<String>,
    /// None until the first checkout completes
    #[serde(default)]
    pub subscription_status: Option<SubscriptionStatus>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub subscription_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription_end: Option<DateTime<Utc>>,
    /// Tier key resolved from `price_id` when the last billing event was applied
    #[serde(default)]
    pub tier: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Actor {
    /// A freshly registered actor with no subscription.
    pub fn new(
        id: impl Into<String>,
        kind: ActorKind,
        email: impl Into<String>,
        display_name: impl Into<String>,
        stripe_customer_id: impl Into<String>,
        now: &str,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            email: email.into(),
            display_name: display_name.into(),
            bio: None,
            stripe_customer_id: stripe_customer_id.into(),
            subscription_id: None,
            subscription_item_id: None,
            price_id: None,
            subscription_status: None,
            cancel_at_period_end: false,
            subscription_start: None,
            subscription_end: None,
            tier: None,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Overwrite every billing-owned field from `snapshot`.
    pub fn apply_snapshot(&mut self, snapshot: &SubscriptionSnapshot, tier: Option<String>) {
        self.subscription_id = Some(snapshot.subscription_id.clone());
        self.subscription_item_id = snapshot.subscription_item_id.clone();
        self.price_id = snapshot.price_id.clone();
        self.subscription_status = Some(snapshot.status);
        self.cancel_at_period_end = snapshot.cancel_at_period_end;
        self.subscription_start = snapshot.current_period_start;
        self.subscription_end = snapshot.current_period_end;
        self.tier = tier;
    }
}
