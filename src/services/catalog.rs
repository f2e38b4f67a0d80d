// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pricing tier catalogs and price-id resolution.
//!
//! One catalog per actor kind. Tiers are stored in ascending order of
//! privilege, so rank comparison is the same for every catalog even though
//! athlete tiers are named "3" < "2" < "1" and brand tiers
//! "BASIC" < "PERFORMANCE" < "ADVANCED".
//!
//! Catalogs are built once at startup and shared read-only through `AppState`.

use crate::models::ActorKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Billing cycle of a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

/// One tier within a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TierDefinition {
    /// Tier key stored on actors ("1", "BASIC", ...)
    pub key: String,
    pub name: String,
    pub monthly_price_id: String,
    pub yearly_price_id: String,
    pub monthly_price_cents: u32,
    pub yearly_price_cents: u32,
    pub features: Vec<String>,
}

impl TierDefinition {
    pub fn price_id(&self, cycle: BillingCycle) -> &str {
        match cycle {
            BillingCycle::Monthly => &self.monthly_price_id,
            BillingCycle::Yearly => &self.yearly_price_id,
        }
    }
}

/// A price id resolved against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct PriceRef<'a> {
    pub tier: &'a TierDefinition,
    pub cycle: BillingCycle,
    /// Position in the catalog; higher is more privileged
    pub rank: usize,
}

impl PriceRef<'_> {
    pub fn key(&self) -> &str {
        &self.tier.key
    }
}

/// Ordered tiers for one actor kind.
#[derive(Debug, Clone)]
pub struct TierCatalog {
    tiers: Vec<TierDefinition>,
    by_price: HashMap<String, (usize, BillingCycle)>,
}

impl TierCatalog {
    /// Build a catalog from tiers listed lowest privilege first.
    pub fn new(tiers: Vec<TierDefinition>) -> Result<Self, CatalogError> {
        if tiers.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut keys = HashSet::new();
        let mut by_price = HashMap::new();

        for (rank, tier) in tiers.iter().enumerate() {
            if !keys.insert(tier.key.clone()) {
                return Err(CatalogError::DuplicateTier(tier.key.clone()));
            }
            for cycle in [BillingCycle::Monthly, BillingCycle::Yearly] {
                let price_id = tier.price_id(cycle).to_string();
                if by_price.insert(price_id.clone(), (rank, cycle)).is_some() {
                    return Err(CatalogError::DuplicatePrice(price_id));
                }
            }
        }

        Ok(Self { tiers, by_price })
    }

    pub fn tiers(&self) -> &[TierDefinition] {
        &self.tiers
    }

    /// Reverse lookup of a price id. `None` for stale or foreign ids.
    pub fn resolve(&self, price_id: &str) -> Option<PriceRef<'_>> {
        self.by_price.get(price_id).map(|&(rank, cycle)| PriceRef {
            tier: &self.tiers[rank],
            cycle,
            rank,
        })
    }

    pub fn rank(&self, key: &str) -> Option<usize> {
        self.tiers.iter().position(|t| t.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.key == key)
    }

    /// The least privileged tier.
    pub fn lowest(&self) -> &TierDefinition {
        &self.tiers[0]
    }

    pub fn price_ids(&self) -> impl Iterator<Item = &str> {
        self.by_price.keys().map(String::as_str)
    }
}

/// Catalog construction errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog has no tiers")]
    Empty,

    #[error("Duplicate tier key: {0}")]
    DuplicateTier(String),

    #[error("Price id mapped more than once: {0}")]
    DuplicatePrice(String),

    #[error("Brand reach refers to unknown tier: {0}")]
    UnknownReachTier(String),

    #[error("Failed to read catalog file: {0}")]
    Io(String),

    #[error("Failed to parse catalog file: {0}")]
    Parse(String),
}

/// On-disk catalog override format (`TIER_CATALOG_FILE`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub athlete: Vec<TierDefinition>,
    pub team: Vec<TierDefinition>,
    pub brand: Vec<TierDefinition>,
    /// Brand tier key -> athlete tier keys that brand tier may reach
    pub brand_reach: BTreeMap<String, Vec<String>>,
}

/// Every catalog the service knows, plus the brand -> athlete reach table.
#[derive(Debug, Clone)]
pub struct Catalogs {
    athlete: TierCatalog,
    team: TierCatalog,
    brand: TierCatalog,
    brand_reach: BTreeMap<String, BTreeSet<String>>,
}

impl Catalogs {
    pub fn new(file: CatalogFile) -> Result<Self, CatalogError> {
        let athlete = TierCatalog::new(file.athlete)?;
        let team = TierCatalog::new(file.team)?;
        let brand = TierCatalog::new(file.brand)?;

        // A price id must identify exactly one catalog too.
        let mut seen = HashSet::new();
        for price_id in athlete
            .price_ids()
            .chain(team.price_ids())
            .chain(brand.price_ids())
        {
            if !seen.insert(price_id) {
                return Err(CatalogError::DuplicatePrice(price_id.to_string()));
            }
        }

        let mut brand_reach = BTreeMap::new();
        for (brand_key, athlete_keys) in file.brand_reach {
            if brand.rank(&brand_key).is_none() {
                return Err(CatalogError::UnknownReachTier(brand_key));
            }
            let mut reach = BTreeSet::new();
            for key in athlete_keys {
                if athlete.rank(&key).is_none() {
                    return Err(CatalogError::UnknownReachTier(key));
                }
                reach.insert(key);
            }
            brand_reach.insert(brand_key, reach);
        }

        Ok(Self {
            athlete,
            team,
            brand,
            brand_reach,
        })
    }

    /// Load catalogs from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| CatalogError::Io(e.to_string()))?;
        let file: CatalogFile =
            serde_json::from_str(&data).map_err(|e| CatalogError::Parse(e.to_string()))?;
        let catalogs = Self::new(file)?;
        tracing::info!(
            athlete_tiers = catalogs.athlete.tiers().len(),
            team_tiers = catalogs.team.tiers().len(),
            brand_tiers = catalogs.brand.tiers().len(),
            "Loaded tier catalogs from file"
        );
        Ok(catalogs)
    }

    /// The catalogs shipped with the service.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(builtin_catalog_file())
    }

    pub fn for_kind(&self, kind: ActorKind) -> &TierCatalog {
        match kind {
            ActorKind::Athlete => &self.athlete,
            ActorKind::Team => &self.team,
            ActorKind::Brand => &self.brand,
        }
    }

    pub fn athlete(&self) -> &TierCatalog {
        &self.athlete
    }

    pub fn brand(&self) -> &TierCatalog {
        &self.brand
    }

    /// Athlete tiers a brand tier may reach.
    pub fn brand_reach(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.brand_reach
    }

    /// Find which kind's catalog a price id belongs to.
    pub fn kind_of_price(&self, price_id: &str) -> Option<ActorKind> {
        [ActorKind::Athlete, ActorKind::Team, ActorKind::Brand]
            .into_iter()
            .find(|&kind| self.for_kind(kind).resolve(price_id).is_some())
    }
}

fn tier(
    key: &str,
    name: &str,
    price_prefix: &str,
    monthly_price_cents: u32,
    yearly_price_cents: u32,
    features: &[&str],
) -> TierDefinition {
    TierDefinition {
        key: key.to_string(),
        name: name.to_string(),
        monthly_price_id: format!("{}_monthly", price_prefix),
        yearly_price_id: format!("{}_yearly", price_prefix),
        monthly_price_cents,
        yearly_price_cents,
        features: features.iter().map(|f| f.to_string()).collect(),
    }
}

fn builtin_catalog_file() -> CatalogFile {
    let athlete = vec![
        tier(
            "3",
            "Tier 3",
            "price_athlete_tier3",
            999,
            9_990,
            &["profile", "browse_tier3_jobs", "bookmarks"],
        ),
        tier(
            "2",
            "Tier 2",
            "price_athlete_tier2",
            1_999,
            19_990,
            &["profile", "browse_tier2_jobs", "bookmarks", "featured_profile"],
        ),
        tier(
            "1",
            "Tier 1",
            "price_athlete_tier1",
            3_999,
            39_990,
            &[
                "profile",
                "browse_all_jobs",
                "bookmarks",
                "featured_profile",
                "priority_applications",
            ],
        ),
    ];

    let team = vec![
        tier(
            "3",
            "Team Tier 3",
            "price_team_tier3",
            4_999,
            49_990,
            &["team_profile", "browse_tier3_jobs", "bookmarks"],
        ),
        tier(
            "2",
            "Team Tier 2",
            "price_team_tier2",
            9_999,
            99_990,
            &["team_profile", "browse_tier2_jobs", "bookmarks", "roster"],
        ),
        tier(
            "1",
            "Team Tier 1",
            "price_team_tier1",
            19_999,
            199_990,
            &[
                "team_profile",
                "browse_all_jobs",
                "bookmarks",
                "roster",
                "priority_applications",
            ],
        ),
    ];

    let brand = vec![
        tier(
            "BASIC",
            "Basic",
            "price_brand_basic",
            9_900,
            99_000,
            &["post_jobs", "reach_tier3_athletes"],
        ),
        tier(
            "PERFORMANCE",
            "Performance",
            "price_brand_performance",
            24_900,
            249_000,
            &["post_jobs", "reach_tier2_athletes", "athlete_search"],
        ),
        tier(
            "ADVANCED",
            "Advanced",
            "price_brand_advanced",
            49_900,
            499_000,
            &[
                "post_jobs",
                "reach_all_athletes",
                "athlete_search",
                "campaign_analytics",
            ],
        ),
    ];

    let brand_reach = BTreeMap::from([
        ("BASIC".to_string(), vec!["3".to_string()]),
        (
            "PERFORMANCE".to_string(),
            vec!["2".to_string(), "3".to_string()],
        ),
        (
            "ADVANCED".to_string(),
            vec!["1".to_string(), "2".to_string(), "3".to_string()],
        ),
    ]);

    CatalogFile {
        athlete,
        team,
        brand,
        brand_reach,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_price_resolves_to_one_tier_and_cycle() {
        let catalogs = Catalogs::builtin().unwrap();

        for kind in [ActorKind::Athlete, ActorKind::Team, ActorKind::Brand] {
            let catalog = catalogs.for_kind(kind);
            let mut seen = HashSet::new();
            for tier in catalog.tiers() {
                for cycle in [BillingCycle::Monthly, BillingCycle::Yearly] {
                    let price_id = tier.price_id(cycle);
                    let resolved = catalog.resolve(price_id).unwrap();
                    assert_eq!(resolved.key(), tier.key);
                    assert_eq!(resolved.cycle, cycle);
                    assert!(seen.insert((resolved.key().to_string(), cycle)));
                }
            }
        }
    }

    #[test]
    fn test_unknown_price_is_not_found() {
        let catalogs = Catalogs::builtin().unwrap();
        assert!(catalogs.athlete().resolve("price_from_another_account").is_none());
        assert!(catalogs.athlete().resolve("").is_none());
        assert!(catalogs.kind_of_price("price_stale").is_none());
    }

    #[test]
    fn test_rank_order_matches_privilege() {
        let catalogs = Catalogs::builtin().unwrap();

        let athlete = catalogs.athlete();
        assert!(athlete.rank("1") > athlete.rank("2"));
        assert!(athlete.rank("2") > athlete.rank("3"));
        assert_eq!(athlete.lowest().key, "3");

        let brand = catalogs.brand();
        assert!(brand.rank("ADVANCED") > brand.rank("PERFORMANCE"));
        assert!(brand.rank("PERFORMANCE") > brand.rank("BASIC"));
    }

    #[test]
    fn test_price_identifies_catalog() {
        let catalogs = Catalogs::builtin().unwrap();
        assert_eq!(
            catalogs.kind_of_price("price_team_tier2_yearly"),
            Some(ActorKind::Team)
        );
        assert_eq!(
            catalogs.kind_of_price("price_brand_basic_monthly"),
            Some(ActorKind::Brand)
        );
    }

    #[test]
    fn test_duplicate_price_rejected() {
        let mut tiers = builtin_catalog_file().athlete;
        tiers[1].yearly_price_id = tiers[0].monthly_price_id.clone();
        assert!(matches!(
            TierCatalog::new(tiers),
            Err(CatalogError::DuplicatePrice(_))
        ));
    }

    #[test]
    fn test_price_shared_across_catalogs_rejected() {
        let mut file = builtin_catalog_file();
        file.team[0].monthly_price_id = file.athlete[0].monthly_price_id.clone();
        assert!(matches!(
            Catalogs::new(file),
            Err(CatalogError::DuplicatePrice(_))
        ));
    }

    #[test]
    fn test_reach_must_name_known_tiers() {
        let mut file = builtin_catalog_file();
        file.brand_reach
            .insert("BASIC".to_string(), vec!["4".to_string()]);
        assert!(matches!(
            Catalogs::new(file),
            Err(CatalogError::UnknownReachTier(_))
        ));
    }

    #[test]
    fn test_catalog_file_round_trips_through_json() {
        let json = serde_json::to_string(&builtin_catalog_file()).unwrap();
        let file: CatalogFile = serde_json::from_str(&json).unwrap();
        let catalogs = Catalogs::new(file).unwrap();
        assert_eq!(catalogs.brand().tiers().len(), 3);
    }
}
