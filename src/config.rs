// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment and read
//! once at startup.

use std::env;

/// Default Stripe REST endpoint.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Accepted clock skew between a webhook's signed timestamp and now.
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for checkout/portal redirects
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Stripe API base URL (overridable for tests)
    pub stripe_api_base: String,
    /// Optional JSON file replacing the built-in tier catalogs
    pub tier_catalog_file: Option<String>,
    /// Webhook timestamp tolerance in seconds
    pub webhook_tolerance_secs: i64,

    // --- Secrets ---
    /// Stripe secret API key
    pub stripe_secret_key: String,
    /// Stripe webhook endpoint signing secret
    pub stripe_webhook_secret: String,
    /// JWT signing key shared with the identity provider (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let webhook_tolerance_secs = match env::var("WEBHOOK_TOLERANCE_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("WEBHOOK_TOLERANCE_SECS"))?,
            Err(_) => DEFAULT_WEBHOOK_TOLERANCE_SECS,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| STRIPE_API_BASE.to_string()),
            tier_catalog_file: env::var("TIER_CATALOG_FILE").ok(),
            webhook_tolerance_secs,

            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRIPE_SECRET_KEY"))?,
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            stripe_api_base: "http://127.0.0.1:12111/v1".to_string(),
            tier_catalog_file: None,
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
            stripe_secret_key: "sk_test_dummy".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Where the processor sends the user after checkout or the portal.
    pub fn billing_return_url(&self) -> String {
        format!("{}/settings/billing", self.frontend_url.trim_end_matches('/'))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("STRIPE_SECRET_KEY", " sk_test_123 ");
        env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_abc");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.stripe_secret_key, "sk_test_123");
        assert_eq!(config.stripe_webhook_secret, "whsec_abc");
        assert_eq!(config.port, 8080);
        assert_eq!(config.webhook_tolerance_secs, DEFAULT_WEBHOOK_TOLERANCE_SECS);
    }

    #[test]
    fn test_billing_return_url_strips_trailing_slash() {
        let mut config = Config::test_default();
        config.frontend_url = "https://bndls.example/".to_string();
        assert_eq!(
            config.billing_return_url(),
            "https://bndls.example/settings/billing"
        );
    }
}
