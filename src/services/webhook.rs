// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe webhook signature verification and event classification.
//!
//! Nothing here touches storage or the network: the route verifies the
//! signature, classifies the event, and only then looks up the actor.

use crate::models::{ActorKind, SubscriptionSnapshot};
use crate::services::stripe::{StripeSubscription, METADATA_ACTOR_KIND};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("No matching signature")]
    SignatureMismatch,

    #[error("Timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid signing key")]
    InvalidKey,
}

/// Verifies `Stripe-Signature` headers for one endpoint secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Compute the `v1` signature for a timestamp and body.
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
        Ok(hex::encode(self.mac(timestamp, payload)?.finalize().into_bytes()))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::InvalidKey)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Check `header` against `payload` at time `now` (unix seconds).
    ///
    /// The header is `t=<unix>,v1=<hex>[,v1=<hex>...]`; any matching `v1`
    /// entry is accepted, other schemes are ignored.
    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> Result<(), WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| WebhookError::MalformedHeader)?,
                    );
                }
                Some(("v1", value)) => signatures.push(value),
                Some(_) => {}
                None => return Err(WebhookError::MalformedHeader),
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader);
        }

        let expected = self.mac(timestamp, payload)?.finalize().into_bytes();
        let matched = signatures.iter().any(|sig| {
            hex::decode(sig)
                .map(|bytes| bool::from(bytes.as_slice().ct_eq(expected.as_slice())))
                .unwrap_or(false)
        });

        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(WebhookError::TimestampOutOfTolerance);
        }

        Ok(())
    }
}

/// What the handler should do with a verified event.
#[derive(Debug, Clone)]
pub enum ClassifiedEvent {
    /// Checkout finished; the subscription must be fetched to get its state.
    CheckoutCompleted {
        event_id: String,
        customer_id: String,
        subscription_id: String,
        actor_kind: Option<ActorKind>,
    },
    SubscriptionUpdated {
        event_id: String,
        customer_id: String,
        actor_kind: Option<ActorKind>,
        snapshot: SubscriptionSnapshot,
    },
    SubscriptionDeleted {
        event_id: String,
        customer_id: String,
        actor_kind: Option<ActorKind>,
        snapshot: SubscriptionSnapshot,
    },
    /// Recognised envelope, nothing to do
    Ignored { event_id: String, event_type: String },
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn invalid(e: impl std::fmt::Display) -> WebhookError {
    WebhookError::InvalidPayload(e.to_string())
}

/// Parse a verified payload into the event the handler acts on.
pub fn classify(payload: &[u8]) -> Result<ClassifiedEvent, WebhookError> {
    let event: RawEvent = serde_json::from_slice(payload).map_err(invalid)?;

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: RawCheckoutSession =
                serde_json::from_value(event.data.object).map_err(invalid)?;

            // Payment-mode sessions carry no subscription
            let (Some(customer_id), Some(subscription_id)) =
                (session.customer, session.subscription)
            else {
                tracing::debug!(
                    event_id = %event.id,
                    mode = ?session.mode,
                    "Checkout session without subscription"
                );
                return Ok(ClassifiedEvent::Ignored {
                    event_id: event.id,
                    event_type: event.event_type,
                });
            };

            Ok(ClassifiedEvent::CheckoutCompleted {
                event_id: event.id,
                customer_id,
                subscription_id,
                actor_kind: session
                    .metadata
                    .get(METADATA_ACTOR_KIND)
                    .and_then(|kind| kind.parse().ok()),
            })
        }
        "customer.subscription.updated" | "customer.subscription.deleted" => {
            let subscription: StripeSubscription =
                serde_json::from_value(event.data.object).map_err(invalid)?;
            let snapshot = subscription.snapshot().map_err(invalid)?;
            let actor_kind = subscription.actor_kind();
            let customer_id = subscription.customer;

            if event.event_type == "customer.subscription.updated" {
                Ok(ClassifiedEvent::SubscriptionUpdated {
                    event_id: event.id,
                    customer_id,
                    actor_kind,
                    snapshot,
                })
            } else {
                Ok(ClassifiedEvent::SubscriptionDeleted {
                    event_id: event.id,
                    customer_id,
                    actor_kind,
                    snapshot,
                })
            }
        }
        _ => Ok(ClassifiedEvent::Ignored {
            event_id: event.id,
            event_type: event.event_type,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionStatus;

    const NOW: i64 = 1_767_225_600;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_unit", 300)
    }

    #[test]
    fn test_valid_signature_accepted() {
        let v = verifier();
        let body = br#"{"id":"evt_1"}"#;
        let header = format!("t={},v1={}", NOW, v.sign(NOW, body).unwrap());
        assert_eq!(v.verify(body, &header, NOW + 10), Ok(()));
    }

    #[test]
    fn test_any_v1_entry_may_match() {
        let v = verifier();
        let body = b"{}";
        let header = format!("t={},v1={},v0=abc,v1={}", NOW, "00".repeat(32), v.sign(NOW, body).unwrap());
        assert_eq!(v.verify(body, &header, NOW), Ok(()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let v = verifier();
        let header = format!("t={},v1={}", NOW, v.sign(NOW, b"original").unwrap());
        assert_eq!(
            v.verify(b"tampered", &header, NOW),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"{}";
        let header = format!("t={},v1={}", NOW, WebhookVerifier::new("other", 300).sign(NOW, body).unwrap());
        assert_eq!(
            verifier().verify(body, &header, NOW),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let v = verifier();
        let body = b"{}";
        let header = format!("t={},v1={}", NOW, v.sign(NOW, body).unwrap());
        assert_eq!(
            v.verify(body, &header, NOW + 301),
            Err(WebhookError::TimestampOutOfTolerance)
        );
        assert_eq!(v.verify(body, &header, NOW + 300), Ok(()));
    }

    #[test]
    fn test_malformed_headers() {
        let v = verifier();
        let timestamp_only = format!("t={}", NOW);
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", timestamp_only.as_str()] {
            assert_eq!(
                v.verify(b"{}", header, NOW),
                Err(WebhookError::MalformedHeader),
                "{header:?}"
            );
        }
    }

    #[test]
    fn test_classify_checkout_completed() {
        let body = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_1",
                "mode": "subscription",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "actor_kind": "athlete" }
            }}
        });
        let event = classify(body.to_string().as_bytes()).unwrap();
        match event {
            ClassifiedEvent::CheckoutCompleted {
                customer_id,
                subscription_id,
                actor_kind,
                ..
            } => {
                assert_eq!(customer_id, "cus_1");
                assert_eq!(subscription_id, "sub_1");
                assert_eq!(actor_kind, Some(ActorKind::Athlete));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_subscription_deleted() {
        let body = serde_json::json!({
            "id": "evt_2",
            "type": "customer.subscription.deleted",
            "data": { "object": {
                "id": "sub_1",
                "customer": "cus_1",
                "status": "canceled",
                "current_period_start": NOW,
                "current_period_end": NOW + 86_400,
                "items": { "data": [{ "id": "si_1", "price": { "id": "price_x" } }] }
            }}
        });
        match classify(body.to_string().as_bytes()).unwrap() {
            ClassifiedEvent::SubscriptionDeleted {
                snapshot,
                actor_kind,
                ..
            } => {
                assert_eq!(snapshot.status, SubscriptionStatus::Canceled);
                assert_eq!(snapshot.price_id.as_deref(), Some("price_x"));
                assert_eq!(actor_kind, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_unhandled_and_invalid() {
        let body = serde_json::json!({
            "id": "evt_3",
            "type": "invoice.paid",
            "data": { "object": {} }
        });
        assert!(matches!(
            classify(body.to_string().as_bytes()).unwrap(),
            ClassifiedEvent::Ignored { .. }
        ));
        assert!(matches!(
            classify(b"not json"),
            Err(WebhookError::InvalidPayload(_))
        ));
    }
}
