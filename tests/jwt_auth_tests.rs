// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication tests.
//!
//! These tests verify that session tokens minted by `create_jwt` can be
//! decoded with the claims the middleware expects.

use bndls::middleware::auth::{create_jwt, Claims};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

const SIGNING_KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

#[test]
fn test_jwt_roundtrip() {
    let token = create_jwt("firebase-uid-abc", SIGNING_KEY).expect("Failed to create JWT");

    let key = DecodingKey::from_secret(SIGNING_KEY);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(&token, &key, &validation)
        .expect("Failed to decode JWT - check Claims struct compatibility");

    assert_eq!(token_data.claims.sub, "firebase-uid-abc");
    assert!(token_data.claims.exp > token_data.claims.iat);
    assert_eq!(token_data.claims.exp - token_data.claims.iat, 7 * 24 * 60 * 60);
}

#[test]
fn test_jwt_wrong_key_rejected() {
    let token = create_jwt("uid-1", SIGNING_KEY).unwrap();

    let key = DecodingKey::from_secret(b"a_completely_different_signing_key");
    let result = decode::<Claims>(&token, &key, &Validation::new(Algorithm::HS256));

    assert!(result.is_err());
}

#[test]
fn test_jwt_expired_rejected() {
    let claims = Claims {
        sub: "uid-1".to_string(),
        iat: 1_000_000,
        exp: 1_000_060,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SIGNING_KEY),
    )
    .unwrap();

    let key = DecodingKey::from_secret(SIGNING_KEY);
    let result = decode::<Claims>(&token, &key, &Validation::new(Algorithm::HS256));

    assert!(result.is_err());
}
