// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing customer rollback when the actor record cannot be written.

use axum::http::StatusCode;
use bndls::error::AppError;
use bndls::services::billing::discard_customer_on_error;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::MockBilling;

#[tokio::test]
async fn test_failed_actor_write_deletes_customer() {
    let billing = MockBilling::default();

    let result: Result<(), AppError> = discard_customer_on_error(
        &billing,
        "cus_orphan",
        Err(AppError::Database("write rejected".to_string())),
    )
    .await;

    match result {
        Err(AppError::Database(message)) => assert_eq!(message, "write rejected"),
        other => panic!("expected the original error, got {:?}", other),
    }
    assert_eq!(billing.calls(), vec!["delete_customer:cus_orphan".to_string()]);
}

#[tokio::test]
async fn test_successful_actor_write_keeps_customer() {
    let billing = MockBilling::default();

    let result = discard_customer_on_error(&billing, "cus_kept", Ok(42)).await;

    assert_eq!(result.unwrap(), 42);
    assert!(billing.calls().is_empty());
}

#[tokio::test]
async fn test_register_against_offline_database_creates_no_customer() {
    let (app, state, billing) = common::create_test_app_with_db(common::test_db_offline());
    let token = common::create_test_jwt("uid-offline", &state.config.jwt_signing_key);

    let response = app
        .oneshot(common::json_request(
            "POST",
            "/api/actors",
            &token,
            json!({ "kind": "athlete", "email": "athlete@example.com", "display_name": "Sam" }),
        ))
        .await
        .unwrap();

    // The existence check fails first, so no customer is ever created
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(billing.calls().is_empty());
}

#[tokio::test]
async fn test_register_creates_customer_without_rollback() {
    require_emulator!();

    let (app, state, billing) = common::create_test_app_with_db(common::test_db().await);
    let actor_id = common::unique_id("athlete");
    let token = common::create_test_jwt(&actor_id, &state.config.jwt_signing_key);

    let response = app
        .oneshot(common::json_request(
            "POST",
            "/api/actors",
            &token,
            json!({ "kind": "team", "email": "team@example.com", "display_name": "  Crew  " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = common::body_json(response).await;
    assert_eq!(body["display_name"], "Crew");

    let calls = billing.calls();
    assert_eq!(calls, vec![format!("create_customer:{}", actor_id)]);
    assert!(state.db.get_actor(&actor_id).await.unwrap().is_some());
}
