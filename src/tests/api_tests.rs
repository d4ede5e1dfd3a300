use super::*;
use crate::api::build_router;
use crate::api::models::ErrorResponse;
use crate::core::errors::ErrorKind;
use crate::core::services::BalanceReport;
use axum::Router;
use axum::body::{Body, to_bytes};
use http::{Request, StatusCode, header};
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

async fn test_app() -> (Arc<AppService>, Router) {
    let service = Arc::new(create_test_service());
    seed_trip(&service).await;
    (service.clone(), build_router(service))
}

fn bearer(user_id: &str) -> String {
    let token = JwtService::new(TEST_SECRET.to_string())
        .generate_token(user_id)
        .unwrap();
    format!("Bearer {}", token)
}

fn request(method: &str, uri: &str, user_id: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header(header::AUTHORIZATION, bearer(user_id));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_token_is_unauthenticated() {
    let (_, app) = test_app().await;
    let response = app
        .oneshot(request("GET", "/api/groups/trip/balances", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorResponse = read_json(response).await;
    assert_eq!(body.kind, ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let (_, app) = test_app().await;
    let forged = JwtService::new("other-secret".to_string())
        .generate_token("a")
        .unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/groups/trip/balances")
                .header(header::AUTHORIZATION, format!("Bearer {}", forged))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_balances_with_date_filter() {
    let (service, app) = test_app().await;
    add_equal_expense(&service, "a", dec!(90), date(2024, 6, 12), &["a", "b", "c"]).await;
    add_equal_expense(&service, "b", dec!(30), date(2024, 7, 1), &["a", "b", "c"]).await;

    let response = app
        .oneshot(request(
            "GET",
            "/api/groups/trip/balances?from=2024-06-01&to=2024-06-30",
            Some("c"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report: BalanceReport = read_json(response).await;
    assert_eq!(report.balance_of("a"), Some(dec!(60)));
    assert_eq!(report.balance_of("c"), Some(dec!(-30)));
}

#[tokio::test]
async fn test_outsider_gets_forbidden() {
    let (_, app) = test_app().await;
    let response = app
        .oneshot(request("GET", "/api/groups/trip/settlement", Some("mallory"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_lifecycle_over_http() {
    let (_, app) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/groups/trip/payments",
            Some("b"),
            Some(json!({"from_user_id": "b", "to_user_id": "a", "amount": "30", "already_sent": true})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let payment: Payment = read_json(response).await;

    let confirm = format!("/api/payments/{}/confirm", payment.id);
    let response = app
        .clone()
        .oneshot(request("POST", &confirm, Some("a"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request("POST", &confirm, Some("a"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: ErrorResponse = read_json(response).await;
    assert_eq!(body.kind, ErrorKind::Conflict);

    let response = app
        .oneshot(request("POST", &format!("/api/payments/{}/refund", payment.id), Some("a"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_locked_expense_is_423() {
    let (service, app) = test_app().await;
    let dinner = add_equal_expense(&service, "a", dec!(30), date(2024, 6, 12), &["a", "b", "c"]).await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/groups/trip/periods",
            Some("a"),
            Some(json!({"date_from": "2024-06-01", "date_to": "2024-06-30"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/expenses/{}", dinner.expense.id),
            Some("a"),
            Some(json!({"description": "edited"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::LOCKED);
    let body: ErrorResponse = read_json(response).await;
    assert_eq!(body.kind, ErrorKind::Locked);

    let response = app
        .oneshot(request("GET", "/api/expenses/missing", Some("a"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_openapi_are_public() {
    let (_, app) = test_app().await;
    let response = app.clone().oneshot(request("GET", "/", None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request("GET", "/api-docs/openapi.json", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
