mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use common::{sample_coupons, test_config, TestApp, GENEROUS_LIMIT};
use coupon_service::models::{Coupon, DiscountType};
use coupon_service::services::{CouponService, InMemoryCouponRepository};
use coupon_service::{build_router, AppState};
use http_body_util::BodyExt;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use service_core::throttle::{InMemoryCounterStore, RequestThrottle};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn router(coupons: Vec<Coupon>) -> Router {
    let config = test_config(GENEROUS_LIMIT);
    let throttle = RequestThrottle::new(
        Arc::new(InMemoryCounterStore::new()),
        config.throttle_config().unwrap(),
    );
    let coupon_service = CouponService::new(
        Arc::new(InMemoryCouponRepository::with_coupons(coupons)),
        Duration::from_millis(500),
    );

    build_router(AppState {
        config,
        coupon_service,
        throttle,
    })
}

fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn codes(body: &Value) -> Vec<String> {
    body["applicable_coupons"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["coupon_code"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn applicable_coupons_are_filtered_in_catalog_order() {
    let app = router(sample_coupons());

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/coupons/applicable",
            &json!({ "item_ids": ["sku-1"], "categories": ["skincare"], "order_value": 100 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(codes(&body), vec!["SAVE10", "FLAT15"]);
    assert_eq!(body["applicable_coupons"][0]["discount_value"].as_f64(), Some(10.0));
    assert_eq!(body["applicable_coupons"][1]["discount_value"].as_f64(), Some(15.0));
}

#[tokio::test]
async fn applicable_coupons_accepts_get_with_json_body() {
    let app = router(sample_coupons());

    let response = app
        .oneshot(json_request(
            Method::GET,
            "/api/v1/coupons/applicable",
            &json!({ "categories": ["vitamins"], "order_value": 20 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(codes(&body), vec!["SAVE10", "VITAMINS5"]);
}

#[tokio::test]
async fn applicable_coupons_is_idempotent() {
    let app = router(sample_coupons());
    let order = json!({ "categories": ["vitamins"], "order_value": 75 });

    let first = body_json(
        app.clone()
            .oneshot(json_request(Method::POST, "/api/v1/coupons/applicable", &order))
            .await
            .unwrap(),
    )
    .await;
    let second = body_json(
        app.oneshot(json_request(Method::POST, "/api/v1/coupons/applicable", &order))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first, second);
    assert_eq!(codes(&first), vec!["SAVE10", "FLAT15", "VITAMINS5"]);
}

#[tokio::test]
async fn validate_percentage_coupon() {
    let app = router(sample_coupons());

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/coupons/validate",
            &json!({ "code": "SAVE10", "order_value": 100 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["message"], "Coupon is valid");
    assert_eq!(body["discount"].as_f64(), Some(10.0));
    assert_eq!(body["final_amount"].as_f64(), Some(90.0));
}

#[tokio::test]
async fn validate_fixed_coupon() {
    let app = router(sample_coupons());

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/coupons/validate",
            &json!({ "code": "FLAT15", "user_id": "user-1", "order_value": 100 }),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["discount"].as_f64(), Some(15.0));
    assert_eq!(body["final_amount"].as_f64(), Some(85.0));
}

#[tokio::test]
async fn ineligible_coupon_is_a_successful_negative_verdict() {
    let app = router(sample_coupons());

    let expired = body_json(
        app.clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/coupons/validate",
                &json!({ "code": "EXPIRED20", "order_value": 100 }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(expired["is_valid"], false);
    assert_eq!(expired["message"], "Coupon has expired");
    assert_eq!(expired["discount"].as_f64(), Some(0.0));

    let below_minimum = body_json(
        app.clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/coupons/validate",
                &json!({ "code": "FLAT15", "order_value": 49 }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(below_minimum["message"], "Order value is below minimum required");

    let wrong_category = body_json(
        app.oneshot(json_request(
            Method::POST,
            "/api/v1/coupons/validate",
            &json!({ "code": "VITAMINS5", "categories": ["skincare"], "order_value": 10 }),
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(wrong_category["message"], "No eligible categories in cart");
}

#[tokio::test]
async fn explicit_timestamp_drives_expiry() {
    let app = router(sample_coupons());
    let before_expiry = Utc::now() - ChronoDuration::days(2);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/coupons/validate",
            &json!({
                "code": "EXPIRED20",
                "order_value": 50,
                "timestamp": before_expiry.to_rfc3339(),
            }),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["final_amount"].as_f64(), Some(40.0));
}

#[tokio::test]
async fn unknown_code_returns_404() {
    let app = router(sample_coupons());

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/coupons/validate",
            &json!({ "code": "NOPE", "order_value": 100 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("NOPE"));
    assert!(body.get("is_valid").is_none());
}

#[tokio::test]
async fn malformed_json_returns_400() {
    let app = router(sample_coupons());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/coupons/validate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"code\": \"SAVE10\", "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid request body");
}

#[tokio::test]
async fn invalid_input_returns_422() {
    let app = router(sample_coupons());

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/coupons/validate",
            &json!({ "code": "", "order_value": -5 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Validation error");
}

#[tokio::test]
async fn unclamped_fixed_discount_can_exceed_order_value() {
    let app = router(vec![Coupon::new(
        "BIGFLAT",
        Utc::now() + ChronoDuration::days(1),
        DiscountType::Fixed,
        Decimal::from(150),
    )]);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/coupons/validate",
            &json!({ "code": "BIGFLAT", "order_value": 100 }),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["final_amount"].as_f64(), Some(-50.0));
}

#[tokio::test]
async fn discount_overflow_returns_400() {
    let huge = Coupon::new(
        "HUGE",
        Utc::now() + ChronoDuration::days(1),
        DiscountType::Percentage,
        Decimal::from(150),
    );
    let order = json!({ "code": "HUGE", "order_value": 7e28 });

    let validated = router(vec![huge.clone()])
        .oneshot(json_request(Method::POST, "/api/v1/coupons/validate", &order))
        .await
        .unwrap();
    assert_eq!(validated.status(), StatusCode::BAD_REQUEST);
    let body = body_json(validated).await;
    assert!(body["error"].as_str().unwrap().contains("HUGE"));

    let listed = router(vec![huge])
        .oneshot(json_request(Method::POST, "/api/v1/coupons/applicable", &order))
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = router(sample_coupons());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-123");
}

#[tokio::test]
async fn spawned_server_serves_coupon_api() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .post(app.url("/api/v1/coupons/validate"))
        .json(&json!({ "code": "SAVE10", "order_value": 250 }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().get("x-ratelimit-limit").is_some());

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["discount"].as_f64(), Some(25.0));
    assert_eq!(body["final_amount"].as_f64(), Some(225.0));
}

#[tokio::test]
async fn coupons_added_to_the_store_become_applicable() {
    let app = TestApp::spawn_with(Vec::new(), GENEROUS_LIMIT).await;
    let client = Client::new();
    let order = json!({ "order_value": 40 });

    let before: Value = client
        .post(app.url("/api/v1/coupons/applicable"))
        .json(&order)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(codes(&before).is_empty());

    app.repository
        .create(&Coupon::new(
            "WELCOME",
            Utc::now() + ChronoDuration::days(1),
            DiscountType::Fixed,
            Decimal::from(5),
        ))
        .await
        .unwrap();

    let after: Value = client
        .post(app.url("/api/v1/coupons/applicable"))
        .json(&order)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(codes(&after), vec!["WELCOME"]);
}
