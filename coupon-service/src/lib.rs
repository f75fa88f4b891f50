pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, rate_limit::throttle_middleware, tracing::request_id_middleware,
};
use service_core::throttle::RequestThrottle;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::CouponConfig;
use crate::services::CouponService;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::coupons::applicable_coupons,
        handlers::coupons::validate_coupon,
    ),
    components(
        schemas(
            dtos::coupons::OrderRequest,
            dtos::coupons::ValidateCouponRequest,
            dtos::coupons::ApplicableCouponDto,
            dtos::coupons::ApplicableCouponsResponse,
            dtos::coupons::ValidationResponse,
            dtos::health::HealthResponse,
            dtos::health::DependencyStatus,
            dtos::ErrorResponse,
            models::Coupon,
            models::DiscountType,
            models::UsageType,
            models::TimeWindow,
        )
    ),
    tags(
        (name = "Coupons", description = "Coupon eligibility and pricing"),
        (name = "Health", description = "Dependency health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: CouponConfig,
    pub coupon_service: CouponService,
    pub throttle: RequestThrottle,
}

pub fn build_router(state: AppState) -> Router {
    // Throttled API routes
    let api_routes = Router::new()
        .route(
            "/api/v1/coupons/applicable",
            get(handlers::applicable_coupons).post(handlers::applicable_coupons),
        )
        .route("/api/v1/coupons/validate", post(handlers::validate_coupon))
        .layer(from_fn_with_state(
            state.throttle.clone(),
            throttle_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(api_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
}
