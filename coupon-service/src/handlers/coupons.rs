use axum::{extract::State, Json};
use chrono::Utc;
use service_core::error::AppError;

use crate::dtos::coupons::{
    ApplicableCouponDto, ApplicableCouponsResponse, OrderRequest, ValidateCouponRequest,
    ValidationResponse,
};
use crate::dtos::ErrorResponse;
use crate::utils::ValidatedJson;
use crate::AppState;

/// List coupons applicable to an order
#[utoipa::path(
    post,
    path = "/api/v1/coupons/applicable",
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Applicable coupons in catalog order", body = ApplicableCouponsResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 503, description = "Coupon or counter store unavailable", body = ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn applicable_coupons(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<OrderRequest>,
) -> Result<Json<ApplicableCouponsResponse>, AppError> {
    let order = req.into_context(Utc::now());

    let applicable = state.coupon_service.list_applicable(&order).await?;

    Ok(Json(ApplicableCouponsResponse {
        applicable_coupons: applicable
            .into_iter()
            .map(ApplicableCouponDto::from)
            .collect(),
    }))
}

/// Validate a coupon against an order and price it
#[utoipa::path(
    post,
    path = "/api/v1/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Eligibility verdict; ineligible coupons report is_valid = false", body = ValidationResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 404, description = "Unknown coupon code", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 503, description = "Coupon or counter store unavailable", body = ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ValidateCouponRequest>,
) -> Result<Json<ValidationResponse>, AppError> {
    let (code, order) = req.into_parts(Utc::now());

    let verdict = state.coupon_service.validate(&code, &order).await?;

    Ok(Json(ValidationResponse::from(verdict)))
}
