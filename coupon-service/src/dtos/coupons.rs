use crate::models::{EligibilityVerdict, OrderContext};
use crate::services::ApplicableCoupon;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Order value must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Cart contents used to look up applicable coupons.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OrderRequest {
    #[schema(example = "user-42")]
    pub user_id: Option<String>,

    #[serde(default)]
    #[schema(example = json!(["sku-1", "sku-2"]))]
    pub item_ids: Vec<String>,

    #[serde(default)]
    #[schema(example = json!(["vitamins"]))]
    pub categories: Vec<String>,

    #[validate(custom(function = "non_negative"))]
    #[schema(value_type = f64, example = 120.5)]
    pub order_value: Decimal,

    /// Evaluation time; defaults to when the request was received.
    pub timestamp: Option<DateTime<Utc>>,
}

impl OrderRequest {
    pub fn into_context(self, received_at: DateTime<Utc>) -> OrderContext {
        OrderContext {
            user_id: self.user_id,
            item_ids: self.item_ids,
            categories: self.categories,
            order_value: self.order_value,
            timestamp: self.timestamp.unwrap_or(received_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    #[schema(example = "SAVE10")]
    pub code: String,

    #[schema(example = "user-42")]
    pub user_id: Option<String>,

    #[serde(default)]
    pub item_ids: Vec<String>,

    #[serde(default)]
    pub categories: Vec<String>,

    #[validate(custom(function = "non_negative"))]
    #[schema(value_type = f64, example = 100.0)]
    pub order_value: Decimal,

    pub timestamp: Option<DateTime<Utc>>,
}

impl ValidateCouponRequest {
    /// Split into the coupon code and the order it is evaluated against.
    pub fn into_parts(self, received_at: DateTime<Utc>) -> (String, OrderContext) {
        let order = OrderContext {
            user_id: self.user_id,
            item_ids: self.item_ids,
            categories: self.categories,
            order_value: self.order_value,
            timestamp: self.timestamp.unwrap_or(received_at),
        };
        (self.code, order)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplicableCouponDto {
    #[schema(example = "SAVE10")]
    pub coupon_code: String,
    #[schema(value_type = f64, example = 12.05)]
    pub discount_value: Decimal,
}

impl From<ApplicableCoupon> for ApplicableCouponDto {
    fn from(applicable: ApplicableCoupon) -> Self {
        Self {
            coupon_code: applicable.coupon.code,
            discount_value: applicable.discount,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplicableCouponsResponse {
    pub applicable_coupons: Vec<ApplicableCouponDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationResponse {
    #[schema(example = true)]
    pub is_valid: bool,
    #[schema(example = "Coupon is valid")]
    pub message: String,
    #[schema(value_type = f64, example = 10.0)]
    pub discount: Decimal,
    #[schema(value_type = f64, example = 90.0)]
    pub final_amount: Decimal,
}

impl From<EligibilityVerdict> for ValidationResponse {
    fn from(verdict: EligibilityVerdict) -> Self {
        Self {
            is_valid: verdict.applicable,
            message: verdict.message(),
            discount: verdict.discount,
            final_amount: verdict.final_amount,
        }
    }
}
