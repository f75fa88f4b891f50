//! Coupon model for coupon-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// How often a coupon may be redeemed. Informational only; redemption
/// tracking is not performed by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    OneTime,
    MultiUse,
    TimeBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is a percentage of the order value (0-100, unclamped).
    Percentage,
    /// `discount_value` is an absolute amount.
    Fixed,
}

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageType::OneTime => "one_time",
            UsageType::MultiUse => "multi_use",
            UsageType::TimeBased => "time_based",
        }
    }
}

impl FromStr for UsageType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_time" => Ok(UsageType::OneTime),
            "multi_use" => Ok(UsageType::MultiUse),
            "time_based" => Ok(UsageType::TimeBased),
            other => Err(ParseEnumError {
                kind: "usage type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl FromStr for DiscountType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            other => Err(ParseEnumError {
                kind: "discount type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Period during which a time-based coupon is meant to be redeemable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Promotional coupon, unique by `code`.
///
/// Empty `applicable_item_ids` / `applicable_categories` mean the coupon is
/// not restricted along that dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub id: Uuid,
    #[schema(example = "SAVE10")]
    pub code: String,
    pub expiry_date: DateTime<Utc>,
    pub usage_type: UsageType,
    #[serde(default)]
    pub applicable_item_ids: Vec<String>,
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[schema(value_type = f64, example = 100.0)]
    pub min_order_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_time_window: Option<TimeWindow>,
    #[serde(default)]
    pub terms_and_conditions: String,
    pub discount_type: DiscountType,
    #[schema(value_type = f64, example = 10.0)]
    pub discount_value: Decimal,
    pub max_usage_per_user: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// A coupon with no item/category restrictions, no minimum order value,
    /// and the given discount. Timestamps are set to now.
    pub fn new(
        code: impl Into<String>,
        expiry_date: DateTime<Utc>,
        discount_type: DiscountType,
        discount_value: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            expiry_date,
            usage_type: UsageType::MultiUse,
            applicable_item_ids: Vec::new(),
            applicable_categories: Vec::new(),
            min_order_value: Decimal::ZERO,
            valid_time_window: None,
            terms_and_conditions: String::new(),
            discount_type,
            discount_value,
            max_usage_per_user: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_min_order_value(mut self, value: Decimal) -> Self {
        self.min_order_value = value;
        self
    }

    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicable_item_ids = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicable_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_usage_type(mut self, usage_type: UsageType) -> Self {
        self.usage_type = usage_type;
        self
    }

    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.valid_time_window = Some(window);
        self
    }
}
