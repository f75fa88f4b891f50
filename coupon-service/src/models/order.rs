//! Request-scoped order facts and eligibility outcomes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Facts about a prospective order used to evaluate coupons.
///
/// `timestamp` is always explicit so evaluation is deterministic; the HTTP
/// layer fills it with the receipt time when the caller omits it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderContext {
    pub user_id: Option<String>,
    pub item_ids: Vec<String>,
    pub categories: Vec<String>,
    pub order_value: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl OrderContext {
    pub fn new(order_value: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: None,
            item_ids: Vec::new(),
            categories: Vec::new(),
            order_value,
            timestamp,
        }
    }

    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.item_ids = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// The first eligibility rule a coupon failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ineligibility {
    Expired,
    BelowMinimumOrderValue,
    NoEligibleItems,
    NoEligibleCategories,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Ineligibility::Expired => "Coupon has expired",
            Ineligibility::BelowMinimumOrderValue => "Order value is below minimum required",
            Ineligibility::NoEligibleItems => "No eligible items in cart",
            Ineligibility::NoEligibleCategories => "No eligible categories in cart",
        };
        f.write_str(message)
    }
}

pub const VALID_COUPON_MESSAGE: &str = "Coupon is valid";

/// Result of evaluating one coupon against one order.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityVerdict {
    pub applicable: bool,
    pub reason: Option<Ineligibility>,
    pub discount: Decimal,
    pub final_amount: Decimal,
}

impl EligibilityVerdict {
    pub fn rejected(reason: Ineligibility) -> Self {
        Self {
            applicable: false,
            reason: Some(reason),
            discount: Decimal::ZERO,
            final_amount: Decimal::ZERO,
        }
    }

    /// `None` when `order_value - discount` does not fit in a `Decimal`.
    pub fn accepted(order_value: Decimal, discount: Decimal) -> Option<Self> {
        Some(Self {
            applicable: true,
            reason: None,
            discount,
            final_amount: order_value.checked_sub(discount)?,
        })
    }

    pub fn message(&self) -> String {
        match self.reason {
            Some(reason) => reason.to_string(),
            None => VALID_COUPON_MESSAGE.to_string(),
        }
    }
}
