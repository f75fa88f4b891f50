//! Coupon eligibility rules and discount calculation.
//!
//! Everything here is pure: no I/O, no clock reads, no shared state.

use crate::models::{Coupon, DiscountType, EligibilityVerdict, Ineligibility, OrderContext};
use rust_decimal::Decimal;
use thiserror::Error;

/// The discount or final amount does not fit in a `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("discount for coupon '{code}' is out of range for this order value")]
pub struct DiscountOutOfRange {
    pub code: String,
}

/// A coupon that applies to an order, with the discount it would yield.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicableCoupon {
    pub coupon: Coupon,
    pub discount: Decimal,
}

/// First failing rule for `coupon` against `order`, checked in order:
/// expiry, minimum order value, eligible items, eligible categories.
pub fn check(coupon: &Coupon, order: &OrderContext) -> Option<Ineligibility> {
    if order.timestamp > coupon.expiry_date {
        return Some(Ineligibility::Expired);
    }

    if order.order_value < coupon.min_order_value {
        return Some(Ineligibility::BelowMinimumOrderValue);
    }

    if !matches_any(&coupon.applicable_item_ids, &order.item_ids) {
        return Some(Ineligibility::NoEligibleItems);
    }

    if !matches_any(&coupon.applicable_categories, &order.categories) {
        return Some(Ineligibility::NoEligibleCategories);
    }

    None
}

/// An empty allow-list is unrestricted; otherwise at least one cart entry
/// must appear in it.
fn matches_any(allowed: &[String], present: &[String]) -> bool {
    allowed.is_empty() || present.iter().any(|p| allowed.contains(p))
}

/// Discount for `order_value`. Not clamped: a fixed discount may exceed the
/// order value and a percentage may exceed 100.
pub fn discount_for(
    coupon: &Coupon,
    order_value: Decimal,
) -> Result<Decimal, DiscountOutOfRange> {
    let discount = match coupon.discount_type {
        DiscountType::Percentage => coupon
            .discount_value
            .checked_div(Decimal::ONE_HUNDRED)
            .and_then(|rate| order_value.checked_mul(rate)),
        DiscountType::Fixed => Some(coupon.discount_value),
    };
    discount.ok_or_else(|| out_of_range(coupon))
}

pub fn evaluate(
    coupon: &Coupon,
    order: &OrderContext,
) -> Result<EligibilityVerdict, DiscountOutOfRange> {
    match check(coupon, order) {
        Some(reason) => Ok(EligibilityVerdict::rejected(reason)),
        None => {
            let discount = discount_for(coupon, order.order_value)?;
            EligibilityVerdict::accepted(order.order_value, discount)
                .ok_or_else(|| out_of_range(coupon))
        }
    }
}

/// Coupons from `coupons` that apply to `order`, in their original order.
pub fn find_applicable(
    coupons: Vec<Coupon>,
    order: &OrderContext,
) -> Result<Vec<ApplicableCoupon>, DiscountOutOfRange> {
    coupons
        .into_iter()
        .filter(|coupon| check(coupon, order).is_none())
        .map(|coupon| {
            let discount = discount_for(&coupon, order.order_value)?;
            Ok(ApplicableCoupon { coupon, discount })
        })
        .collect()
}

fn out_of_range(coupon: &Coupon) -> DiscountOutOfRange {
    DiscountOutOfRange {
        code: coupon.code.clone(),
    }
}
