//! Domain models for coupon-service.

mod coupon;
mod order;

pub use coupon::{Coupon, DiscountType, ParseEnumError, TimeWindow, UsageType};
pub use order::{EligibilityVerdict, Ineligibility, OrderContext, VALID_COUPON_MESSAGE};
