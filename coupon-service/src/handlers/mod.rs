pub mod coupons;
pub mod health;
pub mod metrics;

pub use coupons::{applicable_coupons, validate_coupon};
pub use health::health_check;
