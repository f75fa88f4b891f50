pub mod coupon_service;
pub mod database;
pub mod eligibility;
pub mod metrics;
pub mod repository;

pub use coupon_service::CouponService;
pub use database::PgCouponRepository;
pub use eligibility::ApplicableCoupon;
pub use metrics::{get_metrics, init_metrics};
pub use repository::{CouponRepository, InMemoryCouponRepository};
