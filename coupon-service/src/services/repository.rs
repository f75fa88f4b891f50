//! Coupon store port and the in-memory implementation.

use crate::models::Coupon;
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use tokio::sync::RwLock;

/// Durable coupon storage keyed by the unique coupon code.
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// `Ok(None)` when no coupon has this code.
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, AppError>;

    /// Every coupon, in the store's stable order.
    async fn find_all(&self) -> Result<Vec<Coupon>, AppError>;

    async fn create(&self, coupon: &Coupon) -> Result<(), AppError>;

    async fn update(&self, coupon: &Coupon) -> Result<(), AppError>;

    async fn delete(&self, code: &str) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// Insertion-ordered store for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryCouponRepository {
    coupons: RwLock<Vec<Coupon>>,
}

impl InMemoryCouponRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coupons(coupons: Vec<Coupon>) -> Self {
        Self {
            coupons: RwLock::new(coupons),
        }
    }
}

#[async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, AppError> {
        let coupons = self.coupons.read().await;
        Ok(coupons.iter().find(|c| c.code == code).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Coupon>, AppError> {
        Ok(self.coupons.read().await.clone())
    }

    async fn create(&self, coupon: &Coupon) -> Result<(), AppError> {
        let mut coupons = self.coupons.write().await;
        if coupons.iter().any(|c| c.code == coupon.code) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Coupon '{}' already exists",
                coupon.code
            )));
        }
        coupons.push(coupon.clone());
        Ok(())
    }

    async fn update(&self, coupon: &Coupon) -> Result<(), AppError> {
        let mut coupons = self.coupons.write().await;
        let existing = coupons
            .iter_mut()
            .find(|c| c.code == coupon.code)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Coupon '{}' not found", coupon.code))
            })?;
        *existing = Coupon {
            updated_at: Utc::now(),
            ..coupon.clone()
        };
        Ok(())
    }

    async fn delete(&self, code: &str) -> Result<(), AppError> {
        self.coupons.write().await.retain(|c| c.code != code);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
