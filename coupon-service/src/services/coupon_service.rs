//! Coupon lookups composed with the eligibility engine.

use crate::models::{EligibilityVerdict, OrderContext};
use crate::services::eligibility::{self, ApplicableCoupon};
use crate::services::metrics::{
    APPLICABLE_COUPONS_RETURNED, APPLICABLE_LOOKUPS_TOTAL, COUPON_VALIDATIONS_TOTAL,
};
use crate::services::repository::CouponRepository;
use service_core::error::AppError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;

/// The two public coupon operations.
#[derive(Clone)]
pub struct CouponService {
    repository: Arc<dyn CouponRepository>,
    store_timeout: Duration,
    // Serializes validate() across the whole process. Nothing is written
    // under it today; once redemptions are recorded it should guard only
    // that write.
    validation_lock: Arc<Mutex<()>>,
}

impl CouponService {
    pub fn new(repository: Arc<dyn CouponRepository>, store_timeout: Duration) -> Self {
        Self {
            repository,
            store_timeout,
            validation_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn repository(&self) -> &Arc<dyn CouponRepository> {
        &self.repository
    }

    /// Coupons applicable to `order`, in store order.
    #[instrument(skip(self, order), fields(order_value = %order.order_value))]
    pub async fn list_applicable(
        &self,
        order: &OrderContext,
    ) -> Result<Vec<ApplicableCoupon>, AppError> {
        let coupons = self.bounded(self.repository.find_all()).await?;
        let applicable = eligibility::find_applicable(coupons, order)
            .map_err(|e| AppError::BadRequest(e.into()))?;

        metrics::counter!(APPLICABLE_LOOKUPS_TOTAL).increment(1);
        metrics::histogram!(APPLICABLE_COUPONS_RETURNED).record(applicable.len() as f64);
        tracing::debug!(count = applicable.len(), "Applicable coupons resolved");

        Ok(applicable)
    }

    /// Evaluate the coupon `code` against `order`.
    ///
    /// An ineligible coupon is a successful negative verdict; only an
    /// unknown code is `NotFound`.
    #[instrument(skip(self, order), fields(order_value = %order.order_value))]
    pub async fn validate(
        &self,
        code: &str,
        order: &OrderContext,
    ) -> Result<EligibilityVerdict, AppError> {
        let _guard = self.validation_lock.lock().await;

        let coupon = match self.bounded(self.repository.find_by_code(code)).await {
            Ok(Some(coupon)) => coupon,
            Ok(None) => {
                metrics::counter!(COUPON_VALIDATIONS_TOTAL, "result" => "not_found").increment(1);
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "Coupon '{}' not found",
                    code
                )));
            }
            Err(e) => {
                metrics::counter!(COUPON_VALIDATIONS_TOTAL, "result" => "error").increment(1);
                return Err(e);
            }
        };

        let verdict = match eligibility::evaluate(&coupon, order) {
            Ok(verdict) => verdict,
            Err(e) => {
                metrics::counter!(COUPON_VALIDATIONS_TOTAL, "result" => "error").increment(1);
                return Err(AppError::BadRequest(e.into()));
            }
        };
        let result = if verdict.applicable { "valid" } else { "invalid" };
        metrics::counter!(COUPON_VALIDATIONS_TOTAL, "result" => result).increment(1);
        tracing::info!(code, result, reason = %verdict.message(), "Coupon validated");

        Ok(verdict)
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.bounded(self.repository.health_check()).await
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(timeout = ?self.store_timeout, "Coupon store call timed out");
                Err(AppError::ServiceUnavailable(
                    "coupon store timed out".to_string(),
                ))
            }
        }
    }
}
