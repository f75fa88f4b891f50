//! PostgreSQL coupon store.

use crate::models::{Coupon, DiscountType, TimeWindow, UsageType};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::repository::CouponRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::{Duration, Instant};
use tracing::{info, instrument};
use uuid::Uuid;

const COUPON_COLUMNS: &str = "id, code, expiry_date, usage_type, applicable_item_ids, \
    applicable_categories, min_order_value, valid_time_window, terms_and_conditions, \
    discount_type, discount_value, max_usage_per_user, created_at, updated_at";

/// Row shape of the `coupons` table. Enum columns are plain text.
#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    expiry_date: DateTime<Utc>,
    usage_type: String,
    applicable_item_ids: Vec<String>,
    applicable_categories: Vec<String>,
    min_order_value: Decimal,
    valid_time_window: Option<Json<TimeWindow>>,
    terms_and_conditions: String,
    discount_type: String,
    discount_value: Decimal,
    max_usage_per_user: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = AppError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let usage_type: UsageType = row
            .usage_type
            .parse()
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Coupon '{}': {}", row.code, e)))?;
        let discount_type: DiscountType = row
            .discount_type
            .parse()
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Coupon '{}': {}", row.code, e)))?;

        Ok(Coupon {
            id: row.id,
            code: row.code,
            expiry_date: row.expiry_date,
            usage_type,
            applicable_item_ids: row.applicable_item_ids,
            applicable_categories: row.applicable_categories,
            min_order_value: row.min_order_value,
            valid_time_window: row.valid_time_window.map(|Json(window)| window),
            terms_and_conditions: row.terms_and_conditions,
            discount_type,
            discount_value: row.discount_value,
            max_usage_per_user: row.max_usage_per_user,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn observe(operation: &'static str, started: Instant) {
    metrics::histogram!(DB_QUERY_DURATION, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

/// Coupon store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgCouponRepository {
    pool: PgPool,
}

impl PgCouponRepository {
    #[instrument(skip(database_url), fields(service = "coupon-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl CouponRepository for PgCouponRepository {
    #[instrument(skip(self))]
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, AppError> {
        let started = Instant::now();

        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get coupon: {}", e)))?;

        observe("find_by_code", started);

        row.map(Coupon::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Coupon>, AppError> {
        let started = Instant::now();

        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at, code"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list coupons: {}", e)))?;

        observe("find_all", started);

        rows.into_iter().map(Coupon::try_from).collect()
    }

    #[instrument(skip(self, coupon), fields(code = %coupon.code))]
    async fn create(&self, coupon: &Coupon) -> Result<(), AppError> {
        let started = Instant::now();

        sqlx::query(&format!(
            "INSERT INTO coupons ({COUPON_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(coupon.expiry_date)
        .bind(coupon.usage_type.as_str())
        .bind(&coupon.applicable_item_ids)
        .bind(&coupon.applicable_categories)
        .bind(coupon.min_order_value)
        .bind(coupon.valid_time_window.clone().map(Json))
        .bind(&coupon.terms_and_conditions)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.discount_value)
        .bind(coupon.max_usage_per_user)
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Coupon '{}' already exists", coupon.code))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create coupon: {}", e)),
        })?;

        observe("create", started);
        info!(code = %coupon.code, "Coupon created");

        Ok(())
    }

    #[instrument(skip(self, coupon), fields(code = %coupon.code))]
    async fn update(&self, coupon: &Coupon) -> Result<(), AppError> {
        let started = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET expiry_date = $2,
                usage_type = $3,
                applicable_item_ids = $4,
                applicable_categories = $5,
                min_order_value = $6,
                valid_time_window = $7,
                terms_and_conditions = $8,
                discount_type = $9,
                discount_value = $10,
                max_usage_per_user = $11,
                updated_at = NOW()
            WHERE code = $1
            "#,
        )
        .bind(&coupon.code)
        .bind(coupon.expiry_date)
        .bind(coupon.usage_type.as_str())
        .bind(&coupon.applicable_item_ids)
        .bind(&coupon.applicable_categories)
        .bind(coupon.min_order_value)
        .bind(coupon.valid_time_window.clone().map(Json))
        .bind(&coupon.terms_and_conditions)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.discount_value)
        .bind(coupon.max_usage_per_user)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update coupon: {}", e)))?;

        observe("update", started);

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Coupon '{}' not found",
                coupon.code
            )));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, code: &str) -> Result<(), AppError> {
        let started = Instant::now();

        sqlx::query("DELETE FROM coupons WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete coupon: {}", e))
            })?;

        observe("delete", started);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }
}
