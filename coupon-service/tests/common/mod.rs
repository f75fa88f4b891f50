#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use coupon_service::config::{
    CounterStoreBackend, CouponConfig, CouponStoreBackend, DatabaseConfig, RateLimitConfig,
    RedisConfig,
};
use coupon_service::models::{Coupon, DiscountType};
use coupon_service::services::{CouponRepository, InMemoryCouponRepository};
use coupon_service::startup::Application;
use rust_decimal::Decimal;
use service_core::config::Config as CoreConfig;
use service_core::throttle::{CounterStore, InMemoryCounterStore};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

pub const GENEROUS_LIMIT: u32 = 10_000;

pub fn test_config(limit: u32) -> CouponConfig {
    CouponConfig {
        common: CoreConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0, // Random port for testing
        },
        service_name: "coupon-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            backend: CouponStoreBackend::Memory,
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        redis: RedisConfig { url: String::new() },
        rate_limit: RateLimitConfig {
            backend: CounterStoreBackend::Memory,
            requests: limit,
            window_seconds: 60,
            trust_forwarded_for: true,
        },
        store_timeout_ms: 500,
    }
}

/// Catalog used across the API tests, in insertion order.
pub fn sample_coupons() -> Vec<Coupon> {
    let next_month = Utc::now() + ChronoDuration::days(30);
    vec![
        Coupon::new("SAVE10", next_month, DiscountType::Percentage, Decimal::from(10)),
        Coupon::new("FLAT15", next_month, DiscountType::Fixed, Decimal::from(15))
            .with_min_order_value(Decimal::from(50)),
        Coupon::new("VITAMINS5", next_month, DiscountType::Fixed, Decimal::from(5))
            .with_categories(["vitamins"]),
        Coupon::new(
            "EXPIRED20",
            Utc::now() - ChronoDuration::days(1),
            DiscountType::Percentage,
            Decimal::from(20),
        ),
    ]
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub repository: Arc<dyn CouponRepository>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(sample_coupons(), GENEROUS_LIMIT).await
    }

    pub async fn spawn_with(coupons: Vec<Coupon>, limit: u32) -> Self {
        let repository: Arc<dyn CouponRepository> =
            Arc::new(InMemoryCouponRepository::with_coupons(coupons));
        let counter_store: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());

        Self::spawn_with_stores(repository, counter_store, limit).await
    }

    pub async fn spawn_with_stores(
        repository: Arc<dyn CouponRepository>,
        counter_store: Arc<dyn CounterStore>,
        limit: u32,
    ) -> Self {
        let app = Application::build_with(test_config(limit), repository.clone(), counter_store)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address,
            port,
            repository,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}
