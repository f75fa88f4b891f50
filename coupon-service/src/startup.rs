use crate::config::{CounterStoreBackend, CouponConfig, CouponStoreBackend};
use crate::services::{
    init_metrics, CouponRepository, CouponService, InMemoryCouponRepository, PgCouponRepository,
};
use crate::{build_router, AppState};
use axum::Router;
use service_core::error::AppError;
use service_core::throttle::{
    CounterStore, InMemoryCounterStore, RedisCounterStore, RequestThrottle,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Connect the configured coupon and counter stores, then bind.
    pub async fn build(config: CouponConfig) -> Result<Self, AppError> {
        let repository: Arc<dyn CouponRepository> = match config.database.backend {
            CouponStoreBackend::Postgres => {
                let db = PgCouponRepository::connect(
                    &config.database.url,
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    e
                })?;
                db.run_migrations().await.map_err(|e| {
                    tracing::error!("Failed to run database migrations: {}", e);
                    e
                })?;
                Arc::new(db)
            }
            CouponStoreBackend::Memory => {
                tracing::warn!("Using in-memory coupon store; coupons are not persisted");
                Arc::new(InMemoryCouponRepository::new())
            }
        };

        let counter_store: Arc<dyn CounterStore> = match config.rate_limit.backend {
            CounterStoreBackend::Redis => Arc::new(
                RedisCounterStore::connect(&config.redis.url)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to Redis: {}", e);
                        AppError::InternalError(e)
                    })?,
            ),
            CounterStoreBackend::Memory => {
                tracing::warn!("Using in-process rate limit counters; limits are per instance");
                let store = Arc::new(InMemoryCounterStore::new());
                store.spawn_purge_task(config.throttle_config()?.window);
                store
            }
        };

        Self::build_with(config, repository, counter_store).await
    }

    /// Bind with already-constructed stores.
    pub async fn build_with(
        config: CouponConfig,
        repository: Arc<dyn CouponRepository>,
        counter_store: Arc<dyn CounterStore>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let throttle = RequestThrottle::new(counter_store, config.throttle_config()?);
        let coupon_service = CouponService::new(repository, config.store_timeout());

        let state = AppState {
            config: config.clone(),
            coupon_service,
            throttle,
        };

        let router = build_router(state.clone());

        let addr = config.common.bind_address();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            limit = config.rate_limit.requests,
            window_seconds = config.rate_limit.window_seconds,
            "coupon-service listening"
        );

        Ok(Self {
            port,
            listener,
            router,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_with_shutdown(std::future::pending::<()>()).await
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}
