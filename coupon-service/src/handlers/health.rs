use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use crate::dtos::health::{DependencyStatus, HealthResponse};
use crate::AppState;

const HEALTHY: &str = "healthy";

fn status_of<E: std::fmt::Display>(result: Result<(), E>) -> String {
    match result {
        Ok(()) => HEALTHY.to_string(),
        Err(e) => format!("unhealthy: {}", e),
    }
}

/// Report coupon store and counter store reachability
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All dependencies reachable", body = HealthResponse),
        (status = 503, description = "At least one dependency unreachable", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (database, redis) = tokio::join!(
        state.coupon_service.health_check(),
        state.throttle.health_check()
    );

    let services = DependencyStatus {
        database: status_of(database),
        redis: status_of(redis),
    };

    let all_healthy = services.database == HEALTHY && services.redis == HEALTHY;
    if !all_healthy {
        tracing::warn!(
            database = %services.database,
            redis = %services.redis,
            "Health check failed"
        );
    }

    let (status_code, status) = if all_healthy {
        (StatusCode::OK, HEALTHY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: Utc::now(),
            services,
        }),
    )
}
