use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-dependency status: `"healthy"` or `"unhealthy: <reason>"`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DependencyStatus {
    #[schema(example = "healthy")]
    pub database: String,
    #[schema(example = "healthy")]
    pub redis: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub services: DependencyStatus,
}
