//! Debug API handlers.

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::telemetry::Stats;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check handler.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Stats response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub messages: MessageStats,
    pub reports: ReportStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStats {
    pub received: u64,
    pub submitted: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStats {
    pub delivered: u64,
    pub failed: u64,
}

impl From<&Stats> for StatsResponse {
    fn from(stats: &Stats) -> Self {
        Self {
            uptime_seconds: stats.uptime().as_secs(),
            messages: MessageStats {
                received: stats.messages_received(),
                submitted: stats.items_submitted(),
                rejected: stats.items_rejected(),
            },
            reports: ReportStats {
                delivered: stats.reports_delivered(),
                failed: stats.reports_failed(),
            },
        }
    }
}

/// Stats handler.
pub async fn stats_handler(State(stats): State<Arc<Stats>>) -> impl IntoResponse {
    Json(StatsResponse::from(stats.as_ref()))
}
