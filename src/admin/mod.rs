//! Debug HTTP API using Axum.
//!
//! Provides endpoints for:
//! - Health checks (/healthz)
//! - Runtime stats (/stats)

mod handlers;
mod server;

pub use handlers::{health_handler, stats_handler, HealthResponse, StatsResponse};
pub use server::AdminServer;

use std::net::{Ipv4Addr, SocketAddr};

/// Address the debug server binds to.
pub const DEBUG_ADDRESS: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 6060);
