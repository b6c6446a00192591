//! HTTP API handlers for bitext-align
//!
//! GET /health, POST /align, POST /align/batch

pub mod align;
pub mod health;

pub use align::align_routes;
pub use health::health_routes;
