//! HTTP middleware

pub mod auth;

/// Health check route; always reachable without credentials
pub const HEALTH_PATH: &str = "/api/v1/health";
