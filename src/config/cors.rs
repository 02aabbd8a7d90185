use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// The gate scanner page and the bot backend run locally during events.
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:8000";

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

pub fn create_cors_layer(configured: Option<&str>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins(configured.unwrap_or(DEFAULT_ALLOWED_ORIGINS)))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(PREFLIGHT_MAX_AGE)
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "CORS: skipping invalid origin");
                None
            }
        })
        .collect()
}

fn allowed_origins(raw: &str) -> AllowOrigin {
    let origins = parse_origins(raw);

    if origins.is_empty() {
        tracing::warn!("CORS: no valid origins configured, allowing any origin");
        AllowOrigin::any()
    } else {
        tracing::info!(count = origins.len(), "CORS: origins configured");
        AllowOrigin::list(origins)
    }
}
