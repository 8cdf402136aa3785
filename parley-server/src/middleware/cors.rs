use axum::http::{HeaderName, HeaderValue};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::middleware::X_TRACE_ID;
use crate::routes::api::generate::X_CONVERSATION_ID;

pub fn cors_layer(config: &Config) -> CorsLayer {
    // Browsers only let scripts read non-safelisted response headers that are
    // exposed explicitly.
    let exposed = [
        HeaderName::from_static(X_CONVERSATION_ID),
        HeaderName::from_static(X_TRACE_ID),
    ];
    let base = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .expose_headers(exposed);

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        // Wildcard; set PARLEY_CORS_ORIGINS in production.
        base.allow_origin(Any)
    } else {
        base.allow_origin(origins)
    }
}
