use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    response::Response,
    Router,
};
use http::Request;
use tower_http::trace::TraceLayer;
use tracing::instrument;

pub mod assets;
pub mod config;
pub mod helper;
pub mod proxy;
pub mod route;
pub mod state;

pub use config::RelayConfig;
pub use state::RelayState;

use crate::{
    assets::{favicon_response, homepage_response},
    helper::not_found,
    route::is_raw_request,
};

pub const FAVICON_PATH: &str = "/favicon.ico";

#[instrument(skip_all, fields(method = %request.method(), uri = %request.uri()))]
pub async fn relay_handler(
    State(state): State<Arc<RelayState>>,
    request: Request<Body>,
) -> Response {
    let cache = &state.config.cache;

    match request.uri().path() {
        FAVICON_PATH => return favicon_response(&state.favicon, cache),
        "/" | "" => return homepage_response(&state.homepage, cache),
        _ => {}
    }

    let Some(matched) = state.config.routes.find(request.uri().path()) else {
        tracing::debug!("No route for {}", request.uri().path());
        return not_found();
    };

    let result = if is_raw_request(request.uri().query()) {
        proxy::redirect(&matched, request.uri().query())
    } else {
        proxy::forward(&state.client, cache, &matched, request).await
    };

    result.unwrap_or_else(|err| err.bad_gateway(cache))
}

pub fn relay_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .fallback(relay_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Logs the active cache policy and routes.
pub fn startup_banner(config: &RelayConfig) {
    tracing::info!(
        "Caching all resources for {} seconds.",
        config.cache.max_age()
    );

    for route in &config.routes {
        match route.raw_redirect_template() {
            Some(template) => tracing::info!(
                "{} → {} (raw: {})",
                route.prefix(),
                route.target(),
                template
            ),
            None => tracing::info!("{} → {}", route.prefix(), route.target()),
        }
    }
}
