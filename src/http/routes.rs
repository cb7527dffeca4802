use super::handlers;
use super::identity;
use super::state::AppState;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors.allowed_origins);

    Router::new()
        // Health check
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/start-recording", post(handlers::start_recording))
        .route("/stop-recording", post(handlers::stop_recording))
        // Listening flag
        .route("/stream/start-stream", post(handlers::start_stream))
        .route("/stop-stream", post(handlers::stop_stream))
        .route("/status", get(handlers::status))
        // Live audio relay
        .route("/stream", get(handlers::proxy_stream))
        .route("/proxyStream", get(handlers::proxy_stream))
        // CORS before identity so preflights never reach the identity middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    identity::resolve_identity,
                )),
        )
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            // A wildcard cannot be combined with credentials
            if origin == "*" {
                warn!("Ignoring wildcard CORS origin; list origins explicitly");
                return None;
            }

            HeaderValue::from_str(origin)
                .map_err(|_| warn!("Ignoring invalid CORS origin: {}", origin))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(identity::USER_ID_HEADER),
            header::ORIGIN,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
}
