use std::time::Duration;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, HeaderValue, Method, Request, Response},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Span;

/// Request tracing and CORS. Each layer is applied to the router on its own.
pub fn with_http_layers(routes: Router, cors_origin: HeaderValue) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let matched_path = request
                .extensions()
                .get::<MatchedPath>()
                .map(|matched| matched.as_str());

            // "METHOD /path" (e.g. "POST /reminders/:id/done")
            let span_name = if let Some(path) = matched_path {
                format!("{} {}", request.method(), path)
            } else {
                format!("{} {}", request.method(), request.uri().path())
            };

            tracing::info_span!(
                "request",
                "otel.name" = span_name,
                method = ?request.method(),
                uri = ?request.uri(),
                // Filled in by handlers
                action = tracing::field::Empty,
                error = tracing::field::Empty,
                status = tracing::field::Empty,
                latency = tracing::field::Empty,
            )
        })
        .on_request(|_request: &Request<Body>, _span: &Span| {
            // Only completions are logged.
        })
        .on_response(|response: &Response<Body>, latency: Duration, span: &Span| {
            span.record("status", tracing::field::display(response.status()));
            span.record("latency", tracing::field::debug(latency));
            tracing::info!("request completed");
        });

    routes.layer(trace_layer).layer(cors_layer(cors_origin))
}

fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
