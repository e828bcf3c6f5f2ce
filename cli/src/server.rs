use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;

use nosh_core::query::explicit_weight;
use nosh_core::service::{ChatOutcome, DEFAULT_HISTORY_LIMIT, NoshService};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    service: Arc<NoshService>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct NutritionRequest {
    query: Option<String>,
    // Untyped on purpose: unparseable overrides are silently ignored and
    // the weight parsed from the query text stands.
    weight_g: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn resolve_nutrition(
    State(state): State<AppState>,
    Json(req): Json<NutritionRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let raw = req.query.unwrap_or_default();
    let explicit = req.weight_g.as_ref().and_then(explicit_weight);

    let outcome = state.service.answer(&raw, explicit);
    let status = match &outcome {
        ChatOutcome::Answer(_) => StatusCode::OK,
        ChatOutcome::MissingQuery { .. } => StatusCode::BAD_REQUEST,
        ChatOutcome::NotFound { .. } => StatusCode::NOT_FOUND,
    };
    (status, Json(outcome.to_response()))
}

async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Json<serde_json::Value> {
    // Non-numeric limit falls back to the default.
    let limit = params
        .limit
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_HISTORY_LIMIT);

    let messages = state.service.history(limit);
    Json(json!({ "ok": true, "messages": messages }))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/nutrition", post(resolve_nutrition))
        .route("/api/history", get(get_history))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    service: Arc<NoshService>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        service,
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
