//! Wallet-facing LNURL-withdraw callbacks.
//!
//! | Route                          | Answer                                     |
//! |--------------------------------|--------------------------------------------|
//! | `GET /withdraw/:id`            | withdraw parameters or `{status: ERROR}`   |
//! | `GET /withdraw?id=`            | same, id taken from the query              |
//! | `GET /invoice?k1=&pr=`         | payment outcome reported by the issuer     |
//! | `GET /healthz`                 | pending offer count and session metrics    |
//!
//! Invoice submissions always answer `200` with an LNURL body, errors
//! included. Lookups do the same once an id is given; a missing id is `400`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use lnurl_proxy_interactive::Metrics;
use lnurl_proxy_lib::{LnurlStatusResponse, OfferRegistry};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    registry: OfferRegistry,
    metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(registry: OfferRegistry, metrics: Arc<Metrics>) -> Self {
        Self { registry, metrics }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/withdraw", get(withdraw_by_query))
        .route("/withdraw/:id", get(withdraw_by_path))
        .route("/invoice", get(submit_invoice))
        .with_state(state)
}

/// Serve the callbacks on `listener` until `shutdown` is cancelled.
pub async fn serve_http(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), "http callback listener started");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("http callback listener stopped");
    Ok(())
}

async fn healthz(State(state): State<AppState>) -> Response {
    Json(json!({
        "ok": true,
        "pendingOffers": state.registry.len(),
        "metrics": state.metrics.snapshot(),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct WithdrawQuery {
    id: Option<String>,
}

async fn withdraw_by_query(
    State(state): State<AppState>,
    Query(query): Query<WithdrawQuery>,
) -> Response {
    match query.id.filter(|id| !id.is_empty()) {
        Some(id) => withdraw_params(&state, &id),
        None => bad_request("missing withdraw id"),
    }
}

async fn withdraw_by_path(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if id.is_empty() {
        return bad_request("missing withdraw id");
    }
    withdraw_params(&state, &id)
}

fn withdraw_params(state: &AppState, id: &str) -> Response {
    match state.registry.lookup(id) {
        Ok(params) => Json(params).into_response(),
        Err(e) => {
            tracing::debug!(withdraw_id = %id, error = %e, "withdraw lookup failed");
            Json(LnurlStatusResponse::error(e.to_string())).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct InvoiceQuery {
    k1: Option<String>,
    pr: Option<String>,
    invoice: Option<String>,
}

async fn submit_invoice(
    State(state): State<AppState>,
    Query(query): Query<InvoiceQuery>,
) -> Response {
    let Some(k1) = query.k1.filter(|k1| !k1.is_empty()) else {
        return Json(LnurlStatusResponse::error("missing k1")).into_response();
    };
    let Some(invoice) = query.pr.or(query.invoice).filter(|pr| !pr.is_empty()) else {
        return Json(LnurlStatusResponse::error("missing invoice")).into_response();
    };

    tracing::debug!(withdraw_id = %k1, "invoice submitted");
    let outcome = state.registry.resolve(&k1, &invoice).await;
    Json(outcome).into_response()
}

fn bad_request(reason: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(LnurlStatusResponse::error(reason)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn router() -> Router {
        build_router(AppState::new(
            OfferRegistry::new("https://proxy.example"),
            Arc::new(Metrics::new()),
        ))
    }

    async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_unknown_withdraw_is_error_envelope_with_200() {
        let (status, body) = call(router(), Method::GET, "/withdraw?id=nope").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "ERROR", "reason": "withdraw id does not exist"})
        );
    }

    #[tokio::test]
    async fn test_missing_id_is_bad_request() {
        let (status, body) = call(router(), Method::GET, "/withdraw").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "ERROR");

        let (status, _) = call(router(), Method::GET, "/withdraw?id=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invoice_missing_params_is_error_envelope_with_200() {
        let (status, body) = call(router(), Method::GET, "/invoice?pr=lnbc1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ERROR", "reason": "missing k1"}));

        let (status, body) = call(router(), Method::GET, "/invoice?k1=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ERROR", "reason": "missing invoice"}));

        let (status, body) = call(router(), Method::GET, "/invoice?k1=&pr=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ERROR");
    }

    #[tokio::test]
    async fn test_invoice_for_unknown_id_is_error_envelope_with_200() {
        let (status, body) = call(router(), Method::GET, "/invoice?k1=nope&pr=lnbc1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "ERROR", "reason": "withdraw id does not exist"})
        );
    }

    #[tokio::test]
    async fn test_non_get_is_method_not_allowed() {
        let (status, _) = call(router(), Method::POST, "/withdraw?id=x").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _) = call(router(), Method::PUT, "/invoice?k1=x&pr=y").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, body) = call(router(), Method::GET, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["pendingOffers"], 0);
        assert_eq!(body["metrics"]["sessionsOpened"], 0);
    }
}
