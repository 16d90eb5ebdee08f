//! # HTTP Transport
//!
//! ```text
//! POST /gacha/draw       { gacha_id, times }  -> { results: [...] }
//! GET  /character/list                        -> { characters: [...] }
//! GET  /user/balance                          -> { balance }
//! GET  /health                                -> ok
//! ```
//!
//! The credential travels in the `x-token` header. Handlers hand the engine
//! to the blocking pool: ledger and store calls block, and a task started
//! there runs to completion even if the client goes away, so a debit is
//! always followed by its grant.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use gacha_economy::{AuthError, DrawError, DrawEngine, EconomyResult};

use crate::api::{
    BalanceResponse, CharacterListResponse, DrawRequestBody, DrawResponse, TOKEN_HEADER,
};
use crate::errors::ApiError;

/// Shared handler state.
pub type SharedEngine = Arc<DrawEngine>;

/// Builds the router.
pub fn build_router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/gacha/draw", post(draw))
        .route("/character/list", get(character_list))
        .route("/user/balance", get(balance))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Serves `engine` on `addr` until Ctrl-C.
///
/// # Errors
///
/// Fails if the listener cannot be bound or the server stops abnormally.
pub async fn serve(addr: SocketAddr, engine: SharedEngine) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, build_router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn draw(
    State(engine): State<SharedEngine>,
    headers: HeaderMap,
    payload: Result<Json<DrawRequestBody>, JsonRejection>,
) -> Result<Json<DrawResponse>, ApiError> {
    let Json(body) = payload?;
    let credential = credential(&headers)?;

    let result = run_blocking(move || engine.draw(body.into(), credential.as_deref())).await?;
    Ok(Json(result.into()))
}

async fn character_list(
    State(engine): State<SharedEngine>,
    headers: HeaderMap,
) -> Result<Json<CharacterListResponse>, ApiError> {
    let credential = credential(&headers)?;

    let owned = run_blocking(move || engine.owned_characters(credential.as_deref())).await?;
    Ok(Json(CharacterListResponse {
        characters: owned.into_iter().map(Into::into).collect(),
    }))
}

async fn balance(
    State(engine): State<SharedEngine>,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>, ApiError> {
    let credential = credential(&headers)?;

    let balance = run_blocking(move || engine.balance(credential.as_deref())).await?;
    Ok(Json(BalanceResponse { balance }))
}

async fn health() -> &'static str {
    "ok"
}

/// Owned copy of the credential header, if any.
fn credential(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    headers
        .get(TOKEN_HEADER)
        .map(|value| {
            value.to_str().map(str::to_owned).map_err(|_| {
                ApiError::Draw(DrawError::Unauthenticated(AuthError::Malformed(
                    "credential header is not visible ASCII",
                )))
            })
        })
        .transpose()
}

async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> EconomyResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))?
        .map_err(ApiError::from)
}
