use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use identity::{SessionConfig, VerifiedSession};
use server_api::{
    add_channel, authenticate, create_envelope, envelope_detail, health, list_envelopes,
    session_status, sign_in, sign_out, ApiContext,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        AddChannelRequest, CreateEnvelopeRequest, EnvelopeDetail, EnvelopeQuery,
        EnvelopeSummary, SessionStatus, SignInRequest, SignInResponse,
    },
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

type HttpError = (StatusCode, Json<ApiError>);

const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        store: Arc::new(storage),
        session: SessionConfig {
            issuer: settings.session_issuer,
            secret: settings.session_secret,
            ttl_seconds: settings.session_ttl_seconds,
        },
        allow_dev_sign_in: settings.allow_dev_sign_in,
    };

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/session", get(http_session_status).post(http_sign_in))
        .route("/session/sign_out", post(http_sign_out))
        .route("/envelopes", get(http_list_envelopes).post(http_create_envelope))
        .route("/envelopes/detail", get(http_envelope_detail))
        .route("/envelopes/channels", post(http_add_channel))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Ambiguous => StatusCode::CONFLICT,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn http_error(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<VerifiedSession, HttpError> {
    authenticate(&state.api, authorization(headers))
        .await
        .map_err(http_error)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    health(&state.api).await.map_err(http_error)?;
    Ok("ok")
}

async fn http_sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, HttpError> {
    sign_in(&state.api, req).await.map(Json).map_err(http_error)
}

async fn http_session_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionStatus>, HttpError> {
    session_status(&state.api, authorization(&headers))
        .await
        .map(Json)
        .map_err(http_error)
}

async fn http_sign_out(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, HttpError> {
    let session = require_session(&state, &headers).await?;
    sign_out(&state.api, &session).await.map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_envelopes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<EnvelopeSummary>>, HttpError> {
    let session = require_session(&state, &headers).await?;
    list_envelopes(&state.api, session.owner())
        .await
        .map(Json)
        .map_err(http_error)
}

async fn http_create_envelope(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateEnvelopeRequest>,
) -> Result<(StatusCode, Json<EnvelopeSummary>), HttpError> {
    let session = require_session(&state, &headers).await?;
    let created = create_envelope(&state.api, session.owner(), req)
        .await
        .map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn http_envelope_detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<EnvelopeQuery>,
) -> Result<Json<EnvelopeDetail>, HttpError> {
    let session = require_session(&state, &headers).await?;
    envelope_detail(&state.api, session.owner(), &q.id)
        .await
        .map(Json)
        .map_err(http_error)
}

async fn http_add_channel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<EnvelopeQuery>,
    Json(req): Json<AddChannelRequest>,
) -> Result<Json<EnvelopeDetail>, HttpError> {
    let session = require_session(&state, &headers).await?;
    add_channel(&state.api, session.owner(), &q.id, req)
        .await
        .map(Json)
        .map_err(http_error)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
