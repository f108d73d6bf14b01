use std::sync::Arc;

use chrono::Utc;
use identity::{
    bearer_token, mint_session_token, verify_session_token, SessionConfig, SessionError,
    VerifiedSession,
};
use shared::{
    domain::{palette_color, ChannelId, ChannelKind, Owner, DEFAULT_ENVELOPE_COLOR},
    error::{ApiError, ErrorCode},
    protocol::{
        AddChannelRequest, ChannelRecord, CreateEnvelopeRequest, EnvelopeDetail,
        EnvelopeSummary, SessionStatus, SignInRequest, SignInResponse, UserProfile,
    },
};
use storage::{LookupError, NewEnvelope, RecordStore};
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn RecordStore>,
    pub session: SessionConfig,
    /// Accept `POST /session` with a bare email instead of an OAuth callback.
    pub allow_dev_sign_in: bool,
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.store.health_check().await.map_err(internal)
}

pub async fn sign_in(ctx: &ApiContext, req: SignInRequest) -> Result<SignInResponse, ApiError> {
    if !ctx.allow_dev_sign_in {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "direct sign-in is disabled on this server",
        ));
    }
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "a valid email address is required",
        ));
    }
    let profile = UserProfile {
        email: Owner::new(email),
        name: req
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
    };
    let issued = mint_session_token(&ctx.session, &profile)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("token mint failed: {e}")))?;
    info!(owner = %profile.email, "session issued");
    Ok(SignInResponse {
        token: issued.token,
        profile,
    })
}

/// Resolves the `Authorization` header to a live session.
pub async fn authenticate(
    ctx: &ApiContext,
    authorization: Option<&str>,
) -> Result<VerifiedSession, ApiError> {
    let session = bearer_token(authorization)
        .and_then(|token| verify_session_token(&ctx.session, token))
        .map_err(unauthorized)?;
    let revoked = ctx
        .store
        .is_session_revoked(&session.token_id)
        .await
        .map_err(internal)?;
    if revoked {
        return Err(unauthorized(SessionError::Revoked));
    }
    Ok(session)
}

pub async fn session_status(
    ctx: &ApiContext,
    authorization: Option<&str>,
) -> Result<SessionStatus, ApiError> {
    match authenticate(ctx, authorization).await {
        Ok(session) => Ok(SessionStatus::Authenticated {
            profile: session.profile,
        }),
        Err(err) if err.code == ErrorCode::Unauthorized => Ok(SessionStatus::Unauthenticated),
        Err(err) => Err(err),
    }
}

pub async fn sign_out(ctx: &ApiContext, session: &VerifiedSession) -> Result<(), ApiError> {
    ctx.store
        .revoke_session(&session.token_id, session.expires_at)
        .await
        .map_err(internal)?;
    info!(owner = %session.owner(), "session signed out");
    Ok(())
}

pub async fn list_envelopes(
    ctx: &ApiContext,
    owner: &Owner,
) -> Result<Vec<EnvelopeSummary>, ApiError> {
    ctx.store.select_envelopes(owner).await.map_err(internal)
}

pub async fn create_envelope(
    ctx: &ApiContext,
    owner: &Owner,
    req: CreateEnvelopeRequest,
) -> Result<EnvelopeSummary, ApiError> {
    let envelope = validate_new_envelope(req)?;
    let created = ctx
        .store
        .insert_envelope(owner, &envelope)
        .await
        .map_err(internal)?;
    info!(%owner, envelope = %created.name, envelope_id = created.envelope_id.0, "envelope created");
    Ok(created)
}

pub async fn envelope_detail(
    ctx: &ApiContext,
    owner: &Owner,
    name: &str,
) -> Result<EnvelopeDetail, ApiError> {
    ctx.store
        .load_envelope_detail(owner, name)
        .await
        .map_err(lookup_error)
}

/// Appends one channel, then re-reads the whole envelope.
pub async fn add_channel(
    ctx: &ApiContext,
    owner: &Owner,
    name: &str,
    req: AddChannelRequest,
) -> Result<EnvelopeDetail, ApiError> {
    let channel = validate_new_channel(req)?;
    let channel_count = ctx
        .store
        .append_channel(owner, name, &channel)
        .await
        .map_err(lookup_error)?;
    info!(
        %owner,
        envelope = %name,
        channel_id = %channel.id,
        channel_type = %channel.channel_type,
        channel_count,
        "channel added"
    );
    envelope_detail(ctx, owner, name).await
}

pub fn validate_new_envelope(req: CreateEnvelopeRequest) -> Result<NewEnvelope, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "Please enter an envelope name",
        ));
    }
    let color = match req.color.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_ENVELOPE_COLOR,
        Some(raw) => palette_color(raw).ok_or_else(|| {
            ApiError::new(
                ErrorCode::Validation,
                format!("color '{raw}' is not in the envelope palette"),
            )
        })?,
    };
    let description = req
        .description
        .map(|description| description.trim().to_string())
        .filter(|description| !description.is_empty());

    Ok(NewEnvelope {
        name: name.to_string(),
        color: color.to_string(),
        description,
    })
}

pub fn validate_new_channel(req: AddChannelRequest) -> Result<ChannelRecord, ApiError> {
    if req.channel_type.as_str().trim().is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "channel type is required",
        ));
    }
    let channel_url = req.channel_url.trim();
    if channel_url.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "channel url is required"));
    }
    let channel_description = req.channel_description.trim();
    if channel_description.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "describe what should be extracted from this channel",
        ));
    }

    Ok(ChannelRecord {
        id: req.id.unwrap_or_else(ChannelId::generate),
        channel_type: ChannelKind::from(req.channel_type.as_str().trim()),
        channel_url: channel_url.to_string(),
        channel_description: channel_description.to_string(),
        created_at: req.created_at.unwrap_or_else(Utc::now),
    })
}

fn lookup_error(err: LookupError) -> ApiError {
    match err {
        LookupError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, err.to_string()),
        LookupError::Ambiguous { .. } => ApiError::new(ErrorCode::Ambiguous, err.to_string()),
        LookupError::DuplicateChannel { .. } => {
            ApiError::new(ErrorCode::Validation, err.to_string())
        }
        LookupError::Store(err) => internal(err),
    }
}

fn unauthorized(err: SessionError) -> ApiError {
    ApiError::new(ErrorCode::Unauthorized, err.to_string())
}

fn internal(err: anyhow::Error) -> ApiError {
    warn!(error = %err, "record store call failed");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
