use super::*;
use storage::{MemoryStore, Storage};

fn session_config() -> SessionConfig {
    SessionConfig {
        issuer: "curator".into(),
        secret: "s".into(),
        ttl_seconds: 60,
    }
}

async fn setup() -> (ApiContext, Owner) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    (
        ApiContext {
            store: Arc::new(storage),
            session: session_config(),
            allow_dev_sign_in: true,
        },
        Owner::new("ana@example.com"),
    )
}

fn ai_watch() -> CreateEnvelopeRequest {
    CreateEnvelopeRequest {
        name: "AI Watch".into(),
        description: None,
        color: Some("#60A5FA".into()),
    }
}

fn x_channel() -> AddChannelRequest {
    AddChannelRequest {
        id: None,
        channel_type: ChannelKind::X,
        channel_url: "https://x.com/test".into(),
        channel_description: "extract headlines".into(),
        created_at: None,
    }
}

#[tokio::test]
async fn created_envelope_shows_up_with_zero_channels() {
    let (ctx, owner) = setup().await;
    let created = create_envelope(&ctx, &owner, ai_watch())
        .await
        .expect("create");
    assert_eq!(created.channel_count, 0);

    let envelopes = list_envelopes(&ctx, &owner).await.expect("list");
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].name, "AI Watch");
    assert_eq!(envelopes[0].color, "#60A5FA");
    assert_eq!(envelopes[0].channel_count, 0);
}

#[tokio::test]
async fn adding_a_channel_updates_list_and_counter() {
    let (ctx, owner) = setup().await;
    create_envelope(&ctx, &owner, ai_watch())
        .await
        .expect("create");

    let detail = add_channel(&ctx, &owner, "AI Watch", x_channel())
        .await
        .expect("add");
    assert_eq!(detail.channels.len(), 1);
    assert_eq!(detail.envelope.channel_count, 1);
    assert_eq!(detail.channels[0].channel_url, "https://x.com/test");

    let envelopes = list_envelopes(&ctx, &owner).await.expect("list");
    assert_eq!(envelopes[0].channel_count, 1);
}

#[tokio::test]
async fn client_supplied_channel_id_and_timestamp_are_kept() {
    let (ctx, owner) = setup().await;
    create_envelope(&ctx, &owner, ai_watch())
        .await
        .expect("create");
    let id = ChannelId::generate();
    let created_at = Utc::now() - chrono::Duration::minutes(5);

    let detail = add_channel(
        &ctx,
        &owner,
        "AI Watch",
        AddChannelRequest {
            id: Some(id),
            created_at: Some(created_at),
            ..x_channel()
        },
    )
    .await
    .expect("add");
    assert_eq!(detail.channels[0].id, id);
    assert_eq!(
        detail.channels[0].created_at.timestamp(),
        created_at.timestamp()
    );
}

#[tokio::test]
async fn reused_channel_id_is_a_validation_error() {
    let (ctx, owner) = setup().await;
    create_envelope(&ctx, &owner, ai_watch())
        .await
        .expect("create");
    let repeated = AddChannelRequest {
        id: Some(ChannelId::generate()),
        ..x_channel()
    };
    add_channel(&ctx, &owner, "AI Watch", repeated.clone())
        .await
        .expect("first add");

    let err = add_channel(&ctx, &owner, "AI Watch", repeated)
        .await
        .expect_err("same id again");
    assert_eq!(err.code, ErrorCode::Validation);

    let detail = envelope_detail(&ctx, &owner, "AI Watch")
        .await
        .expect("detail");
    assert_eq!(detail.envelope.channel_count, 1);
}

#[tokio::test]
async fn blank_name_is_rejected_before_any_write() {
    let (ctx, owner) = setup().await;
    let err = create_envelope(
        &ctx,
        &owner,
        CreateEnvelopeRequest {
            name: "   ".into(),
            description: None,
            color: None,
        },
    )
    .await
    .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(list_envelopes(&ctx, &owner).await.expect("list").is_empty());
}

#[test]
fn envelope_defaults_to_red_and_drops_blank_description() {
    let envelope = validate_new_envelope(CreateEnvelopeRequest {
        name: "  Markets ".into(),
        description: Some("  ".into()),
        color: None,
    })
    .expect("valid");
    assert_eq!(envelope.name, "Markets");
    assert_eq!(envelope.color, "#F87171");
    assert_eq!(envelope.description, None);
}

#[test]
fn off_palette_color_is_rejected() {
    let err = validate_new_envelope(CreateEnvelopeRequest {
        color: Some("#123456".into()),
        ..ai_watch()
    })
    .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[test]
fn channel_requires_url_and_description() {
    let missing_url = validate_new_channel(AddChannelRequest {
        channel_url: " ".into(),
        ..x_channel()
    })
    .expect_err("should fail");
    assert_eq!(missing_url.code, ErrorCode::Validation);

    let missing_description = validate_new_channel(AddChannelRequest {
        channel_description: String::new(),
        ..x_channel()
    })
    .expect_err("should fail");
    assert_eq!(missing_description.code, ErrorCode::Validation);

    let missing_type = validate_new_channel(AddChannelRequest {
        channel_type: ChannelKind::Other(String::new()),
        ..x_channel()
    })
    .expect_err("should fail");
    assert_eq!(missing_type.code, ErrorCode::Validation);
}

#[test]
fn channel_url_is_not_format_checked() {
    let channel = validate_new_channel(AddChannelRequest {
        channel_url: "not a url".into(),
        ..x_channel()
    })
    .expect("free text accepted");
    assert_eq!(channel.channel_url, "not a url");
}

#[tokio::test]
async fn unknown_envelope_is_not_found() {
    let (ctx, owner) = setup().await;
    let err = envelope_detail(&ctx, &owner, "missing")
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = add_channel(&ctx, &owner, "missing", x_channel())
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn duplicate_envelope_names_are_ambiguous() {
    let (ctx, owner) = setup().await;
    for _ in 0..2 {
        create_envelope(&ctx, &owner, ai_watch())
            .await
            .expect("duplicates are accepted");
    }
    let err = envelope_detail(&ctx, &owner, "AI Watch")
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Ambiguous);
}

#[tokio::test]
async fn store_failure_maps_to_internal() {
    let store = Arc::new(MemoryStore::new());
    let ctx = ApiContext {
        store: store.clone(),
        session: session_config(),
        allow_dev_sign_in: true,
    };
    let owner = Owner::new("ana@example.com");
    store.fail_with(Some("connection reset")).await;

    let err = create_envelope(&ctx, &owner, ai_watch())
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Internal);
    assert!(err.message.contains("connection reset"));
}

#[tokio::test]
async fn sign_in_then_sign_out_revokes_token() {
    let (ctx, _) = setup().await;
    let signed_in = sign_in(
        &ctx,
        SignInRequest {
            email: "ana@example.com".into(),
            name: Some("Ana".into()),
        },
    )
    .await
    .expect("sign in");
    let header = format!("Bearer {}", signed_in.token);

    let status = session_status(&ctx, Some(&header)).await.expect("status");
    assert_eq!(status.profile(), Some(&signed_in.profile));

    let session = authenticate(&ctx, Some(&header)).await.expect("auth");
    sign_out(&ctx, &session).await.expect("sign out");

    let err = authenticate(&ctx, Some(&header))
        .await
        .expect_err("revoked");
    assert_eq!(err.code, ErrorCode::Unauthorized);
    assert_eq!(
        session_status(&ctx, Some(&header)).await.expect("status"),
        SessionStatus::Unauthenticated
    );
}

#[tokio::test]
async fn missing_header_is_unauthenticated() {
    let (ctx, _) = setup().await;
    assert_eq!(
        session_status(&ctx, None).await.expect("status"),
        SessionStatus::Unauthenticated
    );
}

#[tokio::test]
async fn dev_sign_in_can_be_disabled() {
    let (mut ctx, _) = setup().await;
    ctx.allow_dev_sign_in = false;
    let err = sign_in(
        &ctx,
        SignInRequest {
            email: "ana@example.com".into(),
            name: None,
        },
    )
    .await
    .expect_err("disabled");
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[tokio::test]
async fn sign_in_rejects_non_email() {
    let (ctx, _) = setup().await;
    let err = sign_in(
        &ctx,
        SignInRequest {
            email: "ana".into(),
            name: None,
        },
    )
    .await
    .expect_err("invalid");
    assert_eq!(err.code, ErrorCode::Validation);
}
