use super::*;
use axum::{body, body::Body, http::Request, response::Response};
use shared::domain::ChannelKind;
use tower::ServiceExt;

async fn test_app() -> Router {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext {
        store: Arc::new(storage),
        session: SessionConfig {
            issuer: "curator".to_string(),
            secret: "s".to_string(),
            ttl_seconds: 60,
        },
        allow_dev_sign_in: true,
    };
    build_router(Arc::new(AppState { api }))
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn sign_in_as(app: &Router, email: &str) -> String {
    let request = Request::post("/session")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "email": email, "name": "Ana" }).to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let dto: SignInResponse = read_json(response).await;
    format!("Bearer {}", dto.token)
}

fn authed(method: &str, uri: &str, bearer: &str, json: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", bearer);
    let request = match json {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    };
    request.expect("request")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn envelope_routes_require_a_session() {
    let app = test_app().await;
    let request = Request::get("/envelopes").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn create_list_and_add_channel_flow() {
    let app = test_app().await;
    let bearer = sign_in_as(&app, "ana@example.com").await;

    let created = app
        .clone()
        .oneshot(authed(
            "POST",
            "/envelopes",
            &bearer,
            Some(serde_json::json!({ "name": "AI Watch", "color": "#60A5FA" })),
        ))
        .await
        .expect("response");
    assert_eq!(created.status(), StatusCode::CREATED);

    let listed = app
        .clone()
        .oneshot(authed("GET", "/envelopes", &bearer, None))
        .await
        .expect("response");
    assert_eq!(listed.status(), StatusCode::OK);
    let envelopes: Vec<EnvelopeSummary> = read_json(listed).await;
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].name, "AI Watch");
    assert_eq!(envelopes[0].channel_count, 0);

    let added = app
        .clone()
        .oneshot(authed(
            "POST",
            "/envelopes/channels?id=AI%20Watch",
            &bearer,
            Some(serde_json::json!({
                "channel_type": "x",
                "channel_url": "https://x.com/test",
                "channel_description": "extract headlines",
            })),
        ))
        .await
        .expect("response");
    assert_eq!(added.status(), StatusCode::OK);
    let detail: EnvelopeDetail = read_json(added).await;
    assert_eq!(detail.channels.len(), 1);
    assert_eq!(detail.envelope.channel_count, 1);
    assert_eq!(detail.channels[0].channel_type, ChannelKind::X);

    let detail = app
        .oneshot(authed("GET", "/envelopes/detail?id=AI%20Watch", &bearer, None))
        .await
        .expect("response");
    assert_eq!(detail.status(), StatusCode::OK);
    let detail: EnvelopeDetail = read_json(detail).await;
    assert_eq!(detail.envelope.channel_count, 1);
}

#[tokio::test]
async fn envelopes_are_scoped_to_the_signed_in_owner() {
    let app = test_app().await;
    let ana = sign_in_as(&app, "ana@example.com").await;
    let bo = sign_in_as(&app, "bo@example.com").await;

    app.clone()
        .oneshot(authed(
            "POST",
            "/envelopes",
            &ana,
            Some(serde_json::json!({ "name": "Private" })),
        ))
        .await
        .expect("response");

    let response = app
        .clone()
        .oneshot(authed("GET", "/envelopes", &bo, None))
        .await
        .expect("response");
    let envelopes: Vec<EnvelopeSummary> = read_json(response).await;
    assert!(envelopes.is_empty());

    let response = app
        .oneshot(authed("GET", "/envelopes/detail?id=Private", &bo, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_names_return_conflict_on_detail() {
    let app = test_app().await;
    let bearer = sign_in_as(&app, "ana@example.com").await;
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(authed(
                "POST",
                "/envelopes",
                &bearer,
                Some(serde_json::json!({ "name": "Twin" })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(authed("GET", "/envelopes/detail?id=Twin", &bearer, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::Ambiguous);
}

#[tokio::test]
async fn blank_envelope_name_is_bad_request() {
    let app = test_app().await;
    let bearer = sign_in_as(&app, "ana@example.com").await;
    let response = app
        .oneshot(authed(
            "POST",
            "/envelopes",
            &bearer,
            Some(serde_json::json!({ "name": "  " })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sign_out_invalidates_the_token() {
    let app = test_app().await;
    let bearer = sign_in_as(&app, "ana@example.com").await;

    let status = app
        .clone()
        .oneshot(authed("GET", "/session", &bearer, None))
        .await
        .expect("response");
    let status: SessionStatus = read_json(status).await;
    assert!(matches!(status, SessionStatus::Authenticated { .. }));

    let response = app
        .clone()
        .oneshot(authed("POST", "/session/sign_out", &bearer, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let status = app
        .clone()
        .oneshot(authed("GET", "/session", &bearer, None))
        .await
        .expect("response");
    let status: SessionStatus = read_json(status).await;
    assert_eq!(status, SessionStatus::Unauthenticated);

    let response = app
        .oneshot(authed("GET", "/envelopes", &bearer, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
