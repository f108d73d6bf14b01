use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        AddChannelRequest, CreateEnvelopeRequest, EnvelopeDetail, EnvelopeSummary,
        SessionStatus, SignInRequest, SignInResponse, UserProfile,
    },
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

pub mod controller;
pub mod render;
pub mod views;

pub use controller::{Controller, UiCommand, UiEvent};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Api(ApiError),
    #[error("not signed in")]
    NotSignedIn,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api(err) => Some(err.code),
            ClientError::NotSignedIn => Some(ErrorCode::Unauthorized),
            _ => None,
        }
    }
}

/// Everything the views need from the service.
#[async_trait]
pub trait CurationBackend: Send + Sync {
    async fn session(&self) -> Result<SessionStatus, ClientError>;
    async fn sign_in(&self, email: &str, name: Option<&str>) -> Result<UserProfile, ClientError>;
    async fn sign_out(&self) -> Result<(), ClientError>;
    async fn list_envelopes(&self) -> Result<Vec<EnvelopeSummary>, ClientError>;
    async fn create_envelope(
        &self,
        req: &CreateEnvelopeRequest,
    ) -> Result<EnvelopeSummary, ClientError>;
    async fn envelope_detail(&self, name: &str) -> Result<EnvelopeDetail, ClientError>;
    async fn add_channel(
        &self,
        name: &str,
        req: &AddChannelRequest,
    ) -> Result<EnvelopeDetail, ClientError>;
}

pub struct HttpBackend {
    http: Client,
    server_url: Url,
    token: RwLock<Option<String>>,
}

impl HttpBackend {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let mut server_url = Url::parse(server_url)?;
        if !server_url.path().ends_with('/') {
            let path = format!("{}/", server_url.path());
            server_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            server_url,
            token: RwLock::new(None),
        })
    }

    /// Resumes a session whose token was stored by an earlier sign-in.
    pub async fn with_token(self, token: impl Into<String>) -> Self {
        *self.token.write().await = Some(token.into());
        self
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.server_url.join(path)?)
    }

    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.token.read().await;
        let token = token.as_deref().ok_or(ClientError::NotSignedIn)?;
        Ok(builder.bearer_auth(token))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let builder = self.http.get(self.endpoint(path)?).query(query);
        let response = self.authorized(builder).await?.send().await?;
        decode(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T, ClientError> {
        let builder = self.http.post(self.endpoint(path)?).query(query).json(body);
        let response = self.authorized(builder).await?.send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let bytes = response.bytes().await?;
    let err = serde_json::from_slice::<ApiError>(&bytes).unwrap_or_else(|_| {
        let code = match status.as_u16() {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Ambiguous,
            400 | 413 | 422 => ErrorCode::Validation,
            _ => ErrorCode::Internal,
        };
        ApiError::new(code, format!("server responded with {status}"))
    });
    debug!(%status, code = ?err.code, "request rejected");
    Err(ClientError::Api(err))
}

#[async_trait]
impl CurationBackend for HttpBackend {
    async fn session(&self) -> Result<SessionStatus, ClientError> {
        if self.token.read().await.is_none() {
            return Ok(SessionStatus::Unauthenticated);
        }
        let status: SessionStatus = self.get_json("session", &[]).await?;
        if status == SessionStatus::Unauthenticated {
            *self.token.write().await = None;
        }
        Ok(status)
    }

    async fn sign_in(&self, email: &str, name: Option<&str>) -> Result<UserProfile, ClientError> {
        let response = self
            .http
            .post(self.endpoint("session")?)
            .json(&SignInRequest {
                email: email.to_string(),
                name: name.map(str::to_string),
            })
            .send()
            .await?;
        let body: SignInResponse = decode(response).await?;
        *self.token.write().await = Some(body.token);
        Ok(body.profile)
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        let builder = self.http.post(self.endpoint("session/sign_out")?);
        let response = self.authorized(builder).await?.send().await?;
        let status = response.status();
        // The token is dropped locally even if the server call failed.
        *self.token.write().await = None;
        if !status.is_success() {
            return decode::<serde_json::Value>(response).await.map(|_| ());
        }
        Ok(())
    }

    async fn list_envelopes(&self) -> Result<Vec<EnvelopeSummary>, ClientError> {
        self.get_json("envelopes", &[]).await
    }

    async fn create_envelope(
        &self,
        req: &CreateEnvelopeRequest,
    ) -> Result<EnvelopeSummary, ClientError> {
        self.post_json("envelopes", &[], req).await
    }

    async fn envelope_detail(&self, name: &str) -> Result<EnvelopeDetail, ClientError> {
        self.get_json("envelopes/detail", &[("id", name)]).await
    }

    async fn add_channel(
        &self,
        name: &str,
        req: &AddChannelRequest,
    ) -> Result<EnvelopeDetail, ClientError> {
        self.post_json("envelopes/channels", &[("id", name)], req)
            .await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
