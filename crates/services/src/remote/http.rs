use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progress_core::model::{Path, RemoteId, RemoteRecord};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::ProgressRemote;
use super::wire::{ErrorBody, FetchBody, IdEcho, ProgressBody, TokenBody, UserBody, WireRecord};
use crate::auth::Credential;
use crate::config::RemoteConfig;
use crate::error::SyncError;

/// `ProgressRemote` over the server's JSON API.
#[derive(Clone)]
pub struct HttpProgressRemote {
    client: Client,
    config: RemoteConfig,
}

impl HttpProgressRemote {
    /// Build a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Transport` if the HTTP client cannot be initialised.
    pub fn new(config: RemoteConfig) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> Result<Url, SyncError> {
        self.config
            .endpoint(endpoint)
            .map_err(|e| SyncError::Transport(format!("invalid endpoint {endpoint}: {e}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SyncError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "remote response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

/// Map a non-success status and its body onto the error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &[u8]) -> SyncError {
    let reason = serde_json::from_slice::<ErrorBody>(body)
        .map(|body| body.reason)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::AuthExpired,
        StatusCode::NOT_FOUND => SyncError::NotFound(reason),
        StatusCode::CONFLICT => SyncError::Conflict(reason),
        _ => SyncError::Server { status, reason },
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SyncError::Decode(e.to_string()))
}

fn check_echo(expected: RemoteId, echo: &IdEcho) -> Result<(), SyncError> {
    if echo.id == expected {
        Ok(())
    } else {
        Err(SyncError::Conflict(format!(
            "server confirmed record {} instead of {expected}",
            echo.id
        )))
    }
}

#[async_trait]
impl ProgressRemote for HttpProgressRemote {
    async fn login(&self, email: &str, password: &str) -> Result<Credential, SyncError> {
        let request = self
            .client
            .post(self.url("user/login")?)
            .basic_auth(email, Some(password));
        let response = match self.send(request).await {
            Err(SyncError::AuthExpired) => return Err(SyncError::LoginRejected),
            other => other?,
        };

        let header_token = response
            .headers()
            .get(self.config.auth_header_key.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(token) = header_token {
            return Ok(Credential::new(token));
        }

        let body: TokenBody = decode(response).await.map_err(|_| {
            SyncError::Decode(format!(
                "login response carried no {} header or token body",
                self.config.auth_header_key
            ))
        })?;
        Ok(Credential::new(body.token))
    }

    async fn current_user(&self, credential: &Credential) -> Result<String, SyncError> {
        let request = self
            .client
            .get(self.url("user/me")?)
            .bearer_auth(credential.token());
        let body: UserBody = decode(self.send(request).await?).await?;
        Ok(body.email)
    }

    async fn fetch_all(&self, credential: &Credential) -> Result<Vec<RemoteRecord>, SyncError> {
        let request = self
            .client
            .get(self.url("user/progress")?)
            .bearer_auth(credential.token());
        let body: FetchBody = decode(self.send(request).await?).await?;
        Ok(body.into_records())
    }

    async fn create(
        &self,
        credential: &Credential,
        path: &Path,
        completed_on: DateTime<Utc>,
    ) -> Result<RemoteRecord, SyncError> {
        let request = self
            .client
            .post(self.url("progress")?)
            .bearer_auth(credential.token())
            .json(&ProgressBody { path, completed_on });
        let record: WireRecord = decode(self.send(request).await?).await?;
        if &record.path != path {
            return Err(SyncError::Conflict(format!(
                "server created {} for {path}",
                record.path
            )));
        }
        Ok(record.into())
    }

    async fn update(
        &self,
        credential: &Credential,
        id: RemoteId,
        path: &Path,
        completed_on: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let request = self
            .client
            .patch(self.url(&format!("progress/{id}"))?)
            .bearer_auth(credential.token())
            .json(&ProgressBody { path, completed_on });
        let echo: IdEcho = decode(self.send(request).await?).await?;
        check_echo(id, &echo)
    }

    async fn delete(&self, credential: &Credential, id: RemoteId) -> Result<(), SyncError> {
        let request = self
            .client
            .delete(self.url(&format!("progress/{id}"))?)
            .bearer_auth(credential.token());
        let echo: IdEcho = decode(self.send(request).await?).await?;
        check_echo(id, &echo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_expired() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, b""),
            SyncError::AuthExpired
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, b""),
            SyncError::AuthExpired
        ));
    }

    #[test]
    fn reason_comes_from_error_body_when_present() {
        let err = status_error(
            StatusCode::NOT_FOUND,
            br#"{"error":true,"reason":"progress 9 not found"}"#,
        );
        match err {
            SyncError::NotFound(reason) => assert_eq!(reason, "progress 9 not found"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_statuses_fall_back_to_canonical_reason() {
        match status_error(StatusCode::BAD_GATEWAY, b"<html>") {
            SyncError::Server { status, reason } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(reason, "Bad Gateway");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            status_error(StatusCode::CONFLICT, b""),
            SyncError::Conflict(_)
        ));
    }

    #[test]
    fn mismatched_echo_is_a_conflict() {
        assert!(check_echo(RemoteId::new(4), &IdEcho { id: RemoteId::new(4) }).is_ok());
        assert!(matches!(
            check_echo(RemoteId::new(4), &IdEcho { id: RemoteId::new(5) }),
            Err(SyncError::Conflict(_))
        ));
    }
}
