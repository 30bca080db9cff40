//! Thin REST wrappers over the scheduling backend. Every call honours the
//! cancellation token handed in by the lifecycle controller.

use std::future::Future;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{EventId, UserId},
    error::ApiError,
    protocol::{ConfirmationSummary, EventSummary, NotificationSummary, UserSummary},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::{config::ClientSettings, error::OperationError};

#[derive(Clone)]
pub struct AgendaApi {
    http: Client,
    base_url: Url,
}

impl AgendaApi {
    pub fn new(base_url: &str) -> Result<Self, OperationError> {
        let mut raw = base_url.trim().to_string();
        // `Url::join` replaces the last segment unless the base ends with '/'.
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)
            .map_err(|err| OperationError::failure(format!("invalid server url '{base_url}': {err}")))?;
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, OperationError> {
        Self::new(&settings.server_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn list_users(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<UserSummary>, OperationError> {
        self.get_json("users", token).await
    }

    pub async fn list_events(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<EventSummary>, OperationError> {
        self.get_json("events", token).await
    }

    pub async fn get_event(
        &self,
        event_id: EventId,
        token: &CancellationToken,
    ) -> Result<EventSummary, OperationError> {
        self.get_json(&format!("events/{event_id}"), token).await
    }

    pub async fn list_confirmations(
        &self,
        event_id: EventId,
        token: &CancellationToken,
    ) -> Result<Vec<ConfirmationSummary>, OperationError> {
        self.get_json(&format!("events/{event_id}/confirmations"), token)
            .await
    }

    pub async fn list_notifications(
        &self,
        user_id: UserId,
        token: &CancellationToken,
    ) -> Result<Vec<NotificationSummary>, OperationError> {
        self.get_json(&format!("users/{user_id}/notifications"), token)
            .await
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<R, OperationError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| OperationError::failure(format!("invalid request path '{path}': {err}")))?;
        debug!(%url, "GET");

        let response = until_cancelled(token, self.http.get(url).send()).await??;
        let response = into_success(response, token).await?;
        until_cancelled(token, response.json::<R>())
            .await?
            .map_err(|err| OperationError::failure(format!("invalid response body: {err}")))
    }
}

async fn into_success(
    response: Response,
    token: &CancellationToken,
) -> Result<Response, OperationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = until_cancelled(token, response.bytes()).await?.ok();
    let server_message = body
        .and_then(|bytes| serde_json::from_slice::<ApiError>(&bytes).ok())
        .and_then(|api_error| api_error.display_message().map(str::to_string));

    Err(OperationError::Response {
        status: status.as_u16(),
        server_message,
        message: format!("request failed with status {status}"),
    })
}

async fn until_cancelled<F: Future>(
    token: &CancellationToken,
    future: F,
) -> Result<F::Output, OperationError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(OperationError::Cancelled),
        output = future => Ok(output),
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
