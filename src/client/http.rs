//! [`EntryApi`] over the REST API, using `reqwest`.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::api::{EntryApi, LockOutcome};
use super::{ClientError, ConflictError};
use crate::api::client_addr::FORWARDED_FOR;
use crate::api::dto::{EntryResponse, LockResponse};
use crate::config::ClientConfig;
use crate::domain::{Entry, EntryChange, EntryId, EntryLock, LockId, LogbookId};
use crate::error::{ConflictReason, ErrorResponse};

/// Error code the server uses for "entry is not locked".
const LOCK_NOT_FOUND: u32 = 2004;

/// HTTP implementation of [`EntryApi`].
#[derive(Debug, Clone)]
pub struct HttpEntryApi {
    client: Client,
    base_url: String,
    identity: Option<String>,
}

impl HttpEntryApi {
    /// Creates a client for the server at `config.api_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Network`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            identity: None,
        })
    }

    /// Sends `identity` as `X-Forwarded-For` with every request.
    ///
    /// Only honoured by servers started with `TRUST_FORWARDED_FOR`; used
    /// behind proxies and to run several lock holders from one host.
    #[must_use]
    pub fn with_client_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    fn entry_url(&self, logbook_id: LogbookId, entry_id: EntryId) -> String {
        format!(
            "{}/api/logbooks/{logbook_id}/entries/{entry_id}",
            self.base_url
        )
    }

    fn lock_url(&self, logbook_id: LogbookId, entry_id: EntryId) -> String {
        format!("{}/lock", self.entry_url(logbook_id, entry_id))
    }

    fn identify(&self, request: RequestBuilder) -> RequestBuilder {
        match self.identity.as_deref() {
            Some(identity) => request.header(FORWARDED_FOR, identity),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        Ok(self.identify(request).send().await?)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Turns a non-success response into the matching [`ClientError`].
async fn failure(response: Response) -> ClientError {
    let status = response.status();
    let body = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ErrorResponse>(&bytes).ok(),
        Err(err) => return err.into(),
    };
    let message = body
        .as_ref()
        .map_or_else(|| status.to_string(), |b| b.error.message.clone());
    match status {
        StatusCode::CONFLICT => {
            let (reason, lock) = body.map_or((ConflictReason::LockHeld, None), |b| {
                (b.error.reason.unwrap_or(ConflictReason::LockHeld), b.lock)
            });
            ClientError::Conflict(ConflictError {
                reason,
                message,
                lock,
            })
        }
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        _ => ClientError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

fn is_lock_not_found(err: &ClientError, code: Option<u32>) -> bool {
    matches!(err, ClientError::NotFound(_)) && code == Some(LOCK_NOT_FOUND)
}

/// Splits a `404` into "no lock" versus "no entry" using the error code.
async fn optional_lock(response: Response) -> Result<Option<EntryLock>, ClientError> {
    if response.status().is_success() {
        return Ok(Some(decode::<LockResponse>(response).await?.lock));
    }
    let status = response.status();
    let bytes = response.bytes().await?;
    let body = serde_json::from_slice::<ErrorResponse>(&bytes).ok();
    let code = body.as_ref().map(|b| b.error.code);
    let message = body.map_or_else(|| status.to_string(), |b| b.error.message);
    let err = if status == StatusCode::NOT_FOUND {
        ClientError::NotFound(message)
    } else {
        ClientError::Rejected {
            status: status.as_u16(),
            message,
        }
    };
    if is_lock_not_found(&err, code) {
        Ok(None)
    } else {
        Err(err)
    }
}

impl EntryApi for HttpEntryApi {
    async fn fetch_entry(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
    ) -> Result<EntryResponse, ClientError> {
        let response = self
            .send(self.client.get(self.entry_url(logbook_id, entry_id)))
            .await?;
        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        decode(response).await
    }

    async fn acquire_lock(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        steal: bool,
    ) -> Result<LockOutcome, ClientError> {
        let mut url = self.lock_url(logbook_id, entry_id);
        if steal {
            url.push_str("?steal=true");
        }
        let response = self.send(self.client.post(url)).await?;
        if response.status().is_success() {
            let LockResponse { lock } = decode(response).await?;
            return Ok(LockOutcome::Acquired(lock));
        }
        match failure(response).await {
            ClientError::Conflict(ConflictError {
                reason: ConflictReason::LockHeld,
                lock: Some(lock),
                ..
            }) => Ok(LockOutcome::HeldByOther(lock)),
            err => Err(err),
        }
    }

    async fn check_lock(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
    ) -> Result<Option<EntryLock>, ClientError> {
        let response = self
            .send(self.client.get(self.lock_url(logbook_id, entry_id)))
            .await?;
        optional_lock(response).await
    }

    async fn cancel_lock(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        lock_id: LockId,
    ) -> Result<Option<EntryLock>, ClientError> {
        let url = format!("{}?lock_id={lock_id}", self.lock_url(logbook_id, entry_id));
        let response = self.send(self.client.delete(url)).await?;
        optional_lock(response).await
    }

    async fn submit(
        &self,
        logbook_id: LogbookId,
        entry_id: EntryId,
        change: &EntryChange,
    ) -> Result<Entry, ClientError> {
        let response = self
            .send(self.client.put(self.entry_url(logbook_id, entry_id)).json(change))
            .await?;
        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        Ok(decode::<EntryResponse>(response).await?.entry)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_the_base() {
        let config = ClientConfig {
            api_url: "http://logbook.local:8000/".to_string(),
            ..ClientConfig::default()
        };
        let Ok(api) = HttpEntryApi::new(&config) else {
            panic!("client should build");
        };
        assert_eq!(
            api.lock_url(LogbookId::new(3), EntryId::new(42)),
            "http://logbook.local:8000/api/logbooks/3/entries/42/lock"
        );
    }

    #[test]
    fn lock_not_found_needs_the_lock_code() {
        let err = ClientError::NotFound("entry 42 is not locked".to_string());
        assert!(is_lock_not_found(&err, Some(LOCK_NOT_FOUND)));
        assert!(!is_lock_not_found(&err, Some(2002)));
        assert!(!is_lock_not_found(&ClientError::Timeout, Some(LOCK_NOT_FOUND)));
    }
}
