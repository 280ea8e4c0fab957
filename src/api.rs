//! REST client for message reconciliation and high-water-mark acks.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{AckError, FetchError};
use crate::types::{Message, MessageBatch};

/// The two REST operations the session engine needs: fetching the
/// undelivered batch and advancing the server-side cursor.
///
/// Neither operation retries internally. Fetches are retried by the
/// next trigger event; a missed ack just means the next fetch
/// re-delivers messages the server still considers unread.
#[async_trait]
pub trait MessageApi: Send + Sync {
    /// Fetch every message the server has not yet seen acknowledged.
    async fn fetch_messages(&self) -> Result<Vec<Message>, FetchError>;

    /// Advance the device's high-water mark. Idempotent on the server;
    /// re-sending the same id is safe.
    async fn update_highest_message(&self, id: u64) -> Result<(), AckError>;
}

/// Concrete client against the Pushover REST API.
pub struct ApiClient {
    http: Client,
    api_url: String,
    device_id: String,
    secret: String,
}

impl ApiClient {
    /// Build a client from validated settings.
    ///
    /// # Errors
    /// Returns the underlying `reqwest` error if the client cannot be
    /// constructed.
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            device_id: settings.device_id.clone(),
            secret: settings.secret.clone(),
        })
    }
}

#[async_trait]
impl MessageApi for ApiClient {
    async fn fetch_messages(&self) -> Result<Vec<Message>, FetchError> {
        let url = format!("{}/messages.json", self.api_url);
        debug!("Refreshing messages");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("secret", self.secret.as_str()),
                ("device_id", self.device_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let batch: MessageBatch =
            serde_json::from_str(&body).map_err(|source| FetchError::Parse { source, body })?;

        debug!(count = batch.messages.len(), "Fetched message batch");
        Ok(batch.messages)
    }

    async fn update_highest_message(&self, id: u64) -> Result<(), AckError> {
        let url = format!(
            "{}/devices/{}/update_highest_message.json",
            self.api_url, self.device_id
        );
        info!(message_id = id, "Updating head position");

        let message = id.to_string();
        let response = self
            .http
            .post(&url)
            .form(&[
                ("secret", self.secret.as_str()),
                ("message", message.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AckError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
