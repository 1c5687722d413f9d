use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::{ServerError, ServerResult};

/// Payload describing one recorded transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionNotice {
    pub student_name: String,
    pub student_email: String,
    pub book_title: String,
    pub action: String,
    pub transaction_date: String,
    /// `%Y-%m-%d`.
    pub due_date: String,
}

/// Runs after a transaction is durably appended. Failures are reported to
/// the caller but never undo the append.
#[async_trait]
pub trait TransactionHook: Send + Sync {
    async fn on_recorded(&self, notice: &TransactionNotice) -> ServerResult<()>;
}

pub struct NoOpHook;

#[async_trait]
impl TransactionHook for NoOpHook {
    async fn on_recorded(&self, _notice: &TransactionNotice) -> ServerResult<()> {
        Ok(())
    }
}

/// POSTs each notice as JSON to a fixed URL.
pub struct WebhookHook {
    client: reqwest::Client,
    url: String,
}

impl WebhookHook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ServerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Config(format!("webhook client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TransactionHook for WebhookHook {
    async fn on_recorded(&self, notice: &TransactionNotice) -> ServerResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .map_err(|e| ServerError::Internal(format!("webhook delivery: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::Internal(format!("webhook answered {status}")));
        }
        debug!(url = %self.url, book = %notice.book_title, "webhook delivered");
        Ok(())
    }
}
