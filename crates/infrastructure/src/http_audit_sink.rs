use std::time::Duration;

use async_trait::async_trait;
use bastion_application::{AuditSink, SealedAuditEvent};
use bastion_core::{AppError, AppResult};
use tracing::warn;

/// Best-effort HTTP fan-out of persisted audit events, e.g. to a SIEM
/// collector. Transient failures are retried with linear backoff.
pub struct HttpAuditSink {
    http_client: reqwest::Client,
    endpoint: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpAuditSink {
    /// Creates a sink posting to `endpoint`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    fn name(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn dispatch(&self, event: &SealedAuditEvent) -> AppResult<()> {
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .http_client
                .post(self.endpoint.as_str())
                .header("Idempotency-Key", event.audit_id.to_string())
                .header("X-Audit-Chain", event.chain_scope.as_str())
                .json(event)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} from audit sink",
                        response.status()
                    ));
                }
                Ok(response) => {
                    return Err(AppError::Internal(format!(
                        "audit sink rejected event with status {}",
                        response.status()
                    )));
                }
                Err(error) => {
                    last_error = Some(format!("audit sink transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                warn!(
                    sink = %self.endpoint,
                    audit_id = %event.audit_id,
                    attempt,
                    error = last_error.as_deref().unwrap_or_default(),
                    "retrying audit sink dispatch"
                );
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Internal(last_error.unwrap_or_else(|| {
            "audit sink dispatch failed".to_owned()
        })))
    }
}
