//! Long-running operations
//!
//! ARM answers most mutating requests with `201`/`202` and a status-monitor
//! URL instead of the final result. [`ArmOperation`] polls that URL until the
//! operation reaches a terminal state. Waiting is always bounded by an
//! [`OperationContext`], which carries the caller's deadline and
//! cancellation token.

use super::client::AzureClient;
use super::error::ApiError;
use super::http::ApiResponse;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation for one lifecycle call
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

/// Why a guarded wait stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("deadline exceeded")]
    TimedOut,
    #[error("cancelled")]
    Cancelled,
}

impl OperationContext {
    /// A context with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now (never, if that is unrepresentable)
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token (usually a child of a process-wide one)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut` until it finishes, the deadline passes or the context is cancelled
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = expiry => Err(Interrupted::TimedOut),
            output = fut => Ok(output),
        }
    }
}

/// Failure while waiting on a long-running operation
#[derive(Debug, Error)]
pub enum WaitError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("timed out waiting for the operation to complete")]
    TimedOut,
    #[error("cancelled while waiting for the operation to complete")]
    Cancelled,
}

impl From<Interrupted> for WaitError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::TimedOut => WaitError::TimedOut,
            Interrupted::Cancelled => WaitError::Cancelled,
        }
    }
}

/// A pollable handle to a remote mutation
pub trait LongRunningOperation: Send {
    /// Block until the operation succeeds or fails, or the context expires
    fn wait_for_completion(
        self,
        ctx: &OperationContext,
    ) -> impl Future<Output = Result<(), WaitError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PollTarget {
    Completed,
    AsyncOperation(String),
    Location(String),
}

/// Long-running operation backed by ARM's async-operation protocol
pub struct ArmOperation {
    client: AzureClient,
    target: PollTarget,
    first_delay: Duration,
}

impl ArmOperation {
    /// Classify the response to a mutating request
    pub fn from_response(client: &AzureClient, response: &ApiResponse) -> Self {
        let target = match (&response.async_operation, &response.location) {
            (Some(url), _) if matches!(response.status, 201 | 202) => {
                PollTarget::AsyncOperation(url.clone())
            },
            (None, Some(url)) if response.status == 202 => PollTarget::Location(url.clone()),
            _ => PollTarget::Completed,
        };

        Self {
            first_delay: response.retry_after.unwrap_or(client.poll_interval),
            client: client.clone(),
            target,
        }
    }

    /// An operation that finished synchronously
    pub fn completed(client: &AzureClient) -> Self {
        Self {
            client: client.clone(),
            target: PollTarget::Completed,
            first_delay: Duration::ZERO,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.target == PollTarget::Completed
    }

    async fn poll_until_done(&self) -> Result<(), ApiError> {
        let mut delay = self.first_delay;

        loop {
            tokio::time::sleep(delay).await;

            let response = match &self.target {
                PollTarget::Completed => return Ok(()),
                PollTarget::AsyncOperation(url) => {
                    let response = self.client.get(url).await?;
                    let status = response
                        .body
                        .get("status")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| {
                            ApiError::InvalidResponse(
                                "async operation status is missing".to_string(),
                            )
                        })?;

                    match status {
                        "Succeeded" => return Ok(()),
                        "Failed" | "Canceled" | "Cancelled" => {
                            let error = response.body.get("error");
                            let field = |name: &str| {
                                error
                                    .and_then(|e| e.get(name))
                                    .and_then(|v| v.as_str())
                                    .map(|s| s.to_string())
                            };
                            return Err(ApiError::OperationFailed {
                                status: status.to_string(),
                                code: field("code"),
                                message: field("message"),
                            });
                        },
                        other => tracing::debug!("Operation still {}, polling again", other),
                    }
                    response
                },
                PollTarget::Location(url) => {
                    let response = self.client.get(url).await?;
                    if response.status != 202 {
                        return Ok(());
                    }
                    tracing::debug!("Operation still running (202), polling again");
                    response
                },
            };

            delay = response.retry_after.unwrap_or(self.client.poll_interval);
        }
    }
}

impl LongRunningOperation for ArmOperation {
    async fn wait_for_completion(self, ctx: &OperationContext) -> Result<(), WaitError> {
        if self.is_completed() {
            return Ok(());
        }

        ctx.guard(self.poll_until_done()).await??;
        Ok(())
    }
}
