//! Tool execution with retry and fan-out.
//!
//! Retries live here and nowhere else: transports and the registry report a
//! failure once and the executor decides whether to try again.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use toolweave_core::{Settings, ToolCall, ToolResult};
use tracing::Instrument;

use crate::registry::ToolInvoker;

/// Exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt; doubles after each further one.
    pub base_delay: Duration,
    /// Retries used by `execute_with_default_retry`.
    pub default_retries: u32,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_delay: settings.retry_base_delay(),
            default_retries: settings.effective_max_retries(),
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is zero-based.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::with_defaults())
    }
}

/// Runs tool calls against a `ToolInvoker`.
#[derive(Clone)]
pub struct ToolExecutor {
    invoker: Arc<dyn ToolInvoker>,
    policy: RetryPolicy,
}

impl ToolExecutor {
    pub fn new(invoker: Arc<dyn ToolInvoker>, policy: RetryPolicy) -> Self {
        Self { invoker, policy }
    }

    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one call and attach it to the result.
    pub async fn execute(&self, call: ToolCall) -> ToolResult {
        let span = tracing::info_span!(
            "tool_call",
            server_id = %call.server_id,
            tool = %call.tool_name
        );

        async {
            let result = self.invoker.invoke(call.clone()).await;
            if result.success {
                tracing::debug!(items = result.content.len(), "Tool call succeeded");
            } else {
                tracing::debug!(error = ?result.error, "Tool call failed");
            }
            result.with_call(call)
        }
        .instrument(span)
        .await
    }

    /// Run one call, retrying failed results up to `max_retries` times.
    ///
    /// Waits `base, 2*base, 4*base, ...` between attempts and never after the
    /// last one. Returns the first success or the last failure.
    pub async fn execute_with_retry(&self, call: ToolCall, max_retries: u32) -> ToolResult {
        let mut attempt = 0;
        loop {
            let result = self.execute(call.clone()).await;
            if result.success || attempt >= max_retries {
                if !result.success && max_retries > 0 {
                    tracing::warn!(
                        server_id = %call.server_id,
                        tool = %call.tool_name,
                        attempts = attempt + 1,
                        "Tool call failed after retries"
                    );
                }
                return result;
            }

            let delay = self.policy.delay_after(attempt);
            tracing::debug!(
                server_id = %call.server_id,
                tool = %call.tool_name,
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying tool call"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// `execute_with_retry` with the configured default retry count.
    pub async fn execute_with_default_retry(&self, call: ToolCall) -> ToolResult {
        self.execute_with_retry(call, self.policy.default_retries)
            .await
    }

    /// Run calls concurrently. Results keep the order of `calls`; one failure
    /// does not affect the others.
    pub async fn execute_all(&self, calls: Vec<ToolCall>) -> Vec<ToolResult> {
        join_all(calls.into_iter().map(|call| self.execute(call))).await
    }
}
