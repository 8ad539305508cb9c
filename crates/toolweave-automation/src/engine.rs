//! Interpreter for automation definitions.
//!
//! A run prepares the arguments, then executes the main steps strictly in
//! order on the `main` lane. When the main sequence succeeds, every named lane
//! runs concurrently on its own bridge (and therefore its own tab). Tabs opened
//! during a run are closed when it ends.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tokio::time::Instant;
use toolweave_core::{
    Action, ActionStep, ExtractField, ExtractMode, Lane, MAIN_LANE, RunnerResult, Settings,
    StepLog, StepStatus, ToolDefinition, ValidationError, ValueType, prepare_arguments,
};
use tracing::Instrument;

use crate::bridge::{BridgeError, BridgePool, CommandChannel, RemoteActionBridge};
use crate::template;

/// Error recorded for every lane step when the main sequence aborted.
pub const MAIN_ABORTED: &str = "main sequence aborted";

/// Failure of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Invalid url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Unexpected {action} payload: {message}")]
    InvalidPayload { action: String, message: String },
}

/// Runs [`ToolDefinition`]s against a browser controller.
pub struct AutomationEngine {
    channel: Arc<dyn CommandChannel>,
    command_timeout: Duration,
}

impl AutomationEngine {
    pub fn new(channel: Arc<dyn CommandChannel>, command_timeout: Duration) -> Self {
        Self {
            channel,
            command_timeout,
        }
    }

    pub fn from_settings(channel: Arc<dyn CommandChannel>, settings: &Settings) -> Self {
        Self::new(channel, settings.command_timeout())
    }

    /// Run `def` with the caller's `arguments`.
    ///
    /// Argument problems are returned before any command reaches the browser.
    /// Step failures never surface as `Err`; they are reported in the result.
    pub async fn run(
        &self,
        def: &ToolDefinition,
        arguments: &Map<String, Value>,
    ) -> Result<RunnerResult, ValidationError> {
        let args = prepare_arguments(def, arguments)?;
        let span = tracing::info_span!("automation_run", tool = %def.name);

        let result = async {
            let pool = BridgePool::new(Arc::clone(&self.channel), self.command_timeout);

            let main = pool.lane(MAIN_LANE).await;
            let mut result = run_steps(&main, &def.steps, &args).await;

            if result.success {
                let lanes = join_all(def.lanes.iter().map(|lane| {
                    let pool = &pool;
                    let args = &args;
                    async move {
                        let bridge = pool.lane(&lane.name).await;
                        (lane.name.clone(), run_steps(&bridge, &lane.steps, args).await)
                    }
                }))
                .await;
                result.lanes.extend(lanes);
            } else {
                for lane in &def.lanes {
                    result.lanes.insert(lane.name.clone(), skipped_lane(lane));
                }
            }

            pool.close_all().await;

            result.success = result.all_succeeded();
            result.error = result.first_error();
            tracing::info!(
                success = result.success,
                steps = result.log.len(),
                lanes = result.lanes.len(),
                "Automation run finished"
            );
            result
        }
        .instrument(span)
        .await;

        Ok(result)
    }
}

async fn run_steps(
    bridge: &RemoteActionBridge,
    steps: &[ActionStep],
    args: &Map<String, Value>,
) -> RunnerResult {
    let mut result = RunnerResult {
        success: true,
        ..RunnerResult::default()
    };

    for (index, step) in steps.iter().enumerate() {
        let action = template::resolve_action(&step.action, args);
        let started = Instant::now();
        let outcome = execute_step(bridge, &action).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(extracted) => {
                tracing::debug!(lane = bridge.lane_id(), index, action = action.kind(), duration_ms, "Step ok");
                if let Some((name, value)) = extracted {
                    result.data.insert(name, value);
                }
                result.log.push(log_entry(index, step, StepStatus::Ok, duration_ms, None));
            }
            Err(e) => {
                let message = e.to_string();
                result.log.push(log_entry(
                    index,
                    step,
                    StepStatus::Error,
                    duration_ms,
                    Some(message.clone()),
                ));

                if step.continue_on_error {
                    tracing::warn!(lane = bridge.lane_id(), index, action = action.kind(), error = %message, "Step failed, continuing");
                    continue;
                }

                tracing::warn!(lane = bridge.lane_id(), index, action = action.kind(), error = %message, "Step failed, aborting");
                result.success = false;
                result.error = Some(message);
                break;
            }
        }
    }

    result
}

async fn execute_step(
    bridge: &RemoteActionBridge,
    action: &Action,
) -> Result<Option<(String, Value)>, StepError> {
    match action {
        Action::Navigate { url, query } => {
            let mut target = url::Url::parse(url).map_err(|e| StepError::InvalidUrl {
                url: url.clone(),
                message: e.to_string(),
            })?;
            if !query.is_empty() {
                target.query_pairs_mut().extend_pairs(query);
            }

            if bridge.tab_id().await.is_none() {
                bridge.open(target.as_str(), false).await?;
            } else {
                bridge.navigate(target.as_str()).await?;
            }
            bridge.wait_for_load(None).await?;
        }
        Action::Click { selector } => bridge.click(selector).await?,
        Action::Type {
            selector,
            text,
            clear,
        } => bridge.type_text(selector, text, *clear).await?,
        Action::Scroll {
            selector,
            direction,
            amount,
        } => bridge.scroll(selector.as_deref(), *direction, *amount).await?,
        Action::Select { selector, value } => bridge.select(selector, value).await?,
        Action::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        Action::WaitForSelector { selector, timeout } => {
            bridge.wait_for_selector(selector, *timeout).await?;
        }
        Action::WaitForUrl { pattern, timeout } => bridge.wait_for_url(pattern, *timeout).await?,
        Action::WaitForLoad { timeout } => bridge.wait_for_load(*timeout).await?,
        Action::Extract {
            name,
            mode,
            selector,
            fields,
        } => {
            let raw = match mode {
                ExtractMode::List => bridge.extract_list(selector, fields).await?,
                ExtractMode::Single => bridge.extract_single(selector, fields).await?,
            };
            return Ok(Some((name.clone(), shape_extraction(*mode, raw, fields)?)));
        }
    }

    Ok(None)
}

/// Check the payload shape and apply field coercions.
///
/// `list` yields an array (a `null` payload means no matches); `single` yields
/// an object, or `null` when nothing matched.
fn shape_extraction(
    mode: ExtractMode,
    raw: Value,
    fields: &[ExtractField],
) -> Result<Value, StepError> {
    let invalid = |message: String| StepError::InvalidPayload {
        action: "extract".to_string(),
        message,
    };

    match (mode, raw) {
        (ExtractMode::List, Value::Null) => Ok(Value::Array(Vec::new())),
        (ExtractMode::List, Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(Value::Object(coerce_record(record, fields))),
                other => Err(invalid(format!("expected an object per item, got {other}"))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (ExtractMode::Single, Value::Null) => Ok(Value::Null),
        (ExtractMode::Single, Value::Object(record)) => {
            Ok(Value::Object(coerce_record(record, fields)))
        }
        (ExtractMode::List, other) => Err(invalid(format!("expected an array, got {other}"))),
        (ExtractMode::Single, other) => Err(invalid(format!("expected an object, got {other}"))),
    }
}

fn coerce_record(mut record: Map<String, Value>, fields: &[ExtractField]) -> Map<String, Value> {
    for field in fields {
        if let Some(value_type) = field.value_type
            && let Some(value) = record.get_mut(&field.key)
        {
            *value = coerce(value.take(), value_type);
        }
    }
    record
}

/// Convert an extracted value. Unconvertible values become `null`.
pub fn coerce(value: Value, value_type: ValueType) -> Value {
    match (value_type, value) {
        (_, Value::Null) => Value::Null,
        (ValueType::String, Value::String(s)) => Value::String(s),
        (ValueType::String, other) => Value::String(other.to_string()),
        (ValueType::Number, Value::Number(n)) => Value::Number(n),
        (ValueType::Number, Value::String(s)) => parse_number(&s),
        (ValueType::Number, _) => Value::Null,
        (ValueType::Boolean, Value::Bool(b)) => Value::Bool(b),
        (ValueType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Value::Bool(true),
            "false" | "no" | "0" | "off" | "" => Value::Bool(false),
            _ => Value::Null,
        },
        (ValueType::Boolean, Value::Number(n)) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        (ValueType::Boolean, _) => Value::Null,
    }
}

/// Parse text such as `"$1,299.00"` or `"-3 items"` into a number.
fn parse_number(text: &str) -> Value {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();

    if let Ok(int) = cleaned.parse::<i64>() {
        return Value::Number(int.into());
    }
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

fn log_entry(
    index: usize,
    step: &ActionStep,
    status: StepStatus,
    duration_ms: u64,
    error: Option<String>,
) -> StepLog {
    StepLog {
        index,
        action: step.action.kind().to_string(),
        label: step.label.clone(),
        status,
        duration_ms,
        error,
    }
}

fn skipped_lane(lane: &Lane) -> RunnerResult {
    RunnerResult {
        success: false,
        log: lane
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                log_entry(index, step, StepStatus::Skipped, 0, Some(MAIN_ABORTED.to_string()))
            })
            .collect(),
        error: Some(MAIN_ABORTED.to_string()),
        ..RunnerResult::default()
    }
}
