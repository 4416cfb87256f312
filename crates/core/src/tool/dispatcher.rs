use std::collections::BTreeMap;
use std::collections::btree_map;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use super::registry::Entry;
use super::{Error, ErrorKind, InvocationStyle, ToolRegistry, ToolResult};
use crate::plan::{CallArgument, CallPlan, CallRequest};
use crate::schema::{FunctionSchema, RESERVED_TOOL_NAME};

/// The number of tools a dispatcher runs at once by default.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// The outcome of one planned call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallResult {
    /// The tool returned a value.
    Value(String),
    /// The tool failed, or could not be found.
    Error(Error),
    /// The call targets the direct-answer pseudo-tool, carrying the
    /// question the model should answer itself.
    Deferred(String),
}

impl From<ToolResult> for CallResult {
    #[inline]
    fn from(result: ToolResult) -> Self {
        match result {
            Ok(value) => CallResult::Value(value),
            Err(err) => CallResult::Error(err),
        }
    }
}

impl CallResult {
    /// Renders the result the way it is shown to the model.
    pub fn to_context(&self) -> Value {
        match self {
            CallResult::Value(value) => Value::String(value.clone()),
            CallResult::Error(err) => json!({
                "error": format!(
                    "Failed to get info: {}.",
                    err.reason().trim_end_matches('.')
                ),
            }),
            CallResult::Deferred(question) => json!({ "deferred": question }),
        }
    }
}

/// Results of a dispatch round, keyed by target name.
///
/// When a plan calls the same target twice, the result that completes
/// last wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallResults(BTreeMap<String, CallResult>);

impl CallResults {
    /// Creates an empty result map.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a result, returning the one it replaced.
    #[inline]
    pub fn insert<S: Into<String>>(
        &mut self,
        name: S,
        result: CallResult,
    ) -> Option<CallResult> {
        self.0.insert(name.into(), result)
    }

    /// Returns the result for a target.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&CallResult> {
        self.0.get(name)
    }

    /// Returns the number of results.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no results.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the results in name order.
    #[inline]
    pub fn iter(&self) -> btree_map::Iter<'_, String, CallResult> {
        self.0.iter()
    }

    /// Iterates mutably over the results in name order.
    #[inline]
    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, CallResult> {
        self.0.iter_mut()
    }

    /// Serializes the results into the JSON object embedded in the
    /// summarizing prompt.
    pub fn to_context(&self) -> String {
        let object: Map<String, Value> = self
            .0
            .iter()
            .map(|(name, result)| (name.clone(), result.to_context()))
            .collect();
        Value::Object(object).to_string()
    }
}

impl IntoIterator for CallResults {
    type Item = (String, CallResult);
    type IntoIter = btree_map::IntoIter<String, CallResult>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, CallResult)> for CallResults {
    fn from_iter<I: IntoIterator<Item = (String, CallResult)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Runs the calls of a plan against a registry, concurrently.
///
/// Every call gets its own task. Failures, unknown tools and panics are
/// recorded as [`CallResult::Error`] for that call only and never affect
/// sibling calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolDispatcher {
    max_concurrency: usize,
}

impl Default for ToolDispatcher {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl ToolDispatcher {
    /// Creates a dispatcher running at most `max_concurrency` tools at once.
    /// Zero is treated as one.
    #[inline]
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Returns the concurrency limit.
    #[inline]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Runs every call of `plan` and waits for all of them.
    pub async fn dispatch(
        &self,
        plan: CallPlan,
        registry: &ToolRegistry,
    ) -> CallResults {
        let span = debug_span!("tool dispatcher", calls = plan.len());
        self.dispatch_inner(plan, registry).instrument(span).await
    }

    async fn dispatch_inner(
        &self,
        plan: CallPlan,
        registry: &ToolRegistry,
    ) -> CallResults {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut results = CallResults::new();

        for CallRequest {
            target_name,
            argument,
        } in plan
        {
            let Some(entry) = registry.entry(&target_name) else {
                if target_name.eq_ignore_ascii_case(RESERVED_TOOL_NAME) {
                    trace!("deferring `{target_name}` to the model");
                    results.insert(
                        target_name,
                        CallResult::Deferred(argument.as_text()),
                    );
                } else {
                    warn!("tool not found: {target_name}");
                    let err = Error::not_found()
                        .with_reason(format!("Tool '{target_name}' not found."));
                    results.insert(target_name, CallResult::Error(err));
                }
                continue;
            };

            let entry = entry.clone();
            let semaphore = Arc::clone(&semaphore);
            let span = debug_span!("tool execute", tool = %target_name);
            trace!("spawning `{target_name}` with args: {argument:?}");
            tasks.spawn(
                async move {
                    // The semaphore is never closed, the permit is always
                    // granted eventually.
                    let _permit = semaphore.acquire_owned().await.ok();
                    let result = AssertUnwindSafe(invoke(&entry, argument))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            error!("tool panicked");
                            Err(Error::execution_error()
                                .with_reason("the tool panicked"))
                        });
                    (target_name, result)
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    debug!("tool `{name}` returned: {result:?}");
                    results.insert(name, result.into());
                }
                // Panics are caught inside the task, so this can only be a
                // cancelled runtime.
                Err(err) => error!("tool task failed: {err}"),
            }
        }
        results
    }
}

async fn invoke(entry: &Entry, argument: CallArgument) -> ToolResult {
    if entry.style == InvocationStyle::NoArgs {
        if !argument.is_empty() {
            trace!("ignoring argument for a tool without parameters");
        }
        return entry.tool.execute(Value::Null)?.await;
    }

    let named = keyword_arguments(&entry.schema, argument);
    if entry.style == InvocationStyle::Positional {
        return entry.tool.execute(positional_arguments(named))?.await;
    }

    match entry.tool.execute(Value::Object(named.clone())) {
        Ok(fut) => fut.await,
        Err(err) if err.kind() == ErrorKind::InvalidInput => {
            debug!("named arguments rejected ({err}), retrying positionally");
            entry.tool.execute(positional_arguments(named))?.await
        }
        Err(err) => Err(err),
    }
}

/// Maps a planned argument onto the declared parameters.
fn keyword_arguments(
    schema: &FunctionSchema,
    argument: CallArgument,
) -> Map<String, Value> {
    let mut named = match argument {
        CallArgument::Map(map) => unwrap_nested(schema, map),
        CallArgument::Text(text) => {
            let mut named = Map::new();
            if let Some((first, _)) = schema.parameters().first() {
                named.insert(first.clone(), Value::String(text));
            }
            named
        }
    };
    for (param, spec) in schema.parameters() {
        if let Some(default) = &spec.default {
            if !named.contains_key(param) {
                named.insert(param.clone(), default.clone());
            }
        }
    }
    named
}

/// Flattens `{"wrapper": {..}}` when `wrapper` is not a declared parameter.
fn unwrap_nested(
    schema: &FunctionSchema,
    map: Map<String, Value>,
) -> Map<String, Value> {
    if map.len() != 1 {
        return map;
    }
    let is_wrapper = map
        .iter()
        .next()
        .is_some_and(|(key, value)| value.is_object() && schema.param(key).is_none());
    if !is_wrapper {
        return map;
    }
    match map.into_iter().next() {
        Some((key, Value::Object(inner))) => {
            trace!("unwrapped over-nested arguments under `{key}`");
            inner
        }
        Some((key, value)) => Map::from_iter([(key, value)]),
        None => Map::new(),
    }
}

fn positional_arguments(named: Map<String, Value>) -> Value {
    Value::Array(named.into_iter().map(|(_, value)| value).collect())
}
