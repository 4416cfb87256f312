//! Call plans proposed by the model, and the defensive parser for them.
//!
//! The model is asked to reply with a document like:
//!
//! ```json
//! {
//!     "func_calling": [
//!         { "tool_name": "weather_tool", "parameter": "New York" }
//!     ]
//! }
//! ```
//!
//! Agent networks use `agent_calling`, `agent_name` and `task_description`
//! instead. Models rarely follow the format perfectly, so [`parse`] strips
//! code fences and surrounding prose, and falls back to a small set of
//! [`NormalizationRule`]s when the payload does not decode.

mod repair;

use serde::Deserialize;
use serde_json::{Map, Value};

pub use repair::NormalizationRule;

/// Selects which list key a plan is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlanKind {
    /// Tool calls, listed under `func_calling`.
    Tools,
    /// Agent calls, listed under `agent_calling`.
    Agents,
}

impl PlanKind {
    /// Returns the key of the call list.
    #[inline]
    pub fn list_key(self) -> &'static str {
        match self {
            PlanKind::Tools => "func_calling",
            PlanKind::Agents => "agent_calling",
        }
    }
}

/// The argument of a planned call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "Value")]
pub enum CallArgument {
    /// A plain text argument.
    Text(String),
    /// Named arguments.
    Map(Map<String, Value>),
}

impl CallArgument {
    /// Returns the argument as text, rendering maps as JSON.
    pub fn as_text(&self) -> String {
        match self {
            CallArgument::Text(text) => text.clone(),
            CallArgument::Map(map) => Value::Object(map.clone()).to_string(),
        }
    }

    /// Returns `true` for an empty text or an empty map.
    pub fn is_empty(&self) -> bool {
        match self {
            CallArgument::Text(text) => text.trim().is_empty(),
            CallArgument::Map(map) => map.is_empty(),
        }
    }
}

impl Default for CallArgument {
    #[inline]
    fn default() -> Self {
        CallArgument::Text(String::new())
    }
}

impl From<Value> for CallArgument {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CallArgument::default(),
            Value::String(text) => CallArgument::Text(text),
            Value::Object(map) => CallArgument::Map(map),
            other => CallArgument::Text(other.to_string()),
        }
    }
}

/// A single planned call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CallRequest {
    /// The tool or agent to invoke.
    #[serde(alias = "tool_name", alias = "agent_name")]
    pub target_name: String,
    /// The argument, empty text when omitted.
    #[serde(
        default,
        alias = "parameter",
        alias = "parameters",
        alias = "task_description"
    )]
    pub argument: CallArgument,
}

impl CallRequest {
    /// Creates a request.
    #[inline]
    pub fn new<S: Into<String>>(target_name: S, argument: CallArgument) -> Self {
        Self {
            target_name: target_name.into(),
            argument,
        }
    }
}

/// An ordered list of calls decoded from one model response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallPlan {
    /// The calls in the order the model listed them.
    pub calls: Vec<CallRequest>,
}

impl CallPlan {
    /// Returns `true` if the plan has no calls.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Returns the number of calls.
    #[inline]
    pub fn len(&self) -> usize {
        self.calls.len()
    }
}

impl IntoIterator for CallPlan {
    type Item = CallRequest;
    type IntoIter = std::vec::IntoIter<CallRequest>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.calls.into_iter()
    }
}

/// Why a model response could not be read as a call plan.
///
/// Neither variant is fatal: callers degrade to treating the response as
/// a direct answer.
#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    /// The text contains no `{ .. }` pair at all.
    #[error("model output contains no structured payload")]
    NoStructuredPayload,
    /// The payload was found but could not be decoded, even after
    /// normalization. Carries the error of the first decode attempt.
    #[error("malformed call plan: {0}")]
    MalformedPayload(#[source] serde_json::Error),
}

/// Parses a model response into a call plan.
pub fn parse(raw: &str, kind: PlanKind) -> Result<CallPlan, ParseFailure> {
    let text = strip_fence(raw.trim());
    let Some(payload) = slice_payload(text) else {
        return Err(ParseFailure::NoStructuredPayload);
    };

    let err = match decode(payload, kind) {
        Ok(plan) => return Ok(plan),
        Err(err) => err,
    };

    let normalized = repair::normalize(payload);
    if normalized != payload {
        if let Ok(plan) = decode(&normalized, kind) {
            debug!("call plan decoded after normalization");
            return Ok(plan);
        }
    }
    Err(ParseFailure::MalformedPayload(err))
}

/// Removes a surrounding code fence, with or without a `json` tag.
fn strip_fence(text: &str) -> &str {
    let Some(inner) = text
        .strip_prefix("```")
        .and_then(|inner| inner.strip_suffix("```"))
    else {
        return text;
    };
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner);
    inner.trim()
}

/// Returns the text from the first `{` to the last `}`.
fn slice_payload(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn decode(payload: &str, kind: PlanKind) -> Result<CallPlan, serde_json::Error> {
    let mut document: Map<String, Value> = serde_json::from_str(payload)?;
    let calls = match document.remove(kind.list_key()) {
        None | Some(Value::Null) => vec![],
        Some(list @ Value::Array(_)) => serde_json::from_value(list)?,
        // A lone call object in place of the list.
        Some(single) => vec![serde_json::from_value(single)?],
    };
    Ok(CallPlan { calls })
}
