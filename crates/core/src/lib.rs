//! Core logic of the orchestrator: tool schemas, call plan parsing, tool
//! dispatch, the agent loop and agent networks.
//!
//! An [`Agent`] asks the model which tools to call, runs them concurrently,
//! and has the model summarize the results. An [`AgentNetwork`] does the
//! same with whole agents as its tools.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod network;
pub mod plan;
mod prompt;
pub mod schema;
pub mod session;
pub mod tool;

pub use agent::{Agent, AgentBuilder};
pub use network::{AgentNetwork, Delegate, NetworkBuilder};
pub use schema::{FunctionSchema, ParamSpec, ParamType, SchemaError};
pub use session::{ChatSession, ModelError};
pub use tool::{FnTool, InvocationStyle, Tool, ToolResult};
