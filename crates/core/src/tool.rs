//! Tool call supports.

mod dispatcher;
mod error;
mod object;
mod registry;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use dispatcher::{
    CallResult, CallResults, DEFAULT_MAX_CONCURRENCY, ToolDispatcher,
};
pub use error::{Error, ErrorKind};
pub use registry::ToolRegistry;

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// How planned arguments are passed to a tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InvocationStyle {
    /// The tool takes nothing, it receives `null`.
    NoArgs,
    /// The tool receives named arguments as a JSON object.
    #[default]
    Keyword,
    /// The tool receives argument values as a JSON array, in the order
    /// the model wrote them.
    Positional,
}

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as the working directory or the
/// current user. To do this, make the context an immutable state of the tool,
/// which can be set during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    ///
    /// Derived structs accept both the object and the array form, so they
    /// work with [`InvocationStyle::Keyword`] and
    /// [`InvocationStyle::Positional`] alike.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the raw parameter declaration, or `None` if the tool takes
    /// no parameters.
    ///
    /// See [`FunctionSchema::from_declaration`] for the accepted forms.
    ///
    /// [`FunctionSchema::from_declaration`]: crate::schema::FunctionSchema::from_declaration
    fn parameters(&self) -> Option<&Value>;

    /// Returns how arguments are passed to the tool.
    #[inline]
    fn invocation_style(&self) -> InvocationStyle {
        InvocationStyle::Keyword
    }

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// A tool backed by a closure over the raw JSON arguments.
///
/// This is the quickest way to expose an existing function:
///
/// ```
/// use archer_core::tool::FnTool;
/// use serde_json::json;
///
/// let tool = FnTool::new("echo", "Repeats the input.", |args| async move {
///     Ok(args["text"].as_str().unwrap_or_default().to_owned())
/// })
/// .with_parameters(json!({ "text": "text to repeat:str" }));
/// ```
pub struct FnTool<F> {
    name: String,
    description: String,
    parameters: Option<Value>,
    style: InvocationStyle,
    func: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    /// Creates a tool without parameters.
    #[inline]
    pub fn new<N, D>(name: N, description: D, func: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
            style: InvocationStyle::default(),
            func,
        }
    }

    /// Sets the raw parameter declaration.
    #[inline]
    pub fn with_parameters(mut self, declaration: Value) -> Self {
        self.parameters = Some(declaration);
        self
    }

    /// Sets the invocation style.
    #[inline]
    pub fn with_invocation_style(mut self, style: InvocationStyle) -> Self {
        self.style = style;
        self
    }
}

impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    type Input = Value;

    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    fn parameters(&self) -> Option<&Value> {
        self.parameters.as_ref()
    }

    #[inline]
    fn invocation_style(&self) -> InvocationStyle {
        self.style
    }

    #[inline]
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        (self.func)(input)
    }
}
