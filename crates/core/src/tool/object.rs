use std::pin::Pin;

use serde_json::Value;

use super::{Error, InvocationStyle, Tool, ToolResult};

pub(crate) type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Type-erased [`Tool`].
pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Option<&Value>;

    fn invocation_style(&self) -> InvocationStyle;

    /// Decodes the arguments and starts the tool.
    ///
    /// Returns an `InvalidInput` error without running anything when the
    /// arguments don't fit the tool's input type.
    fn execute(&self, arguments: Value) -> Result<ToolFuture, Error>;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameters(&self) -> Option<&Value> {
        self.0.parameters()
    }

    #[inline]
    fn invocation_style(&self) -> InvocationStyle {
        self.0.invocation_style()
    }

    fn execute(&self, arguments: Value) -> Result<ToolFuture, Error> {
        let input: T::Input = serde_json::from_value(arguments)?;
        Ok(Box::pin(self.0.execute(input)))
    }
}
