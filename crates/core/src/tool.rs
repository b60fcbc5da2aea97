//! Tool call supports.

mod context;
mod error;
mod executor;

use std::pin::Pin;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use context::ToolContext;
pub use error::{Error, ErrorKind};
pub(crate) use executor::Executor;

/// The result of a tool call, a JSON value reported back to the model.
pub type ToolResult = Result<Value, Error>;

/// A tool that can be called by the model.
///
/// Implementations should be stateless. Everything that must outlive a call
/// goes into the session state through the [`ToolContext`].
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`.
    fn execute(
        &self,
        input: Self::Input,
        ctx: ToolContext,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// Input of tools that take no arguments.
#[derive(Clone, Copy, Debug, Default, Deserialize, JsonSchema)]
pub struct NoArguments {}

/// Generates the parameter schema of `T` in the shape model providers
/// expect: an object schema without the `$schema` and `title` keys.
pub fn parameter_schema<T: JsonSchema>() -> Value {
    let mut schema = schema_for!(T).to_value();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object
            .entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
    }
    schema
}

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(
        &self,
        arguments: Value,
        ctx: ToolContext,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(
        &self,
        arguments: Value,
        ctx: ToolContext,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        // Some models send `null` for tools without parameters.
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            arguments => arguments,
        };
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(std::future::ready(ToolResult::Err(
                    Error::invalid_input().with_reason(reason),
                )));
            }
        };
        Box::pin(self.0.execute(input, ctx))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Quantity {
        /// How many pizzas.
        quantity: u32,
    }

    #[test]
    fn test_parameter_schema() {
        let schema = parameter_schema::<Quantity>();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["properties"]["quantity"]["type"], json!("integer"));
        assert_eq!(schema["required"], json!(["quantity"]));
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());

        let schema = parameter_schema::<NoArguments>();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["properties"], json!({}));
    }
}
