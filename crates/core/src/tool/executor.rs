use std::collections::HashMap;

use primer_model::{ModelTool, ToolCallRequest};
use serde_json::{Value, json};
use tracing::Instrument;

use crate::tool::{Error, ToolContext, ToolObject};

/// An executor that handles tool call requests from the model.
pub struct Executor {
    tools: Vec<Box<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

impl Executor {
    pub fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut index = HashMap::with_capacity(tools.len());
        for (idx, tool) in tools.iter().enumerate() {
            if index.insert(tool.name().to_owned(), idx).is_some() {
                warn!(
                    "tool `{}` is registered twice, last one wins",
                    tool.name()
                );
            }
        }
        Self { tools, index }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the definitions in registration order.
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .iter()
            .enumerate()
            .filter(|(idx, tool)| self.index.get(tool.name()) == Some(idx))
            .map(|(_, tool)| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().trim().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Runs one tool call and returns the JSON to report back to the model.
    ///
    /// Failures, including unknown tools, are turned into `{"error": ...}`.
    pub async fn execute(
        &self,
        req: &ToolCallRequest,
        ctx: ToolContext,
    ) -> Value {
        let result = match self.index.get(&req.name) {
            Some(&idx) => {
                trace!(
                    "calling tool ({}) with args: {:?}",
                    req.id, req.arguments
                );
                self.tools[idx]
                    .execute(req.arguments.clone(), ctx)
                    .instrument(debug_span!("tool execute", name = %req.name))
                    .await
            }
            None => {
                warn!("tool not found: {}", req.name);
                Err(Error::not_found().with_reason(format!(
                    "tool `{}` is not available",
                    req.name
                )))
            }
        };
        match result {
            Ok(value) => value,
            Err(err) => {
                debug!("tool `{}` failed: {err}", req.name);
                json!({ "error": err.reason() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use primer_session::State;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::tool::{AnyTool, Tool, ToolResult, parameter_schema};

    #[derive(Deserialize, schemars::JsonSchema)]
    struct CounterInput {
        by: i64,
    }

    struct CounterTool {
        parameter_schema: Value,
    }

    impl Tool for CounterTool {
        type Input = CounterInput;

        fn name(&self) -> &str {
            "bump_counter"
        }

        fn description(&self) -> &str {
            "  Bumps the counter.  "
        }

        fn parameter_schema(&self) -> &Value {
            &self.parameter_schema
        }

        fn execute(
            &self,
            input: Self::Input,
            ctx: ToolContext,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            let mut state = ctx.state();
            let count = state.get_as::<i64>("count").unwrap_or(0) + input.by;
            if count < 0 {
                return ready(Err(
                    Error::execution_error().with_reason("counter underflow")
                ));
            }
            state.set("count", count);
            ready(Ok(json!({ "count": count })))
        }
    }

    fn executor() -> Executor {
        Executor::with_tools(vec![Box::new(AnyTool(CounterTool {
            parameter_schema: parameter_schema::<CounterInput>(),
        }))])
    }

    fn call(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_execute() {
        let executor = executor();
        let ctx = ToolContext::detached(State::default());

        let result = executor
            .execute(&call("bump_counter", json!({ "by": 2 })), ctx.clone())
            .await;
        assert_eq!(result, json!({ "count": 2 }));
        assert_eq!(ctx.state().delta().get("count"), Some(&json!(2)));

        let result = executor
            .execute(&call("bump_counter", json!({ "by": -5 })), ctx.clone())
            .await;
        assert_eq!(result, json!({ "error": "counter underflow" }));
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let executor = executor();
        let ctx = ToolContext::detached(State::default());

        let result = executor
            .execute(&call("read_file", json!({})), ctx.clone())
            .await;
        assert_eq!(result["error"], json!("tool `read_file` is not available"));

        let result = executor
            .execute(&call("bump_counter", json!({ "by": "two" })), ctx.clone())
            .await;
        assert!(result["error"].is_string());
        assert!(ctx.state().values().is_empty());
    }

    #[test]
    fn test_definitions() {
        let definitions = executor().definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "bump_counter");
        assert_eq!(definitions[0].description, "Bumps the counter.");
        assert_eq!(
            definitions[0].parameters["properties"]["by"]["type"],
            json!("integer")
        );
    }
}
