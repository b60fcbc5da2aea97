use chrono::Local;
use primer_core::tool::{
    NoArguments, Tool, ToolContext, ToolResult, parameter_schema,
};
use primer_core::{AgentBuilder, LlmAgent};
use primer_model::ModelProvider;
use serde_json::{Value, json};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reports the local time.
pub struct CurrentTimeTool {
    parameter_schema: Value,
}

impl CurrentTimeTool {
    #[inline]
    pub fn new() -> Self {
        CurrentTimeTool {
            parameter_schema: parameter_schema::<NoArguments>(),
        }
    }
}

impl Default for CurrentTimeTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CurrentTimeTool {
    type Input = NoArguments;

    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current time in the format YYYY-MM-DD HH:MM:SS"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _input: NoArguments,
        _ctx: ToolContext,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            let now = Local::now().format(TIME_FORMAT).to_string();
            Ok(json!({ "current_time": now }))
        }
    }
}

/// An agent that can look up the current time.
pub fn tool_agent<P: ModelProvider + 'static>(provider: P) -> LlmAgent {
    AgentBuilder::with_model_provider(provider)
        .name("tool_agent")
        .description("Tool agent")
        .instruction(
            "You are a helpful assistant that can use the following tools:\n\
             - get current time",
        )
        .with_tool(CurrentTimeTool::new())
        .build()
}
