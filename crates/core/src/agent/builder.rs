use primer_model::{ModelProvider, OutputSchema};
use schemars::JsonSchema;

use super::LlmAgent;
use crate::model_client::{ModelClient, RetryPolicy};
use crate::tool::{AnyTool, Executor, Tool, ToolObject, parameter_schema};

/// [`LlmAgent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    name: String,
    description: String,
    instruction: String,
    tools: Vec<Box<dyn ToolObject>>,
    output_schema: Option<OutputSchema>,
    output_key: Option<String>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            name: "agent".to_owned(),
            description: String::new(),
            instruction: String::new(),
            tools: vec![],
            output_schema: None,
            output_key: None,
        }
    }

    /// Sets the agent name.
    #[inline]
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets a short description of what the agent does.
    #[inline]
    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the instruction template. `{key}` placeholders are filled from
    /// session state on every model call.
    #[inline]
    pub fn instruction<S: Into<String>>(mut self, instruction: S) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Box::new(AnyTool(tool)));
        self
    }

    /// Requires the final answer to be JSON matching the schema of `T`.
    ///
    /// Registered tools are not offered to the model while an output
    /// schema is set.
    #[inline]
    pub fn output_schema<T: JsonSchema>(mut self, name: &str) -> Self {
        self.output_schema = Some(OutputSchema {
            name: name.to_owned(),
            schema: parameter_schema::<T>(),
        });
        self
    }

    /// Stores the final answer in session state under `key`.
    #[inline]
    pub fn output_key<S: Into<String>>(mut self, key: S) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Overrides how transient model errors are retried.
    #[inline]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.model_client.set_retry_policy(policy);
        self
    }

    /// Builds the agent.
    pub fn build(self) -> LlmAgent {
        if self.output_schema.is_some() && !self.tools.is_empty() {
            warn!(
                "agent `{}` has an output schema, its tools will not be offered",
                self.name
            );
        }
        LlmAgent {
            name: self.name,
            description: self.description,
            instruction: self.instruction,
            model_client: self.model_client,
            tool_executor: Executor::with_tools(self.tools),
            output_schema: self.output_schema,
            output_key: self.output_key,
        }
    }
}
