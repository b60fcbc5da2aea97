mod builder;

use primer_model::OutputSchema;

use crate::model_client::ModelClient;
use crate::tool::Executor as ToolExecutor;
pub use builder::AgentBuilder;

/// A declarative LLM agent: who it is, what it is told, which tools it
/// may call and how its final answer is shaped.
///
/// An agent holds no conversation state. Drive it with a
/// [`crate::Runner`], which reads and writes everything through the
/// session service.
pub struct LlmAgent {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) instruction: String,
    pub(crate) model_client: ModelClient,
    pub(crate) tool_executor: ToolExecutor,
    pub(crate) output_schema: Option<OutputSchema>,
    pub(crate) output_key: Option<String>,
}

impl LlmAgent {
    /// Returns the agent name, also used as the author of its events.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the instruction template.
    #[inline]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Returns the state key the final answer is stored under.
    #[inline]
    pub fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    /// Returns the schema the final answer must follow, if any.
    #[inline]
    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.output_schema.as_ref()
    }

    /// Returns `true` if the model may call tools. Tools are turned off
    /// when the answer must follow an output schema.
    #[inline]
    pub fn tools_enabled(&self) -> bool {
        self.output_schema.is_none() && !self.tool_executor.is_empty()
    }
}
