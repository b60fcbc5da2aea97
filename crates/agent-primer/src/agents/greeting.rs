use primer_core::{AgentBuilder, LlmAgent};
use primer_model::ModelProvider;

/// An agent with nothing but an instruction.
pub fn greeting_agent<P: ModelProvider + 'static>(provider: P) -> LlmAgent {
    AgentBuilder::with_model_provider(provider)
        .name("greeting_agent")
        .description("A helpful assistant for greeting user")
        .instruction(
            "You are a helpful assistant that greets the user.\n\
             Ask for the user's name and greet them by name.",
        )
        .build()
}
