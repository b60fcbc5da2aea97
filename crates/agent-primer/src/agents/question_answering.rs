use primer_core::{AgentBuilder, LlmAgent};
use primer_model::ModelProvider;

/// An agent that answers questions about the user from session state.
///
/// The instruction reads `user_name` and `user_preferences`, a session
/// without them fails the run.
pub fn question_answering_agent<P>(provider: P) -> LlmAgent
where
    P: ModelProvider + 'static,
{
    AgentBuilder::with_model_provider(provider)
        .name("question_answering_agent")
        .description("Question answering agent")
        .instruction(
            "You are a helpful assistant that answers questions about the \
             user's preferences.\n\
             \n\
             Here is some information about the user:\n\
             Name: {user_name}\n\
             Preferences:\n\
             {user_preferences}",
        )
        .build()
}
