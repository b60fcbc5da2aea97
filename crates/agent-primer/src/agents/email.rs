use primer_core::{AgentBuilder, LlmAgent};
use primer_model::ModelProvider;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// State key the generated email is stored under.
pub const EMAIL_OUTPUT_KEY: &str = "email";

/// A generated email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EmailContent {
    /// The subject line of the email. Should be concise and descriptive.
    pub subject: String,
    /// The main content of the email. Should be well-formatted with proper
    /// greeting, paragraphs and signature.
    pub body: String,
}

const INSTRUCTION: &str = include_str!("./email_instruction.md");

/// An agent whose answer is an [`EmailContent`] JSON object, also stored
/// in session state under [`EMAIL_OUTPUT_KEY`].
pub fn email_agent<P: ModelProvider + 'static>(provider: P) -> LlmAgent {
    AgentBuilder::with_model_provider(provider)
        .name("email_agent")
        .description(
            "Generates a professional emails with structured subject and body",
        )
        .instruction(INSTRUCTION)
        .output_schema::<EmailContent>("email_content")
        .output_key(EMAIL_OUTPUT_KEY)
        .build()
}
