use primer_core::tool::{
    NoArguments, Tool, ToolContext, ToolResult, parameter_schema,
};
use primer_core::{AgentBuilder, LlmAgent};
use primer_model::ModelProvider;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;

struct JokeTemplate {
    setup: &'static str,
    punchlines: [&'static str; 3],
}

const JOKES: &[JokeTemplate] = &[
    JokeTemplate {
        setup: "Why don't scientists trust atoms?",
        punchlines: [
            "Because they make up everything!",
            "They're just too shifty.",
            "You can't see them anyway.",
        ],
    },
    JokeTemplate {
        setup: "I told my wife she was drawing her eyebrows too high.",
        punchlines: [
            "She looked surprised.",
            "She said she was aiming for the stars.",
            "I guess I'll have to deal with it.",
        ],
    },
    JokeTemplate {
        setup: "What do you call a fish with no eyes?",
        punchlines: [
            "Fsh!",
            "Blind fish, obviously.",
            "A very confused swimmer.",
        ],
    },
    JokeTemplate {
        setup: "How do you organize a space party?",
        punchlines: [
            "You planet!",
            "With a lot of enthusiasm.",
            "Very carefully, so nothing floats away.",
        ],
    },
    JokeTemplate {
        setup: "My dad always said, 'Before you criticize someone, walk a \
                mile in their shoes.'",
        punchlines: [
            "That way, when you criticize them, you're a mile away and you \
             have their shoes.",
            "It makes you appreciate their journey.",
            "And then you realize how uncomfortable their shoes are.",
        ],
    },
];

/// A joke with one of its punchlines picked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DadJoke {
    pub setup: &'static str,
    pub punchline: &'static str,
}

/// Tells every joke once, each with a randomly picked punchline.
pub fn generate_dad_jokes<R: Rng + ?Sized>(rng: &mut R) -> Vec<DadJoke> {
    JOKES
        .iter()
        .map(|joke| DadJoke {
            setup: joke.setup,
            punchline: joke.punchlines.choose(rng).copied().unwrap_or_default(),
        })
        .collect()
}

pub struct DadJokeTool {
    parameter_schema: Value,
}

impl DadJokeTool {
    #[inline]
    pub fn new() -> Self {
        DadJokeTool {
            parameter_schema: parameter_schema::<NoArguments>(),
        }
    }
}

impl Default for DadJokeTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for DadJokeTool {
    type Input = NoArguments;

    fn name(&self) -> &str {
        "dad_joke_generator"
    }

    fn description(&self) -> &str {
        "Generates a list of 5 dad jokes with randomly selected punchlines. \
         Each joke has a `setup` and a `punchline`."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        _input: NoArguments,
        _ctx: ToolContext,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        // `ThreadRng` isn't `Send`, so pick before the future is built.
        let jokes = generate_dad_jokes(&mut rand::thread_rng());
        std::future::ready(Ok(serde_json::to_value(jokes).unwrap_or_default()))
    }
}

/// An agent that tells dad jokes, meant to run on OpenRouter.
pub fn dad_joke_agent<P: ModelProvider + 'static>(provider: P) -> LlmAgent {
    AgentBuilder::with_model_provider(provider)
        .name("dad_joke_agent")
        .description("Dad Joke Agent")
        .instruction(
            "You are a helpful assistant that can tell dad jokes, only use \
             the following tools to generate dad jokes\n\
             - dad_joke_generator",
        )
        .with_tool(DadJokeTool::new())
        .build()
}
