//! The tutorial agents, one per step.

mod dad_joke;
mod email;
mod greeting;
mod question_answering;
mod time;

pub use dad_joke::{DadJoke, DadJokeTool, dad_joke_agent, generate_dad_jokes};
pub use email::{EMAIL_OUTPUT_KEY, EmailContent, email_agent};
pub use greeting::greeting_agent;
pub use question_answering::question_answering_agent;
pub use time::{CurrentTimeTool, tool_agent};
