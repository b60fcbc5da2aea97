//! Runs the tutorial agents in the terminal.

#[macro_use]
extern crate tracing;

use std::error::Error;
use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use agent_primer::agents::{
    dad_joke_agent, email_agent, greeting_agent, question_answering_agent,
    tool_agent,
};
use agent_primer::config::ModelSettings;
use agent_primer::driver::call_agent;
use agent_primer::pizza::{
    default_order_state, format_order_state_for_display, menu::menu_text,
    order_progress, order_status_message, pizza_order_agent,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use primer_core::{LlmAgent, Runner};
use primer_session::{
    CreateRequest, DatabaseSessionService, InMemorySessionService,
    ListRequest, SessionKey, SessionService, StateMap,
};
use serde_json::Value;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio::time::sleep;

type AppResult = Result<(), Box<dyn Error>>;

const BAR_CHAR: &str = "▎";
const CHAT_USER_ID: &str = "user";

const SESSIONS_APP_NAME: &str = "Brandon Bot";
const SESSIONS_USER_ID: &str = "brandon_hancock";
const USER_PREFERENCES: &str = "\
I love inventing and building amazing things every day.
My favorite activities involve grand projects with my stepbrother Ferb, like \
building a rollercoaster or traveling to the moon.
My favorite food is whatever makes our adventures even better.
My favorite TV show is anything that sparks imagination and fun.";

const PIZZA_APP_NAME: &str = "Pizza Agent";

#[derive(Parser)]
#[command(name = "agent-primer")]
#[command(about = "Tutorial agents, from a greeter to a pizza shop")]
struct Cli {
    #[command(subcommand)]
    example: Example,
}

#[derive(Subcommand)]
enum Example {
    /// Chat with an agent that asks for your name and greets you
    Greeting,
    /// Chat with an agent that can look up the current time
    Tool,
    /// Chat with a dad joke agent running on OpenRouter
    DadJokes,
    /// Describe an email and get a subject and body back
    Email,
    /// Ask scripted questions answered from session state
    Sessions,
    /// Order a pizza, the order is kept in a SQLite database
    Pizza {
        /// User the order belongs to
        #[arg(short, long, default_value = "Phineas")]
        user_id: String,

        /// Database URL, overrides `PIZZA_DATABASE_URL`
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = ModelSettings::from_env();

    let result = match cli.example {
        Example::Greeting => match settings.gemini_provider() {
            Ok(provider) => chat(greeting_agent(provider), "greeting").await,
            Err(err) => Err(err.into()),
        },
        Example::Tool => match settings.gemini_provider() {
            Ok(provider) => chat(tool_agent(provider), "tool").await,
            Err(err) => Err(err.into()),
        },
        Example::DadJokes => match settings.openrouter_provider() {
            Ok(provider) => chat(dad_joke_agent(provider), "dad_jokes").await,
            Err(err) => Err(err.into()),
        },
        Example::Email => match settings.gemini_provider() {
            Ok(provider) => chat(email_agent(provider), "email").await,
            Err(err) => Err(err.into()),
        },
        Example::Sessions => sessions(&settings).await,
        Example::Pizza {
            user_id,
            database_url,
        } => {
            let database_url =
                database_url.as_deref().unwrap_or(settings.database_url());
            pizza(&settings, &user_id, database_url).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "❌".red());
            ExitCode::FAILURE
        }
    }
}

/// Chats with `agent` in a fresh in-memory session until `exit` or EOF.
async fn chat(agent: LlmAgent, app_name: &str) -> AppResult {
    let session_service: Arc<dyn SessionService> =
        Arc::new(InMemorySessionService::new());
    let session = session_service
        .create(CreateRequest {
            app_name: app_name.to_owned(),
            user_id: CHAT_USER_ID.to_owned(),
            ..Default::default()
        })
        .await?;
    let runner = Runner::new(agent, app_name, Arc::clone(&session_service));

    println!(
        "Chatting with {}, type 'exit' to quit.",
        runner.agent().name().bright_white().bold()
    );

    let mut input = io::BufReader::new(io::stdin());
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = read_line(&mut input).await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        let reply = with_spinner(call_agent(
            &runner,
            CHAT_USER_ID,
            session.id(),
            line,
        ))
        .await;
        match reply {
            Ok(reply) => print_reply(&reply),
            Err(err) => {
                eprintln!("{}❌ {err}", BAR_CHAR.bright_red());
                continue;
            }
        }

        // Show what the structured output agent stored.
        if let Some(key) = runner.agent().output_key() {
            let session = session_service.get(&session.key).await?;
            if let Some(value) = session.state.get(key) {
                println!(
                    "{}📦 state[{key}] = {}",
                    BAR_CHAR.bright_black(),
                    serde_json::to_string_pretty(value)?
                );
            }
        }
    }
    Ok(())
}

/// Seeds a session with the user's name and preferences and asks two
/// questions the agent can only answer from that state.
async fn sessions(settings: &ModelSettings) -> AppResult {
    let agent = question_answering_agent(settings.gemini_provider()?);
    let session_service: Arc<dyn SessionService> =
        Arc::new(InMemorySessionService::new());

    let state = StateMap::from([
        ("user_name".to_owned(), Value::from("Phineas")),
        ("user_preferences".to_owned(), Value::from(USER_PREFERENCES)),
    ]);
    let session = session_service
        .create(CreateRequest {
            app_name: SESSIONS_APP_NAME.to_owned(),
            user_id: SESSIONS_USER_ID.to_owned(),
            session_id: None,
            state,
        })
        .await?;
    println!(
        "Session created: App='{SESSIONS_APP_NAME}', \
         User='{SESSIONS_USER_ID}', Session='{}'",
        session.id()
    );

    let runner = Runner::new(agent, SESSIONS_APP_NAME, session_service);
    println!("Runner created for agent '{}'.", runner.agent().name());

    for query in [
        "What does Phineas love to do?",
        "What is Phineas favorite TV show?",
    ] {
        println!("\n >>> User query: {query}");
        let reply = with_spinner(call_agent(
            &runner,
            SESSIONS_USER_ID,
            session.id(),
            query,
        ))
        .await?;
        println!("<<< Agent Response: {reply}");
    }

    let session = runner.session_service().get(&session.key).await?;
    println!("\n==== Final Session State ====");
    for (key, value) in &session.state {
        match value {
            Value::String(value) => println!("{key}: {}", value.trim()),
            value => println!("{key}: {value}"),
        }
    }
    Ok(())
}

/// The pizza shop: resumes the user's latest order session or starts a new
/// one, then loops over user input.
async fn pizza(
    settings: &ModelSettings,
    user_id: &str,
    database_url: &str,
) -> AppResult {
    let agent = pizza_order_agent(settings.gemini_provider()?);

    let database = DatabaseSessionService::connect(database_url).await?;
    database.migrate().await?;
    let session_service: Arc<dyn SessionService> = Arc::new(database);

    let sessions = session_service
        .list(ListRequest {
            app_name: PIZZA_APP_NAME.to_owned(),
            user_id: user_id.to_owned(),
        })
        .await?;
    let key = match sessions.into_iter().next() {
        Some(session) => {
            println!("\n✅ Using existing session: {}", session.id());
            if !session.state.is_empty() {
                println!("{}", format_order_state_for_display(&session.state));
                println!("{}", order_status_message(&session.state));
            }
            session.key
        }
        None => {
            let state = default_order_state();
            let session = session_service
                .create(CreateRequest {
                    app_name: PIZZA_APP_NAME.to_owned(),
                    user_id: user_id.to_owned(),
                    session_id: None,
                    state: state.clone(),
                })
                .await?;
            println!("\n🆕 Created new session: {}", session.id());
            println!("{}", order_status_message(&state));
            session.key
        }
    };
    info!("pizza session: {key}");

    let runner =
        Runner::new(agent, PIZZA_APP_NAME, Arc::clone(&session_service));

    println!("\n🍕 Welcome to the Pizza Order Assistant!");
    println!(
        "Type 'exit' to quit, 'menu' to see the menu, or 'order' to view \
         your current order."
    );
    println!("{}", "-".repeat(50));

    let mut input = io::BufReader::new(io::stdin());
    loop {
        print!("\n🗣️  You: ");
        std::io::stdout().flush()?;

        let Some(line) = read_line(&mut input).await else {
            break;
        };
        let message = match pizza_command(&line) {
            PizzaCommand::Exit => break,
            PizzaCommand::Empty => {
                println!("Please enter a message or type 'exit' to quit.");
                continue;
            }
            PizzaCommand::Menu => {
                println!("\n{}", menu_text());
                continue;
            }
            PizzaCommand::Order => {
                print_order(session_service.as_ref(), &key).await;
                continue;
            }
            PizzaCommand::Message(message) => message,
        };

        let reply = with_spinner(call_agent(
            &runner,
            &key.user_id,
            &key.session_id,
            message,
        ))
        .await;
        match reply {
            Ok(reply) => println!("\n🤖 Pizza Assistant: {reply}"),
            Err(err) => {
                println!(
                    "\n❌ An error occurred while processing your request: \
                     {err}"
                );
                println!("Please try again or type 'exit' to quit.");
            }
        }
    }

    println!(
        "\n🍕 Thank you for using Pizza Order Assistant!\n\
         Your order has been saved and you can continue later.\n\
         Have a great day! 🍕"
    );
    Ok(())
}

/// One line of input to the pizza loop.
#[derive(Debug, PartialEq, Eq)]
enum PizzaCommand<'a> {
    Exit,
    Empty,
    Menu,
    Order,
    Message(&'a str),
}

fn pizza_command(line: &str) -> PizzaCommand<'_> {
    let line = line.trim();
    if line.is_empty() {
        PizzaCommand::Empty
    } else if line.eq_ignore_ascii_case("exit") {
        PizzaCommand::Exit
    } else if line.eq_ignore_ascii_case("menu") {
        PizzaCommand::Menu
    } else if line.eq_ignore_ascii_case("order") {
        PizzaCommand::Order
    } else {
        PizzaCommand::Message(line)
    }
}

async fn print_order(session_service: &dyn SessionService, key: &SessionKey) {
    match session_service.get(key).await {
        Ok(session) => {
            println!("{}", format_order_state_for_display(&session.state));
            println!("Progress: {}", order_progress(&session.state));
            println!("{}", order_status_message(&session.state));
        }
        Err(err) => {
            println!("\n❌ Could not load your order: {err}");
        }
    }
}

fn print_reply(reply: &str) {
    println!("{}🤖 {}", BAR_CHAR.bright_cyan(), reply.bright_white());
}

/// Awaits `fut` while a spinner ticks.
async fn with_spinner<F: Future>(fut: F) -> F::Output {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message("🤔 Thinking...");

    tokio::pin!(fut);
    loop {
        select! {
            output = &mut fut => {
                progress_bar.finish_and_clear();
                return output;
            }
            _ = sleep(Duration::from_millis(100)) => {
                progress_bar.inc(1);
            }
        }
    }
}

/// Reads one line from `input`, `None` on EOF.
///
/// `input` may buffer past the returned line, so a loop keeps one reader.
async fn read_line<R>(input: &mut R) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();

    match input.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pizza_commands_from_buffered_input() {
        let mut input: &[u8] =
            b"menu\norder\n\n  I want a pizza \nMENU\nexit\nleftover\n";
        let expected = [
            PizzaCommand::Menu,
            PizzaCommand::Order,
            PizzaCommand::Empty,
            PizzaCommand::Message("I want a pizza"),
            PizzaCommand::Menu,
            PizzaCommand::Exit,
        ];

        let mut seen = 0;
        while let Some(line) = read_line(&mut input).await {
            let command = pizza_command(&line);
            assert_eq!(command, expected[seen]);
            seen += 1;
            if command == PizzaCommand::Exit {
                break;
            }
        }
        assert_eq!(seen, expected.len());

        let leftover = read_line(&mut input).await;
        assert_eq!(leftover.as_deref(), Some("leftover\n"));
        assert_eq!(read_line(&mut input).await, None);
    }
}
