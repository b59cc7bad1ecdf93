use anyhow::{Context, Result};
use chatrelay::models::conversation::Conversation;
use chatrelay::models::message::Message;
use chatrelay::providers::base::Provider;
use chatrelay::providers::relay::{RelayProvider, RELAY_URL};
use chatrelay::session::{Session, SubmitOutcome};
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod prompt;
mod renderer;

use prompt::{Input, LinePrompt};
use renderer::TerminalRenderer;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the relay server
    #[arg(long, env = "CHATRELAY_URL", default_value = RELAY_URL)]
    url: String,

    /// System prompt that opens the conversation
    #[arg(long, default_value = "You are a helpful assistant.")]
    system: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat (the default)
    Chat,

    /// Send a single prompt and print the reply
    Ask {
        prompt: String,

        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let relay = RelayProvider::new(&cli.url).context("failed to build relay client")?;
    let conversation = Conversation::new(cli.system);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(Session::new(relay, conversation)).await,
        Command::Ask { prompt, no_stream } if no_stream => {
            let mut messages = conversation.messages().to_vec();
            messages.push(Message::user(prompt));
            let reply = relay.complete(&messages).await?;
            println!("{}", reply.content);
            Ok(())
        }
        Command::Ask { prompt, .. } => {
            let mut session = Session::new(relay, conversation);
            let mut renderer = TerminalRenderer::new(std::io::stdout());
            let outcome = session.submit(&prompt, &mut renderer).await?;
            report(outcome);
            Ok(())
        }
    }
}

async fn chat(mut session: Session<RelayProvider>) -> Result<()> {
    let mut prompt = LinePrompt::new()?;
    let mut renderer = TerminalRenderer::new(std::io::stdout());

    println!("chatrelay is connected. Type /help for commands.");
    loop {
        let text = match prompt.get_input()? {
            Input::Message(text) => text,
            Input::AskAgain => continue,
            Input::Exit => break,
        };

        match session.submit(&text, &mut renderer).await {
            Ok(outcome) => report(outcome),
            Err(e) => eprintln!("{} {}", style("error:").red().bold(), e),
        }
    }

    Ok(())
}

fn report(outcome: SubmitOutcome) {
    match outcome {
        SubmitOutcome::Completed => {}
        SubmitOutcome::Incomplete => {
            eprintln!("{}", style("(reply ended without a done marker)").dim())
        }
        SubmitOutcome::NoContent => eprintln!("{}", style("(no reply from the relay)").yellow()),
        SubmitOutcome::Interrupted => {
            eprintln!("{}", style("(reply interrupted, partial text kept)").yellow())
        }
    }
}
