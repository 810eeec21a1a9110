mod logging;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use chat_client::{ChatCoordinator, ExchangeOutcome, HttpTransport, TransportRegistry};
use chat_core::{ChatMessage, Config};
use chat_state::ChatState;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(about = "Command-line client for the retrieval-augmented chat API")]
#[command(version)]
struct Cli {
    /// Base URL of the chat API
    #[arg(long)]
    api_base: Option<String>,

    /// Model requested from the server
    #[arg(long)]
    model: Option<String>,

    /// Registered transport used for requests
    #[arg(long, default_value = "http")]
    transport: String,

    #[arg(long)]
    max_retries: Option<u32>,

    /// Stay in the error state after a failure instead of retrying
    #[arg(long)]
    no_auto_retry: bool,

    /// Re-send the request automatically while retries are left
    #[arg(long)]
    auto_resend: bool,

    /// Enable debug mode
    #[arg(long, short)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat
    Chat,
    /// Send a single message and print the full answer
    Send {
        /// Message content
        message: String,
    },
    /// Send a single message and stream the answer
    Stream {
        /// Message content
        message: String,
    },
    /// Print the effective configuration
    Config,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(api_base) = &self.api_base {
            config.api_base = api_base.clone();
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if self.no_auto_retry {
            config.auto_retry = false;
        }
        if self.auto_resend {
            config.auto_resend = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug);

    let mut config = Config::new();
    cli.apply_overrides(&mut config);
    log::debug!("API base: {}", config.api_base);

    if let Commands::Config = cli.command {
        return print_config(&config);
    }

    let registry = TransportRegistry::new();
    registry.register(HttpTransport::new(&config)?)?;
    let transport = registry.require(&cli.transport)?;

    let coordinator = Arc::new(ChatCoordinator::from_config(transport, &config)?);
    let _unsubscribe = coordinator.subscribe(|change| {
        log::debug!("State {} -> {} ({:?})", change.from, change.to, change.cause);
    });
    coordinator.on_content(|content| {
        print!("{}", content.green());
        let _ = io::stdout().flush();
    });
    spawn_interrupt_handler(Arc::clone(&coordinator));

    match cli.command {
        Commands::Chat => run_interactive_chat(&coordinator).await,
        Commands::Send { message } => run_exchange(&coordinator, &message, false).await,
        Commands::Stream { message } => run_exchange(&coordinator, &message, true).await,
        Commands::Config => Ok(()),
    }
}

fn print_config(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("********".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

/// Ctrl-C cancels the running exchange instead of killing the process.
fn spawn_interrupt_handler(coordinator: Arc<ChatCoordinator>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !coordinator.loading() {
                eprintln!("\n{}", "Nothing to cancel (type /quit to exit)".dimmed());
                continue;
            }
            match coordinator.cancel().await {
                Ok(true) => eprintln!("\n{}", "⏹ Cancelling...".yellow()),
                Ok(false) => eprintln!("\n{}", "Cancel was not accepted".yellow()),
                Err(err) => log::error!("Failed to cancel: {}", err),
            }
        }
    });
}

async fn run_exchange(
    coordinator: &ChatCoordinator,
    message: &str,
    stream: bool,
) -> anyhow::Result<()> {
    println!("{}", format!("🚀 Sending message: {}", message).cyan());

    let start = Instant::now();
    let outcome = if stream {
        coordinator.stream_send_message(message).await?
    } else {
        coordinator.send_message(message).await?
    };
    if stream {
        println!();
    }
    log::debug!("Exchange took {:?}", start.elapsed());

    report(coordinator, &outcome, stream);
    Ok(())
}

fn report(coordinator: &ChatCoordinator, outcome: &ExchangeOutcome, streamed: bool) {
    match outcome {
        ExchangeOutcome::Completed => {
            let answer = last_answer(coordinator);
            if let Some(answer) = &answer {
                if !streamed {
                    println!("{}", answer.content.green());
                }
                print_citations(answer);
            }
            println!("{}", "✅ Done".green());
        }
        ExchangeOutcome::Failed(message) => {
            eprintln!("{}", format!("❌ {}", message).red());
            let context = coordinator.retry_context();
            if matches!(coordinator.state(), ChatState::Error | ChatState::Retrying) {
                eprintln!(
                    "{}",
                    format!(
                        "   retries used {}/{}; /retry to try again, /reset to start over",
                        context.retry_count, context.max_retries
                    )
                    .dimmed()
                );
            }
        }
        ExchangeOutcome::Cancelled => println!("{}", "⏹ Cancelled".yellow()),
        ExchangeOutcome::Rejected => println!(
            "{}",
            format!("⚠️  Busy ({}); message not sent", coordinator.state()).yellow()
        ),
    }
}

fn last_answer(coordinator: &ChatCoordinator) -> Option<ChatMessage> {
    coordinator.messages().pop()
}

fn print_citations(message: &ChatMessage) {
    if message.citations.is_empty() {
        return;
    }
    println!("{}", "📚 Sources:".cyan());
    for (index, citation) in message.citations.iter().enumerate() {
        let title = citation
            .title
            .as_deref()
            .or(citation.id.as_deref())
            .unwrap_or("untitled");
        match &citation.url {
            Some(url) => println!("  [{}] {} ({})", index + 1, title, url.dimmed()),
            None => println!("  [{}] {}", index + 1, title),
        }
    }
}

fn print_state(coordinator: &ChatCoordinator) {
    let state = coordinator.state();
    let context = coordinator.retry_context();
    let events: Vec<&str> = coordinator
        .available_events()
        .iter()
        .map(|event| event.as_str())
        .collect();

    println!("{} {} ({})", "State:".bold(), state, state.description());
    println!(
        "{} {}/{}",
        "Retries:".bold(),
        context.retry_count,
        context.max_retries
    );
    if let Some(error) = &context.error {
        println!("{} {}", "Last error:".bold(), error.red());
    }
    println!("{} {}", "Accepts:".bold(), events.join(", "));
}

async fn retry_last(coordinator: &ChatCoordinator) -> anyhow::Result<()> {
    if coordinator.has_error() && !coordinator.retry().await? {
        eprintln!("{}", "Retry limit reached; /reset to start over".yellow());
        return Ok(());
    }

    let outcome = coordinator.resend().await?;
    println!();
    report(coordinator, &outcome, true);
    Ok(())
}

async fn run_interactive_chat(coordinator: &ChatCoordinator) -> anyhow::Result<()> {
    println!(
        "{}",
        "Interactive chat. Commands: /retry, /reset, /state, /quit".cyan()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".bold());
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/state" => print_state(coordinator),
            "/reset" => {
                coordinator.reset().await?;
                println!("{}", "State reset".dimmed());
            }
            "/retry" => retry_last(coordinator).await?,
            message => run_exchange(coordinator, message, true).await?,
        }
    }

    println!("{}", "Bye".dimmed());
    Ok(())
}
