//! FAQ chatbot binary
//!
//! Run with: cargo run -p faq-rag -- [chat|ask|health|evaluate]

use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faq_rag::config::{prompt_for_api_key, GenerationBackend};
use faq_rag::repl::{ConsoleInput, TurnCommand, EMPTY_INPUT_WARNING};
use faq_rag::{setup, ChatConfig, ChatEngine, ChatMode, EvaluationReport, TurnLoop};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured mode (rag or chat)
    #[arg(short, long, global = true)]
    mode: Option<ChatMode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive console chat (default)
    Chat,
    /// Answer a single question and exit
    Ask {
        question: String,
        /// Print the full turn outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check connectivity to the configured backends
    Health,
    /// Score a generated answer against a reference answer
    Evaluate {
        #[arg(long)]
        reference: String,
        #[arg(long)]
        prediction: String,
    },
}

fn ok(message: impl std::fmt::Display) {
    println!("{} {}", style("✓").green(), message);
}

fn fail(message: impl std::fmt::Display) {
    println!("{} {}", style("✗").red(), message);
}

/// Load configuration and construct every client; any failure ends the session
fn build_engine(path: Option<&Path>, mode: Option<ChatMode>) -> faq_rag::Result<(ChatEngine, ChatConfig)> {
    let mut config = ChatConfig::load(path)?;
    if let Some(mode) = mode {
        config.mode = mode;
    }
    ok(format!("Configuration loaded ({:?} mode)", config.mode));

    if config.generation.backend == GenerationBackend::Gemini {
        let key = config.resolve_api_key(prompt_for_api_key)?;
        config.generation.api_key = Some(key);
        ok("Gemini API key configured");
    }

    let clients = setup::build_clients(&config)?;
    ok(format!("Generation model ready: {}", config.generation.model));
    if clients.warehouse.is_some() {
        ok(format!(
            "BigQuery client ready: {}",
            config.warehouse.embedded_table_id()?
        ));
    }

    let engine = ChatEngine::new(&config, clients.llm, clients.warehouse)?;
    Ok((engine, config))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let Cli {
        config,
        mode,
        command,
    } = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faq_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = command.unwrap_or(Commands::Chat);

    if let Commands::Evaluate {
        reference,
        prediction,
    } = &command
    {
        let report = EvaluationReport::compute(reference, prediction);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (mut engine, config) = match build_engine(config.as_deref(), mode) {
        Ok(built) => built,
        Err(e) => {
            fail(&e);
            tracing::error!("Setup failed: {}", e);
            std::process::exit(1);
        }
    };

    match command {
        Commands::Chat => {
            println!(
                r#"
╔═══════════════════════════════════════════════════════════╗
║                       FAQ Assistant                       ║
║         Type your question, or 'exit' to quit             ║
╚═══════════════════════════════════════════════════════════╝
"#
            );

            let input = ConsoleInput::stdin()?;
            let mut output = std::io::stdout();
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Could not listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            TurnLoop::new(&mut engine, config.conversation.bot_label.clone())
                .run(input, &mut output, shutdown)
                .await?;
        }
        Commands::Ask { question, json } => {
            if TurnCommand::parse(&question) == TurnCommand::Empty {
                fail(EMPTY_INPUT_WARNING);
                std::process::exit(2);
            }
            let outcome = engine.respond(&question).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}: {}", config.conversation.bot_label, outcome.response);
            }
        }
        Commands::Health => {
            let report = engine.health_check().await;
            for component in &report.components {
                match (&component.detail, component.healthy) {
                    (_, true) => ok(&component.name),
                    (Some(detail), false) => fail(format!("{}: {}", component.name, detail)),
                    (None, false) => fail(&component.name),
                }
            }
            if !report.overall_healthy {
                std::process::exit(1);
            }
        }
        Commands::Evaluate { .. } => {}
    }

    Ok(())
}
