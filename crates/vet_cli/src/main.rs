use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use vet_ai::classify::EmergencyClassifier;
use vet_ai::embeddings::ollama_embed::OllamaEmbedder;
use vet_ai::index::KnowledgeIndex;
use vet_ai::llm::ollama_llm::OllamaLlm;
use vet_ai::ollama::OllamaClient;
use vet_ai::session::{ChatOutput, ChatSession, SessionConfig};
use vet_core::error::AppError;
use vet_core::knowledge::load_dataset;

mod eval;

#[derive(Debug, Parser)]
#[command(name = "vet", about = "Local retrieval-augmented pet-health assistant")]
struct Cli {
    /// Path to the knowledge dataset (JSON array of Q&A records).
    #[arg(long, default_value = "fixtures/vet_qa_sample.json")]
    dataset: PathBuf,

    /// Directory holding the persisted embedding index.
    #[arg(long, default_value = ".vet_index")]
    index_dir: PathBuf,

    /// Base URL of the local Ollama instance.
    #[arg(long, default_value = "http://127.0.0.1:11434")]
    base_url: String,

    /// Optional JSON file overriding the session configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the emergency similarity threshold.
    #[arg(long)]
    emergency_threshold: Option<f32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat loop on stdin.
    Chat,
    /// Answer a single question and exit.
    Ask {
        question: String,
        /// Print the full structured output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Populate (or refresh) the embedding index and report what happened.
    BuildIndex,
    /// Run the built-in evaluation cases and print the aggregate report.
    Eval,
}

fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new("CLI_TIME_FAILED", "Failed to format current time")
            .with_details(e.to_string())
    })
}

fn load_session_config(cli: &Cli) -> Result<SessionConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| {
                AppError::new("CLI_CONFIG_FAILED", "Failed to read session config file")
                    .with_details(format!("path={}; err={}", path.display(), e))
            })?;
            serde_json::from_str(&text).map_err(|e| {
                AppError::new("CLI_CONFIG_FAILED", "Failed to decode session config file")
                    .with_details(format!("path={}; err={}", path.display(), e))
            })?
        }
        None => SessionConfig::default(),
    };
    if let Some(threshold) = cli.emergency_threshold {
        config.classifier.similarity_threshold = threshold;
    }
    Ok(config)
}

/// Construct the whole pipeline explicitly: dataset, client, index, classifier,
/// session. Everything is released when the session goes out of scope.
fn build_session(cli: &Cli) -> Result<ChatSession, AppError> {
    let config = load_session_config(cli)?;
    let entries = load_dataset(&cli.dataset)?;

    let client = OllamaClient::new(&cli.base_url)?;
    client.health_check()?;
    let embedder = OllamaEmbedder::new(client.clone());
    let llm = OllamaLlm::new(client);

    let index = KnowledgeIndex::open(cli.index_dir.clone());
    let report = index.ensure_populated(
        &entries,
        &embedder,
        &config.embedding_model,
        &now_rfc3339_utc()?,
    )?;
    if report.populated {
        info!("index refreshed: {} documents embedded", report.embedded);
    } else {
        info!("index up to date: {} documents", report.status.doc_count);
    }

    let classifier =
        EmergencyClassifier::new(config.classifier.clone(), &embedder, &config.embedding_model)?;

    Ok(ChatSession::new(
        index,
        classifier,
        Box::new(embedder),
        Box::new(llm),
        config,
    ))
}

fn print_output(output: &ChatOutput) {
    println!("{}", "=".repeat(60));
    if output.is_emergency {
        println!("!! EMERGENCY SITUATION DETECTED !!");
        println!("Please contact your veterinarian immediately.");
        println!("{}", "=".repeat(60));
    }
    println!("\nAnswer:\n{}", output.answer);
    if !output.sources.is_empty() {
        println!("\nSources used:");
        for (i, source) in output.sources.iter().enumerate() {
            println!(
                "  {}. {} [{} / {}]",
                i + 1,
                source.question,
                source.urgency,
                source.species
            );
        }
    }
    println!("{}\n", "=".repeat(60));
}

fn run_chat_loop<R: BufRead>(session: &ChatSession, mut input: R) -> Result<(), AppError> {
    println!("Ask a pet-health question (\"exit\" to quit).");
    loop {
        print!("? ");
        io::stdout().flush().ok();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::new("CLI_INPUT_FAILED", "Failed to read input")
                    .with_details(e.to_string()))
            }
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        // One failed question must not end the conversation.
        match session.chat(question) {
            Ok(output) => print_output(&output),
            Err(e) => {
                eprintln!("error: {e}");
                if let Some(details) = &e.details {
                    eprintln!("  {details}");
                }
            }
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    match &cli.command {
        Command::Chat => {
            let session = build_session(&cli)?;
            run_chat_loop(&session, io::stdin().lock())
        }
        Command::Ask { question, json } => {
            let session = build_session(&cli)?;
            let output = session.chat(question)?;
            if *json {
                let text = serde_json::to_string_pretty(&output).map_err(|e| {
                    AppError::new("CLI_OUTPUT_FAILED", "Failed to encode chat output")
                        .with_details(e.to_string())
                })?;
                println!("{text}");
            } else {
                print_output(&output);
            }
            Ok(())
        }
        Command::BuildIndex => {
            let config = load_session_config(&cli)?;
            let entries = load_dataset(&cli.dataset)?;
            let client = OllamaClient::new(&cli.base_url)?;
            client.health_check()?;
            let embedder = OllamaEmbedder::new(client);
            let index = KnowledgeIndex::open(cli.index_dir.clone());
            let report = index.ensure_populated(
                &entries,
                &embedder,
                &config.embedding_model,
                &now_rfc3339_utc()?,
            )?;
            println!(
                "index ready: {} documents ({} embedded this run, model={})",
                report.status.doc_count,
                report.embedded,
                report.status.model.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        Command::Eval => {
            let session = build_session(&cli)?;
            let report = eval::run_eval(&session)?;
            eval::print_report(&report);
            Ok(())
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        if let Some(details) = &e.details {
            eprintln!("  {details}");
        }
        std::process::exit(1);
    }
}
