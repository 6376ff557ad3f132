//! Terminal chat front end
//!
//! Run with: cargo run -p oci-rag-chat --bin rag-chat -- --help

use anyhow::{bail, Context};
use clap::Parser;
use console::style;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oci_rag_chat::generation::{PromptBuilder, PromptLanguage};
use oci_rag_chat::providers::oci::{ApiKeySigner, NoAuth, RequestSigner};
use oci_rag_chat::{
    ChatModel, ChatSession, ChatSettings, ConnectionConfig, GenerationConfig, OciAuthConfig,
    RagChat, RetrievalConfig,
};

#[derive(Debug, Parser)]
#[command(name = "rag-chat", version, about = "Chat with OCI Generative AI, grounded by Oracle Database vector search")]
struct Args {
    /// TOML file with [generation] and [retrieval] tables
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Answer without vector search grounding
    #[arg(long)]
    no_vector_search: bool,

    /// Passages to retrieve (1-20)
    #[arg(long)]
    fetch_k: Option<usize>,

    /// Chat model
    #[arg(long, value_parser = parse_model)]
    model: Option<ChatModel>,

    /// Wait for the full answer instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Maximum generated tokens (10-1024)
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature (0.0-1.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Top-k sampling, 0 disables (0-500)
    #[arg(long)]
    top_k: Option<u32>,

    /// Nucleus sampling (0.0-0.99)
    #[arg(long)]
    top_p: Option<f32>,

    /// Frequency penalty (0.0-1.0)
    #[arg(long)]
    frequency_penalty: Option<f32>,

    /// Presence penalty (0.0-1.0)
    #[arg(long)]
    presence_penalty: Option<f32>,

    /// Prompt template language: en or ja
    #[arg(long, value_parser = parse_language)]
    prompt_language: Option<PromptLanguage>,

    /// Send requests unsigned (for an authenticating gateway)
    #[arg(long)]
    unsigned: bool,
}

fn parse_model(s: &str) -> Result<ChatModel, String> {
    s.parse().map_err(|e: oci_rag_chat::Error| e.to_string())
}

fn parse_language(s: &str) -> Result<PromptLanguage, String> {
    s.parse().map_err(|e: oci_rag_chat::Error| e.to_string())
}

impl Args {
    fn settings(&self) -> anyhow::Result<ChatSettings> {
        let mut settings = match &self.settings {
            Some(path) => ChatSettings::from_file(path)?,
            None => ChatSettings::default(),
        };

        let g = &mut settings.generation;
        if let Some(model) = self.model {
            g.model = model;
        }
        if self.no_stream {
            g.streaming = false;
        }
        if let Some(v) = self.max_tokens {
            g.max_tokens = v;
        }
        if let Some(v) = self.temperature {
            g.temperature = v;
        }
        if let Some(v) = self.top_k {
            g.top_k = v;
        }
        if let Some(v) = self.top_p {
            g.top_p = v;
        }
        if let Some(v) = self.frequency_penalty {
            g.frequency_penalty = v;
        }
        if let Some(v) = self.presence_penalty {
            g.presence_penalty = v;
        }

        if let Some(language) = self.prompt_language {
            settings.prompt_language = language;
        }

        let r = &mut settings.retrieval;
        if self.no_vector_search {
            r.enabled = false;
        }
        if let Some(k) = self.fetch_k {
            r.fetch_k = k;
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oci_rag_chat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let settings = args.settings()?;
    let connection = ConnectionConfig::from_env()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Chat model: {}", settings.generation.model);
    tracing::info!("  - Streaming: {}", settings.generation.streaming);
    tracing::info!("  - Vector search: {} (k={})", settings.retrieval.enabled, settings.retrieval.fetch_k);
    tracing::info!("  - Prompt language: {}", settings.prompt_language);
    tracing::info!("  - Table: {}", connection.table_name);

    let signer: Arc<dyn RequestSigner> = if args.unsigned {
        Arc::new(NoAuth)
    } else {
        let auth = OciAuthConfig::from_env();
        Arc::new(ApiKeySigner::from_config(&auth).with_context(|| {
            format!("Loading OCI credentials from {}", auth.config_file.display())
        })?)
    };

    let mut chat = RagChat::connect(
        &connection,
        signer,
        settings.generation.clone(),
        settings.retrieval.clone(),
    )
    .await
    .context("Failed to start chat")?
    .with_prompts(PromptBuilder::for_language(settings.prompt_language)?);

    println!("{}", style("Chatbot demo").bold());
    println!("RAG chat over OCI Generative AI and Oracle Database 23ai.");
    println!("Commands: /history, /save <path>, /set <key> <value>, /quit\n");

    let mut session = ChatSession::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", style("you>").cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            match run_command(command, &mut chat, &session) {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => eprintln!("{} {:#}", style("error:").red(), e),
            }
            continue;
        }

        let streaming = chat.generation().streaming;
        let use_retrieval = chat.retrieval().enabled;

        print!("{} ", style("assistant>").green().bold());
        std::io::stdout().flush()?;
        let result = chat
            .converse(&mut session, line, streaming, use_retrieval, |fragment| {
                print!("{}", fragment);
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();

        if let Err(e) = result {
            eprintln!("{} {}", style("error:").red(), e);
        }
    }

    Ok(())
}

/// Returns true when the loop should exit
fn run_command(command: &str, chat: &mut RagChat, session: &ChatSession) -> anyhow::Result<bool> {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("quit") | Some("exit") => return Ok(true),
        Some("history") => {
            for turn in session.turns() {
                println!("{}: {}", style(turn.role.as_str()).dim(), turn.content);
            }
        }
        Some("save") => {
            let path = parts.next().context("usage: /save <path>")?;
            session.save(path)?;
            println!("Saved {} turns to {}", session.len(), path);
        }
        Some("set") => {
            let key = parts.next().context("usage: /set <key> <value>")?;
            let value = parts.next().context("usage: /set <key> <value>")?;
            let mut generation = chat.generation().clone();
            let mut retrieval = chat.retrieval().clone();
            apply_setting(&mut generation, &mut retrieval, key, value)?;
            chat.set_generation(generation)?;
            chat.set_retrieval(retrieval)?;
            println!("{} = {}", key, value);
        }
        Some(other) => bail!("unknown command /{}", other),
        None => bail!("empty command"),
    }
    Ok(false)
}

fn apply_setting(
    generation: &mut GenerationConfig,
    retrieval: &mut RetrievalConfig,
    key: &str,
    value: &str,
) -> anyhow::Result<()> {
    let invalid = || format!("invalid value for {}: {}", key, value);
    match key {
        "model" => generation.model = value.parse()?,
        "stream" => generation.streaming = value.parse().with_context(invalid)?,
        "max_tokens" => generation.max_tokens = value.parse().with_context(invalid)?,
        "temperature" => generation.temperature = value.parse().with_context(invalid)?,
        "top_k" => generation.top_k = value.parse().with_context(invalid)?,
        "top_p" => generation.top_p = value.parse().with_context(invalid)?,
        "frequency_penalty" => generation.frequency_penalty = value.parse().with_context(invalid)?,
        "presence_penalty" => generation.presence_penalty = value.parse().with_context(invalid)?,
        "vector_search" => retrieval.enabled = value.parse().with_context(invalid)?,
        "fetch_k" => retrieval.fetch_k = value.parse().with_context(invalid)?,
        _ => bail!("unknown setting {}", key),
    }
    Ok(())
}
