// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agenttrace command line: inspect configuration and run a local demo.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use futures::StreamExt;

use agenttrace::config::{self, resolve_config};
use agenttrace::error::ProviderError;
use agenttrace::stream::{wrap_pull_stream, ChunkFields};
use agenttrace::telemetry::{init_logging, start_llm_span, LoggingConfig};
use agenttrace::types::{
    EventCallback, Message, Provider, ProviderResponse, StopReason, StreamEvent, TokenUsage,
};
use agenttrace::{InstrumentedProvider, LogExporter, Metadata, VERSION};

/// agenttrace - span lifecycle telemetry for LLM agents.
#[derive(Parser)]
#[command(name = "agenttrace")]
#[command(author, version, about = "Span lifecycle telemetry for LLM agents", long_about = None)]
struct Cli {
    /// Config file (JSON or YAML), layered over ~/.agenttrace/config.json
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Show debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or validate configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Emit sample spans through the log exporter
    Demo {
        /// User id placed in the ambient context
        #[arg(long, default_value = "demo-user")]
        user: String,

        /// Capture prompt and completion text
        #[arg(long)]
        include_content: bool,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the resolved configuration (credential redacted)
    Show {
        #[arg(short = 'o', long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
    /// Check that the configuration resolves
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = if cli.debug {
        LoggingConfig::development()
    } else {
        LoggingConfig::default()
    };
    init_logging(&logging)?;

    match cli.command {
        Commands::Config { action } => {
            handle_config(cli.file, action.unwrap_or(ConfigAction::Show { format: OutputFormat::Json }))
        }
        Commands::Demo {
            user,
            include_content,
        } => run_demo(cli.file, &user, include_content, cli.debug).await,
        Commands::Version => {
            println!("agenttrace {}", VERSION);
            Ok(())
        }
    }
}

fn handle_config(file: Option<PathBuf>, action: ConfigAction) -> anyhow::Result<()> {
    let loaded = config::load_config(file.as_deref())?;

    let resolved = match resolve_config(loaded) {
        Ok(resolved) => resolved,
        Err(err) => {
            eprintln!("{} {}", "Invalid configuration:".red().bold(), err);
            std::process::exit(1);
        }
    };

    match action {
        ConfigAction::Show { format } => {
            let display = resolved.to_display_config();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&display)?),
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&display)?),
            }
        }
        ConfigAction::Validate => {
            println!("{} configuration is valid", "✓".green());
            println!("  apiKey:  {}", resolved.redacted_api_key().bright_white());
            println!(
                "  agentId: {}",
                resolved.agent_id.as_deref().unwrap_or("(none)").bright_white()
            );
        }
    }
    Ok(())
}

/// Canned provider so the demo runs without network access.
struct ScriptedProvider;

impl ScriptedProvider {
    fn reply(messages: &[Message]) -> String {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        format!("You said: {}", last)
    }

    fn usage(messages: &[Message], reply: &str) -> TokenUsage {
        let prompt_words: usize = messages.iter().map(|m| m.content.split_whitespace().count()).sum();
        TokenUsage::new(prompt_words as u32, reply.split_whitespace().count() as u32)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(
        &self,
        messages: &[Message],
        _system_prompt: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError> {
        let reply = Self::reply(messages);
        let usage = Self::usage(messages, &reply);
        Ok(ProviderResponse::text(reply).with_usage(usage))
    }

    async fn stream_chat(
        &self,
        messages: &[Message],
        _system_prompt: Option<&str>,
        on_event: EventCallback,
    ) -> Result<ProviderResponse, ProviderError> {
        let reply = Self::reply(messages);
        for word in reply.split_inclusive(' ') {
            tokio::time::sleep(Duration::from_millis(20)).await;
            on_event(StreamEvent::TextDelta(word.to_string()));
        }
        let usage = Self::usage(messages, &reply);
        on_event(StreamEvent::Usage(usage.clone()));
        on_event(StreamEvent::Done(StopReason::EndTurn));
        Ok(ProviderResponse::text(reply).with_usage(usage))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

async fn run_demo(
    file: Option<PathBuf>,
    user: &str,
    include_content: bool,
    debug: bool,
) -> anyhow::Result<()> {
    let mut trace_config = config::load_config(file.as_deref())?;
    if trace_config.api_key.is_none() {
        trace_config.api_key = Some("demo-key".to_string());
    }
    if trace_config.agent_id.is_none() {
        trace_config.agent_id = Some("agenttrace-demo".to_string());
    }
    let trace_config = trace_config
        .with_include_content(include_content)
        .with_debug(debug)
        .with_flush_interval_ms(500);

    let client = agenttrace::init_with_exporter(trace_config, Arc::new(LogExporter::verbose()))?;
    println!("{} agenttrace {} initialized", "→".cyan(), VERSION);

    let metadata = Metadata::new()
        .with_user_id(user)
        .with_session_id(uuid::Uuid::new_v4().to_string());

    agenttrace::with_context(metadata, demo_calls()).await?;

    if !agenttrace::flush(2_000).await {
        eprintln!("{}", "Some spans were not exported".yellow());
    }
    let report = client.metrics().snapshot().format_report();
    agenttrace::shutdown().await;

    println!("\n{}", report);
    Ok(())
}

async fn demo_calls() -> anyhow::Result<()> {
    let provider = InstrumentedProvider::new(ScriptedProvider);
    let messages = [Message::user("What is a span?")];

    let reply = provider.chat(&messages, Some("Answer briefly.")).await?;
    println!("{} {}", "chat:".bright_blue(), reply.content);

    print!("{} ", "stream_chat:".bright_blue());
    let streamed = provider
        .stream_chat(
            &messages,
            None,
            Box::new(|event: StreamEvent| {
                if let Some(text) = event.as_text() {
                    print!("{}", text);
                }
            }),
        )
        .await?;
    println!();
    tracing::debug!(chars = streamed.content.len(), "Stream finished");

    // A raw chunk stream, instrumented directly.
    let span = start_llm_span("demo.chunks", "scripted", "scripted-1");
    let chunks = futures::stream::iter(["alpha ", "beta ", "gamma"].map(Ok::<_, Infallible>));
    let mut chunks = wrap_pull_stream(span, chunks, |chunk: &&str| ChunkFields::text(*chunk));
    print!("{} ", "chunks:".bright_blue());
    while let Some(Ok(chunk)) = chunks.next().await {
        print!("{}", chunk);
    }
    println!();

    Ok(())
}
