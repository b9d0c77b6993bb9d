//! Command-line driver: extract code from a response, or replay scripted
//! provider rounds through the pipeline.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use gauge_extract::{clean_code, extract, validate_code};
use gauge_llm::adapters::{ScriptedAdapter, ScriptedRound};
use gauge_llm::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, clean and validate the code in a provider response
    Extract {
        /// Expected artifact kind (al or diff)
        #[arg(long, default_value = "al")]
        kind: CodeKind,
        /// Response file; reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// Replay a JSON script of provider rounds through the pipeline
    Replay {
        /// Script file
        script: PathBuf,
        /// Use the streaming continuation controller
        #[arg(long)]
        stream: bool,
        /// Pipeline configuration as JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// A recorded task attempt: the prompt and the provider rounds that answered it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplayScript {
    task_id: String,
    prompt: String,
    system_prompt: Option<String>,
    kind: CodeKind,
    max_tokens: Option<u64>,
    rounds: Vec<ScriptedRound>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Extract { kind, file } => run_extract(kind, file.as_deref())?,
        Commands::Replay {
            script,
            stream,
            config,
        } => run_replay(&script, stream, config.as_deref()).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_extract(kind: CodeKind, file: Option<&Path>) -> Result<Value> {
    let response = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let extraction = extract(&response, kind);
    let code = clean_code(&extraction.code, kind);
    let issues: Vec<String> = validate_code(&code, kind)
        .iter()
        .map(ToString::to_string)
        .collect();

    Ok(json!({
        "code": code,
        "language": extraction.language,
        "confidence": extraction.confidence,
        "method": extraction.method,
        "extractedFromDelimiters": extraction.extracted_from_delimiters,
        "issues": issues,
    }))
}

async fn run_replay(script_path: &Path, stream: bool, config_path: Option<&Path>) -> Result<Value> {
    let raw = std::fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read {}", script_path.display()))?;
    let script: ReplayScript = serde_json::from_str(&raw).context("Invalid replay script")?;

    let config: PipelineConfig = match config_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw).context("Invalid pipeline configuration")?
        }
        None => PipelineConfig::default(),
    };
    config.validate()?;

    let adapter: Arc<dyn GenerationAdapter> = Arc::new(ScriptedAdapter::from_rounds(script.rounds));
    let task = GenerationTask::new(script.task_id, script.kind);
    let mut template = Request::default();
    if let Some(max_tokens) = script.max_tokens {
        template = template.with_max_tokens(max_tokens);
    }

    if stream {
        let mut request = template.with_prompt(script.prompt);
        request.system_prompt = script.system_prompt;

        let context = GenerationContext::new(task.task_id, 1).with_expected_kind(task.expected_kind);
        let mut chunks =
            stream_with_continuation(adapter, request, context, &config, StreamOptions::new());
        while let Some(chunk) = chunks.next().await {
            tracing::debug!(index = chunk.index, done = chunk.done, chars = chunk.text.len(), "chunk");
        }
        let streamed = chunks.finish().await?;

        let extraction = extract(streamed.result.content(), script.kind);
        let code = clean_code(&extraction.code, script.kind);
        let warning = create_truncation_warning(
            streamed.result.continuation_count,
            streamed.result.was_truncated,
        );

        return Ok(json!({
            "roundError": streamed.result.round_error.as_ref().map(ToString::to_string),
            "result": streamed,
            "extractedCode": code,
            "extraction": extraction,
            "warning": warning,
        }));
    }

    let generator = Generator::new(adapter)
        .with_config(config)
        .with_request_defaults(template);
    let generation = generator
        .call_and_extract_code(
            &task,
            None,
            1,
            &[],
            &script.prompt,
            script.system_prompt.as_deref(),
        )
        .await?;
    let warning = create_truncation_warning(
        generation.raw_result.continuation_count,
        generation.raw_result.was_truncated,
    );

    Ok(json!({
        "roundError": generation.raw_result.round_error.as_ref().map(ToString::to_string),
        "generation": generation,
        "warning": warning,
    }))
}
