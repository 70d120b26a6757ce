use anyhow::{Context, Result};
use clap::Parser;
use fusion_rag::{EngineKind, FusionMode, HybridRagEngine, RagConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fusion-rag")]
#[command(about = "Answer questions over a directory with vector, keyword or fused retrieval")]
#[command(version)]
struct Cli {
    /// Question to ask
    #[arg(default_value = "What is john smith's first job?")]
    query: String,

    /// Directory of documents to index
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fusion mode: AND (intersection) or OR (union)
    #[arg(short, long)]
    mode: Option<String>,

    /// Query engine to answer with
    #[arg(short, long, value_enum, default_value_t = EngineKind::Fusion)]
    engine: EngineKind,

    /// Run every engine and print all three answers
    #[arg(long)]
    all: bool,

    /// Query the vector and keyword retrievers concurrently
    #[arg(long)]
    concurrent: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = RagConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(dir) = cli.input_dir {
        config.input_dir = dir;
    }
    if let Some(mode) = cli.mode.as_deref() {
        config.retrieval.fusion_mode = mode.parse::<FusionMode>()?;
    }
    if cli.concurrent {
        config.retrieval.concurrent = true;
    }

    let engine = HybridRagEngine::from_config(config)
        .await
        .context("Failed to build RAG engine")?;

    let kinds = if cli.all {
        vec![EngineKind::Vector, EngineKind::Keyword, EngineKind::Fusion]
    } else {
        vec![cli.engine]
    };

    for kind in kinds {
        let response = engine.query(&cli.query, kind).await?;
        println!("[{}] {}", kind, response);
        for node in &response.source_nodes {
            println!(
                "  - {} ({:.3}) {}",
                node.id(),
                node.score,
                node.node.metadata.get("file_name").map(String::as_str).unwrap_or("")
            );
        }
    }

    Ok(())
}
