use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use regsearch_agent::{Answerer, Outcome};
use regsearch_core::config::{AnswerMode, Config, Settings};
use regsearch_core::data_processor::DataProcessor;
use regsearch_hybrid::{result_to_string, RetrievalEngine};
use regsearch_vector::{CacheConfig, EmbeddingCache};

#[derive(Parser, Debug)]
#[command(name = "regsearch", version, about = "Question answering over hierarchical regulation documents")]
struct Cli {
    /// Directory holding config.toml; relative paths in it resolve against this directory
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Use the deterministic fake embedder and cross-encoder
    #[arg(long)]
    fake_models: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question with the configured language model
    Ask {
        question: String,
        /// llm-only, search or agentic (defaults to llm.mode)
        #[arg(long)]
        mode: Option<AnswerMode>,
        /// Print every message exchanged with the model
        #[arg(long)]
        transcript: bool,
    },
    /// Regulation search with breadcrumbs and scores
    Search { query: String },
    /// Keyword lookup over definitions
    Definitions { query: String },
    /// Build or refresh the embedding cache
    Index,
    /// Print the section outline of a document, or list documents
    Tree { title: Option<String> },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load_from(&cli.config_dir).map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings = config.settings()?;
    if cli.fake_models { settings.models.use_fake = true; }

    match cli.command {
        Command::Ask { question, mode, transcript } => ask(&settings, &question, mode.unwrap_or(settings.llm.mode), transcript),
        Command::Search { query } => search(&settings, &query),
        Command::Definitions { query } => definitions(&settings, &query),
        Command::Index => index(&settings),
        Command::Tree { title } => tree(&settings, title.as_deref()),
    }
}

fn ask(settings: &Settings, question: &str, mode: AnswerMode, show_transcript: bool) -> anyhow::Result<()> {
    info!(?mode, "answering");
    let answerer = match mode {
        AnswerMode::LlmOnly => Answerer::new(Arc::new(regsearch_agent::OpenAiChat::from_settings(&settings.llm)?)),
        AnswerMode::Search | AnswerMode::Agentic => {
            let engine = Arc::new(RetrievalEngine::from_settings(settings)?);
            Answerer::from_settings(settings, engine)?
        }
    };
    let run = answerer.answer(mode, question)?;
    if show_transcript {
        for message in &run.transcript {
            println!("--- {} ---", message.role);
            println!("{}", message.content);
            for call in &message.tool_calls { println!("🔧 {}({})", call.name, call.arguments); }
        }
        println!();
    }
    if let Outcome::IterationLimit(_) = run.outcome {
        println!("⚠️  Stopped after {} model calls", run.model_calls);
    }
    println!("{}", run.outcome.into_text());
    Ok(())
}

fn search(settings: &Settings, query: &str) -> anyhow::Result<()> {
    let engine = RetrievalEngine::from_settings(settings)?;
    let results = engine.compound().regulations().search(query)?;
    println!("🔍 Found {} results for '{}'", results.len(), query);
    for (i, result) in results.iter().enumerate() {
        match result.reranked_score {
            Some(score) => println!("\n{}. 📄 {} (rerank {:.3}, similarity {:.3})", i + 1, result.unit, score, result.similarity_score),
            None => println!("\n{}. 📄 {} (similarity {:.3})", i + 1, result.unit, result.similarity_score),
        }
        println!("{}", result_to_string(result, engine.corpus()));
    }
    Ok(())
}

fn definitions(settings: &Settings, query: &str) -> anyhow::Result<()> {
    let engine = RetrievalEngine::from_settings(settings)?;
    let hits = engine.keyword().search(query, settings.retrieval.definitions_k)?;
    println!("🔍 Found {} definitions for '{}'", hits.len(), query);
    for (i, hit) in hits.iter().enumerate() {
        println!("\n{}. (score {:.3}) {}", i + 1, hit.score, hit.entry.formatted());
    }
    Ok(())
}

fn index(settings: &Settings) -> anyhow::Result<()> {
    let engine = RetrievalEngine::from_settings(settings)?;
    let cache_config = CacheConfig::new(settings.retrieval.pre_expand, engine.semantic().embedder().model_id(), settings.chunking.clone());
    let run_dir = EmbeddingCache::new(&settings.retrieval.cache_dir).run_dir(&cache_config)?;
    println!("\n✅ Indexing completed successfully!");
    println!("📊 {} documents", engine.corpus().documents().len());
    println!("📊 {} units embedded with {}", engine.semantic().len(), engine.semantic().embedder().model_id());
    println!("📊 {} definitions indexed", engine.keyword().len());
    println!("📁 Cache: {}", run_dir.display());
    Ok(())
}

fn tree(settings: &Settings, title: Option<&str>) -> anyhow::Result<()> {
    let corpus = DataProcessor::with_chunking(settings.chunking.clone()).load_corpus(&settings.corpus)?;
    match title {
        Some(title) => {
            let tree = corpus.tree(title).ok_or_else(|| regsearch_core::error::Error::NotFound(format!("document '{}'", title)))?;
            print!("{}", tree.outline());
        }
        None => {
            for doc in corpus.documents() {
                println!("📄 {} ({} paragraphs)", doc.id, doc.tree.paragraph_count());
            }
        }
    }
    Ok(())
}
