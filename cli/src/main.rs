//! `plaint`: build and query complaint snapshots.
//!
//! Configuration comes from `PLAINT_*` environment variables (and `OPENAI_API_KEY`); flags
//! override them. Logs go to stderr, results to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plaint_core::LanguageModel;
use plaint_rag::{
    BackendKind, ChunkFilter, Composer, Embedder, Filter, FilteredScoring, Generator,
    PromptAssembler, RagConfig, RagConfigBuilder, RagError, Retriever, SnapshotBuilder,
    SnapshotHandle, SnapshotStore, WordWindowChunker,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use plaint_cli::{Backend, Embedding, provider, report};

/// Retrieval-augmented question answering over complaint narratives.
#[derive(Parser, Debug)]
#[command(name = "plaint", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Snapshot directory.
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Embedding model: `hash:<dim>` or an ONNX model directory.
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a snapshot from a JSON Lines file and make it current.
    Build {
        /// Cleaned complaints, one JSON object per line.
        #[arg(short, long)]
        input: PathBuf,

        /// Words per chunk.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Words shared by consecutive chunks.
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Print the chunks most similar to a question.
    Search {
        /// The question.
        question: String,

        #[command(flatten)]
        query: QueryArgs,
    },
    /// Answer a question from the retrieved chunks.
    Ask {
        /// The question.
        question: String,

        #[command(flatten)]
        query: QueryArgs,

        #[command(flatten)]
        generation: GenerationArgs,
    },
    /// Describe the current snapshot.
    Inspect {
        /// Also print the chunk table.
        #[arg(long)]
        chunks: bool,
    },
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Number of chunks to retrieve.
    #[arg(short)]
    k: Option<usize>,

    /// Metadata filter `field=value1|value2`. Repeat to require several fields.
    #[arg(short, long = "filter", value_name = "FIELD=VALUES")]
    filters: Vec<Filter>,

    /// Shorthand for `--filter category=<value>`. Repeat to accept several categories.
    #[arg(long)]
    category: Vec<String>,

    /// How filtered queries obtain chunk vectors: `retained` or `reembed`.
    #[arg(long)]
    scoring: Option<FilteredScoring>,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

impl QueryArgs {
    fn filter(&self) -> Option<Filter> {
        let mut filter = self
            .filters
            .iter()
            .cloned()
            .fold(Filter::new(), Filter::and);
        if !self.category.is_empty() {
            filter = filter.category_in(self.category.iter().cloned());
        }
        (!filter.is_empty()).then_some(filter)
    }
}

#[derive(clap::Args, Debug)]
struct GenerationArgs {
    /// Generation backend: `local` or `openai`.
    #[arg(long)]
    provider: Option<BackendKind>,

    /// Remote model name.
    #[arg(long)]
    model: Option<String>,

    /// Local GGUF model file.
    #[arg(long)]
    local_model: Option<PathBuf>,

    /// Seconds an answer may take, retries included.
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum tokens to generate.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arg(long)]
    temperature: Option<f32>,
}

impl Args {
    fn config(&self) -> Result<RagConfig> {
        let mut config = RagConfig::from_env().context("invalid PLAINT_* environment")?;
        if let Some(dir) = &self.snapshot_dir {
            config.snapshot_dir.clone_from(dir);
        }
        if let Some(model) = &self.embedding_model {
            config.embedding_model.clone_from(model);
        }
        match &self.command {
            Command::Build {
                chunk_size,
                chunk_overlap,
                ..
            } => {
                config.chunk_size = chunk_size.unwrap_or(config.chunk_size);
                config.chunk_overlap = chunk_overlap.unwrap_or(config.chunk_overlap);
            }
            Command::Search { query, .. } => apply_query(&mut config, query),
            Command::Ask {
                query, generation, ..
            } => {
                apply_query(&mut config, query);
                let settings = &mut config.generation;
                if let Some(backend) = generation.provider {
                    settings.backend = backend;
                }
                if let Some(model) = &generation.model {
                    settings.remote_model.clone_from(model);
                }
                if let Some(path) = &generation.local_model {
                    settings.local_model_path.clone_from(path);
                }
                if let Some(secs) = generation.timeout {
                    settings.timeout = Duration::from_secs(secs);
                }
                if let Some(max_tokens) = generation.max_tokens {
                    settings.max_tokens = max_tokens;
                }
                if generation.temperature.is_some() {
                    settings.temperature = generation.temperature;
                }
            }
            Command::Inspect { .. } => {}
        }
        RagConfigBuilder::from_config(config)
            .build()
            .context("invalid configuration")
    }
}

fn apply_query(config: &mut RagConfig, query: &QueryArgs) {
    if let Some(k) = query.k {
        config.default_top_k = k;
    }
    if let Some(scoring) = query.scoring {
        config.filtered_scoring = scoring;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = args.config()?;

    match args.command {
        Command::Build { input, .. } => build(&config, &input).await,
        Command::Search { question, query } => search(&config, &question, &query).await,
        Command::Ask {
            question, query, ..
        } => ask(&config, &question, &query).await,
        Command::Inspect { chunks } => inspect(&config, chunks),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn embedder(config: &RagConfig) -> Result<Arc<Embedder<Embedding>>> {
    let model = Embedding::from_model_id(&config.embedding_model)?;
    Ok(Arc::new(
        Embedder::new(model).with_batch_size(config.embed_batch_size),
    ))
}

async fn build(config: &RagConfig, input: &Path) -> Result<()> {
    let builder = SnapshotBuilder::new(
        embedder(config)?,
        WordWindowChunker::new(config.chunk_size, config.chunk_overlap)?,
        SnapshotStore::new(&config.snapshot_dir),
    );
    let snapshot = builder
        .build_from_path(input, |progress| eprintln!("{}", report::progress(&progress)))
        .await
        .with_context(|| format!("failed to build a snapshot from {}", input.display()))?;
    print!("{}", report::summary(&snapshot));
    Ok(())
}

fn open(config: &RagConfig) -> Result<Retriever<Embedding>> {
    let store = SnapshotStore::new(&config.snapshot_dir);
    let snapshot = store.load_current().map_err(|err| explain(err, &config.snapshot_dir))?;
    info!(snapshot = snapshot.id(), chunks = snapshot.len(), "opened snapshot");
    Ok(
        Retriever::new(embedder(config)?, Arc::new(SnapshotHandle::new(snapshot)))
            .with_scoring(config.filtered_scoring),
    )
}

/// Points at `plaint build` when the snapshot cannot serve this configuration.
fn explain(err: RagError, snapshot_dir: &Path) -> anyhow::Error {
    if err.needs_rebuild() {
        anyhow::Error::new(err).context(format!(
            "no usable snapshot in {}; run `plaint build --input <file>` first",
            snapshot_dir.display()
        ))
    } else {
        anyhow::Error::new(err)
    }
}

async fn search(config: &RagConfig, question: &str, query: &QueryArgs) -> Result<()> {
    let retriever = open(config)?;
    let filter = query.filter();
    let hits = retriever
        .retrieve(
            question,
            filter.as_ref().map(|filter| filter as &dyn ChunkFilter),
            config.default_top_k,
        )
        .await
        .map_err(|err| explain(err, &config.snapshot_dir))?;

    if query.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        print!("{}", report::hits(&hits, config.excerpt_chars));
    }
    Ok(())
}

async fn ask(config: &RagConfig, question: &str, query: &QueryArgs) -> Result<()> {
    let retriever = open(config)?;
    let settings = &config.generation.clone().resolved();
    let backend = Backend::from_settings(settings);
    let profile = backend.profile();
    info!(
        model = %profile.name,
        provider = %profile.provider,
        deployment = ?profile.deployment,
        "generation backend selected"
    );

    let composer = Composer::new(
        retriever,
        PromptAssembler::new(config.max_prompt_chars)?,
        Generator::new(backend).with_timeout(settings.timeout),
    )
    .with_parameters(provider::parameters(settings))
    .with_display(config.display_sources, config.excerpt_chars);

    let filter = query.filter();
    let answer = composer
        .answer_question(
            question,
            filter.as_ref().map(|filter| filter as &dyn ChunkFilter),
            config.default_top_k,
        )
        .await
        .map_err(|err| explain(err, &config.snapshot_dir))?;

    if query.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print!("{}", report::answer(&answer));
    }
    Ok(())
}

fn inspect(config: &RagConfig, chunks: bool) -> Result<()> {
    let store = SnapshotStore::new(&config.snapshot_dir);
    let snapshot = store.load_current().map_err(|err| explain(err, &config.snapshot_dir))?;
    print!("{}", report::summary(&snapshot));
    println!("stored     {} snapshot(s) in {}", store.list()?.len(), store.root().display());
    if chunks {
        println!();
        print!("{}", report::chunk_table(snapshot.metadata()));
    }
    Ok(())
}
