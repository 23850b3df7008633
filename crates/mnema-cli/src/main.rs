//! The `mnema` binary: add, search, and review memories from the shell.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mnema_core::{
    MemoryMetadata, MemoryType, ReviewDifficulty, SearchMode, SearchQuery, TemporalFilter,
};
use mnema_embedding::{
    EmbeddingProvider, FallbackEmbedding, HashingEmbedding, HttpEmbedding, HttpEmbeddingConfig,
};
use mnema_ingest::Ingestor;
use mnema_review::{scheduler::is_overdue, JsonlHealthJournal, ReviewScheduler};
use mnema_search::{SearchEngine, TermOverlapCrossEncoder};
use mnema_store::FileVectorStore;

#[derive(Parser)]
#[command(name = "mnema", about = "Mnema — personal knowledge base with memory health")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "mnema.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a note or ingest a document
    Add {
        /// Text content to store (reads the file instead when --file is set)
        content: Option<String>,
        /// Ingest a file instead of inline text
        #[arg(long)]
        file: Option<PathBuf>,
        /// Title for the memory
        #[arg(short, long)]
        title: Option<String>,
        /// Memory type: note, document, conversation, image, audio, web
        #[arg(long, default_value = "note")]
        memory_type: String,
        /// Tags to attach (repeatable)
        #[arg(long)]
        tag: Vec<String>,
        /// Project to file the memory under
        #[arg(long)]
        project: Option<String>,
        /// Author attribution
        #[arg(long)]
        author: Option<String>,
    },
    /// Search stored memories
    Search {
        /// Query text
        query: String,
        /// Maximum results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Retrieval mode: hybrid, dense, sparse
        #[arg(long, default_value = "hybrid")]
        mode: String,
        /// Restrict to a time window: today, week, month, quarter, year
        #[arg(long)]
        since: Option<String>,
        /// Skip cross-encoder reranking
        #[arg(long)]
        no_rerank: bool,
    },
    /// Find memories similar to an existing one
    Similar {
        /// Memory id
        id: Uuid,
        /// Maximum results
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Record an active review of a memory
    Review {
        /// Memory id
        id: Uuid,
        /// Recall rating: 1=forgot, 2=hard, 3=good, 4=easy
        rating: i32,
    },
    /// List memories due for review
    Due {
        /// Maximum entries
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the memory-health dashboard
    Dashboard,
    /// Suggest a study session
    Study {
        /// Time budget in minutes
        #[arg(short, long, default_value_t = 15)]
        minutes: u32,
        /// Review everything due in priority order instead of weak-first
        #[arg(long)]
        no_focus_weak: bool,
    },
}

#[derive(Deserialize, Default)]
struct MnemaConfig {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default)]
    embedding: EmbeddingSection,
}

#[derive(Deserialize)]
struct EmbeddingSection {
    /// "hashing" for the local provider, "remote" for an HTTP backend
    /// with hashing fallback.
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    api_key: String,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_dimension")]
    dimension: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: String::new(),
            api_key: String::new(),
            model: default_model(),
            dimension: default_dimension(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_provider() -> String {
    "hashing".to_string()
}
fn default_model() -> String {
    "voyage-3".to_string()
}
fn default_dimension() -> usize {
    768
}

fn build_embedder(config: &EmbeddingSection) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedding::new(config.dimension))),
        "remote" => {
            if config.base_url.is_empty() {
                anyhow::bail!("embedding.base_url is required for the remote provider");
            }
            let remote = HttpEmbedding::new(HttpEmbeddingConfig::new(
                config.base_url.clone(),
                config.api_key.clone(),
                config.model.clone(),
                config.dimension,
            ));
            let local = HashingEmbedding::new(config.dimension);
            Ok(Arc::new(FallbackEmbedding::new(
                Arc::new(remote),
                Arc::new(local),
            )))
        }
        other => anyhow::bail!("unknown embedding provider '{other}' (expected hashing or remote)"),
    }
}

fn parse_mode(mode: &str) -> anyhow::Result<SearchMode> {
    match mode {
        "hybrid" => Ok(SearchMode::Hybrid),
        "dense" => Ok(SearchMode::Dense),
        "sparse" => Ok(SearchMode::Sparse),
        other => anyhow::bail!("unknown search mode '{other}'"),
    }
}

fn parse_window(window: &str) -> anyhow::Result<TemporalFilter> {
    match window {
        "today" => Ok(TemporalFilter::Today),
        "week" => Ok(TemporalFilter::Week),
        "month" => Ok(TemporalFilter::Month),
        "quarter" => Ok(TemporalFilter::Quarter),
        "year" => Ok(TemporalFilter::Year),
        other => anyhow::bail!("unknown time window '{other}'"),
    }
}

fn parse_memory_type(kind: &str) -> anyhow::Result<MemoryType> {
    match kind {
        "note" => Ok(MemoryType::Note),
        "document" => Ok(MemoryType::Document),
        "conversation" => Ok(MemoryType::Conversation),
        "image" => Ok(MemoryType::Image),
        "audio" => Ok(MemoryType::Audio),
        "web" => Ok(MemoryType::Web),
        other => anyhow::bail!("unknown memory type '{other}'"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    // A missing config file means defaults, not a failure; the CLI should
    // work out of the box.
    let config: MnemaConfig = match tokio::fs::read_to_string(&cli.config).await {
        Ok(raw) => toml::from_str(&raw)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => MnemaConfig::default(),
        Err(e) => {
            anyhow::bail!("failed to read config file '{}': {e}", cli.config.display())
        }
    };

    let embedder = build_embedder(&config.embedding)?;
    let store = Arc::new(FileVectorStore::new(config.data_dir.join("memories.jsonl")).await?);
    let journal = Arc::new(JsonlHealthJournal::new(config.data_dir.join("health.jsonl")).await?);
    let scheduler = ReviewScheduler::with_journal(journal).await?;

    match cli.command {
        Commands::Add {
            content,
            file,
            title,
            memory_type,
            tag,
            project,
            author,
        } => {
            let text = match (content, file) {
                (_, Some(path)) => tokio::fs::read_to_string(&path).await?,
                (Some(inline), None) => inline,
                (None, None) => anyhow::bail!("provide text content or --file"),
            };
            let metadata = MemoryMetadata {
                author,
                project,
                tags: tag,
                ..MemoryMetadata::default()
            };

            let ingestor = Ingestor::new(store.clone(), embedder.clone());
            let report = ingestor
                .ingest(&text, title.as_deref(), parse_memory_type(&memory_type)?, metadata)
                .await?;
            if report.chunks == 0 {
                println!("Nothing to store: input was empty.");
            } else {
                info!(chunks = report.chunks, "stored memory");
                println!("Stored {} chunk(s):", report.chunks);
                for id in &report.memory_ids {
                    println!("  {id}");
                }
            }
        }
        Commands::Search {
            query,
            limit,
            mode,
            since,
            no_rerank,
        } => {
            let mut request = SearchQuery::new(query)
                .with_limit(limit)
                .with_mode(parse_mode(&mode)?)
                .with_rerank(!no_rerank);
            if let Some(window) = since {
                request.temporal_filter = parse_window(&window)?;
            }

            let engine = SearchEngine::new(store.clone(), embedder.clone())
                .with_cross_encoder(Arc::new(TermOverlapCrossEncoder));
            let response = engine.search(request).await?;
            print_results(&response);
        }
        Commands::Similar { id, limit } => {
            let engine = SearchEngine::new(store.clone(), embedder.clone());
            let response = engine.find_similar(id, limit).await?;
            if !response.success {
                println!("{}", response.message.unwrap_or_else(|| "not found".to_string()));
            } else {
                print_results(&response);
            }
        }
        Commands::Review { id, rating } => {
            let difficulty = ReviewDifficulty::from_rating(rating)?;
            let health = scheduler.record_review(id, difficulty).await?;
            println!(
                "Recorded review for {id}: interval {} day(s), {} repetition(s), ease {:.2}",
                health.interval_days, health.repetitions, health.ease_factor
            );
            println!("Next review: {}", health.next_review.format("%Y-%m-%d"));
        }
        Commands::Due { limit } => {
            let due = scheduler.get_due_reviews(limit, true).await?;
            if due.is_empty() {
                println!("Nothing due. Keep it up!");
            } else {
                let now = chrono::Utc::now();
                println!("Due for review:");
                for item in &due {
                    let marker = if is_overdue(&item.health, now) {
                        format!(" (overdue {} day(s))", item.days_overdue)
                    } else {
                        String::new()
                    };
                    println!(
                        "  {}  priority {:.2}{}",
                        item.health.memory_id, item.priority, marker
                    );
                }
            }
        }
        Commands::Dashboard => {
            let dashboard = scheduler.get_memory_health_dashboard().await;
            println!("Memory health");
            println!("  Tracked:           {}", dashboard.total_memories);
            println!("  Health score:      {}/100", dashboard.health_score);
            println!("  Average retention: {}%", dashboard.average_retention);
            println!("  Due today:         {}", dashboard.reviews_due_today);
            println!("  Overdue:           {}", dashboard.overdue_reviews);
            println!("  Streak:            {} day(s)", dashboard.review_streak);
            println!("  Strength:");
            for (strength, count) in &dashboard.strength_distribution {
                println!("    {strength:?}: {count}");
            }
            println!("  Past week:");
            for (day, count) in &dashboard.weekly_review_stats {
                println!("    {day}: {count}");
            }
        }
        Commands::Study {
            minutes,
            no_focus_weak,
        } => {
            let session = scheduler.suggest_study_session(minutes, !no_focus_weak).await?;
            if session.memories.is_empty() {
                println!("Nothing due to study right now.");
            } else {
                println!(
                    "Study session: {} review(s) in {} minute(s)",
                    session.estimated_reviews, session.duration_minutes
                );
                for item in &session.memories {
                    println!("  {}  priority {:.2}", item.health.memory_id, item.priority);
                }
                println!("Tips:");
                for tip in &session.tips {
                    println!("  - {tip}");
                }
            }
        }
    }

    Ok(())
}

fn print_results(response: &mnema_core::SearchResponse) {
    if response.results.is_empty() {
        println!("No results ({:.1} ms).", response.took_ms);
        if let Some(message) = &response.message {
            println!("{message}");
        }
        return;
    }

    println!("{} result(s) in {:.1} ms:", response.total, response.took_ms);
    for result in &response.results {
        let title = result
            .memory
            .title
            .as_deref()
            .unwrap_or("(untitled)");
        println!("  [{:.3}] {}  {}", result.score, result.memory.id, title);
        for highlight in &result.highlights {
            println!("      {highlight}");
        }
    }
    if let Some(message) = &response.message {
        println!("{message}");
    }
}
