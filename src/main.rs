//! # DeepDive CLI (`dive`)
//!
//! The `dive` binary is the primary interface for DeepDive. It manages the
//! document corpus and runs research sessions against it.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dive init` | Create the SQLite database and run schema migrations |
//! | `dive add <file>` | Ingest a `.txt`/`.md` file into the corpus |
//! | `dive rm <document-id>` | Delete a document and its chunks |
//! | `dive clear` | Delete every document, chunk, and session |
//! | `dive list` | List ingested documents |
//! | `dive research "<query>"` | Run a two-round research session |
//! | `dive session <session-id>` | Show a stored research session |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deepdive::config::{load_config, Config};
use deepdive::engine::Engine;
use deepdive::generation::create_generator;
use deepdive::models::ResearchSession;
use deepdive::store::SqliteStore;
use deepdive::{db, ingest, migrate};

/// DeepDive — iterative research over a private document corpus.
#[derive(Parser)]
#[command(
    name = "dive",
    about = "DeepDive — iterative research over a private document corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "deepdive.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and run schema migrations.
    Init,
    /// Ingest a text file into the corpus.
    Add {
        /// Path to a .txt or .md file.
        path: PathBuf,
    },
    /// Delete a document and all its chunks.
    Rm {
        /// Document UUID (see `dive list`).
        document_id: String,
    },
    /// Delete every document, chunk, and research session.
    Clear,
    /// List ingested documents.
    List,
    /// Run a research session for a query.
    Research {
        /// The question to research.
        query: String,
    },
    /// Show a stored research session.
    Session {
        /// Session UUID.
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => cmd_init(&config).await,
        Commands::Add { path } => cmd_add(&config, &path).await,
        Commands::Rm { document_id } => cmd_rm(&config, &document_id).await,
        Commands::Clear => cmd_clear(&config).await,
        Commands::List => cmd_list(&config).await,
        Commands::Research { query } => cmd_research(&config, &query).await,
        Commands::Session { session_id } => cmd_session(&config, &session_id).await,
    }
}

async fn build_engine(config: &Config) -> Result<Engine> {
    let pool = db::connect(config).await?;
    migrate::run(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let generator = Arc::from(create_generator(&config.generation)?);
    Engine::new(store, generator, config.retrieval.clone()).await
}

async fn cmd_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run(&pool).await?;
    pool.close().await;
    println!("initialized {}", config.db.path.display());
    Ok(())
}

async fn cmd_add(config: &Config, path: &Path) -> Result<()> {
    let file = ingest::read_text_file(path)?;
    let chunks = ingest::split_chunks(&file.body, &config.chunking);

    let engine = build_engine(config).await?;
    let receipt = engine
        .ingest_document(&file.filename, &file.file_type, chunks)
        .await?;

    println!("added {}", file.filename);
    println!("  document: {}", receipt.document_id);
    println!("  chunks: {}", receipt.chunk_count);
    Ok(())
}

async fn cmd_rm(config: &Config, document_id: &str) -> Result<()> {
    let engine = build_engine(config).await?;
    let deleted_chunks = engine.delete_document(document_id).await?;
    println!("deleted document {document_id}");
    println!("  chunks removed: {deleted_chunks}");
    Ok(())
}

async fn cmd_clear(config: &Config) -> Result<()> {
    let engine = build_engine(config).await?;
    let (docs, chunks) = engine.delete_all_documents().await?;
    println!("cleared corpus");
    println!("  documents removed: {docs}");
    println!("  chunks removed: {chunks}");
    Ok(())
}

async fn cmd_list(config: &Config) -> Result<()> {
    let engine = build_engine(config).await?;
    let docs = engine.list_documents();
    if docs.is_empty() {
        println!("no documents");
        return Ok(());
    }
    for doc in docs {
        println!(
            "{}  {}  ({}, {} chunks)",
            doc.id, doc.filename, doc.file_type, doc.chunk_count
        );
    }
    Ok(())
}

async fn cmd_research(config: &Config, query: &str) -> Result<()> {
    let engine = build_engine(config).await?;
    let session = engine.run_research(query).await?;
    print_session(&session);
    Ok(())
}

async fn cmd_session(config: &Config, session_id: &str) -> Result<()> {
    let engine = build_engine(config).await?;
    let session = engine.get_session(session_id).await?;
    print_session(&session);
    Ok(())
}

fn print_session(session: &ResearchSession) {
    println!("session {}", session.id);
    println!("  query: {}", session.query);
    println!("  status: {}", session.status.as_str());

    if !session.timeline.is_empty() {
        println!("  timeline:");
        for step in &session.timeline {
            println!("    {}. {}", step.step, step.description);
        }
    }

    if !session.gap_questions.is_empty() {
        println!("  gaps explored:");
        for gap in &session.gap_questions {
            println!("    - {gap}");
        }
    }

    if !session.final_answer.is_empty() {
        println!();
        println!("{}", session.final_answer);
    }

    if !session.citations.is_empty() {
        println!();
        println!("sources:");
        for citation in &session.citations {
            let preview: String = citation.text.chars().take(80).collect();
            println!(
                "  [Source {}] {} (score {:.3}): {}",
                citation.source_number, citation.filename, citation.score, preview
            );
        }
    }
}
