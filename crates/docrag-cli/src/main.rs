//! docrag CLI - ingest office documents and ask questions against them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use docrag_core::{DocragConfig, Embedder, Result};
use docrag_index::{HashEmbedder, LexicalSearch, MemoryVectorIndex, VectorSearch};
use docrag_ingest::{DualIndexWriter, IngestionService};
use docrag_query::{CrossEncoderReranker, HybridRetriever};
use docrag_service::{
    AnswerPipeline, AskRequest, DocragService, ExtractiveGenerator, JobStatus, JobStore,
    SearchRequest,
};

/// docrag - hybrid retrieval over office documents
#[derive(Parser)]
#[command(name = "docrag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a config file (default: docrag.toml or user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a document and print the ingestion report
    Ingest {
        /// Path to the document file
        path: PathBuf,
    },

    /// Retrieve evidence chunks for a query
    Search {
        /// Search query
        query: String,

        /// Documents to index before searching
        #[arg(short, long, required = true)]
        file: Vec<PathBuf>,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Ask a question and wait for the generated answer
    Ask {
        /// The question
        question: String,

        /// Documents to index before asking
        #[arg(short, long, required = true)]
        file: Vec<PathBuf>,
    },
}

fn build_service(config: &DocragConfig) -> Result<DocragService> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new());
    let vector = Arc::new(MemoryVectorIndex::new());
    let lexical = Arc::new(LexicalSearch::new());

    let writer = DualIndexWriter::new(
        Arc::clone(&embedder),
        vector.clone(),
        Some(Arc::clone(&lexical)),
    );
    let ingestion = IngestionService::with_config(&config.chunking, writer);

    // Fail-open: a missing model leaves retrieval running with
    // pass-through ranking.
    let reranker = Arc::new(CrossEncoderReranker::new(config.reranker.clone()));
    reranker.load();
    if !reranker.is_loaded() {
        warn!("Reranker model unavailable, results will not be rescored");
    }

    let retriever = Arc::new(HybridRetriever::new(
        VectorSearch::with_config(embedder, vector, &config.retrieval),
        Some(lexical),
        reranker,
        &config.retrieval,
    ));
    let pipeline = Arc::new(AnswerPipeline::new(
        Arc::clone(&retriever),
        Arc::new(ExtractiveGenerator::new()),
    ));

    let jobs = Arc::new(JobStore::open(&config.service.jobs_db_path)?);

    Ok(DocragService::new(ingestion, retriever, pipeline, jobs))
}

fn filename_of(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn ingest_all(service: &DocragService, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let report = service.upload(path, &filename_of(path)).await?;
        eprintln!(
            "indexed {} ({} blocks, {} chunks)",
            filename_of(path),
            report.report.documents,
            report.report.chunks
        );
    }
    Ok(())
}

async fn run(cli: Cli, config: DocragConfig) -> Result<()> {
    match cli.command {
        Commands::Ingest { path } => {
            let service = build_service(&config)?;
            let response = service.upload(&path, &filename_of(&path)).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Search { query, file, top_k } => {
            let service = build_service(&config)?;
            ingest_all(&service, &file).await?;

            let mut request = SearchRequest::query(query);
            request.top_k = top_k;
            let results = service.search(request).await?;

            if results.is_empty() {
                eprintln!("no results");
            }
            for (rank, result) in results.iter().enumerate() {
                let score = result
                    .score
                    .map(|s| format!("{:.4}", s))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>2}. [{}] {} #{} (score {})",
                    rank + 1,
                    result.chunk.chunk_type,
                    result.chunk.source,
                    result.chunk.chunk_index,
                    score
                );
                if let Some(section) = &result.chunk.section {
                    println!("    section: {}", section);
                }
                println!("    {}", result.chunk.text);
            }
        }

        Commands::Ask { question, file } => {
            let service = build_service(&config)?;
            ingest_all(&service, &file).await?;

            let ask = service
                .ask(AskRequest {
                    file_id: "cli".to_string(),
                    question,
                })
                .await?;
            let status = wait_for_answer(&service, &ask.question_id).await?;

            match status.status {
                JobStatus::Done => println!("{}", status.answer.unwrap_or_default()),
                _ => eprintln!("question failed: {}", status.error.unwrap_or_default()),
            }
        }
    }

    Ok(())
}

async fn wait_for_answer(
    service: &DocragService,
    question_id: &str,
) -> Result<docrag_service::QuestionStatusResponse> {
    loop {
        let status = service.status(question_id)?;
        if status.status != JobStatus::Processing {
            return Ok(status);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => DocragConfig::load(path),
        None => DocragConfig::load_default(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, config).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
