//! CLI implementation
//!
//! Human rendering over the shared command layer. Machine output is behind
//! `--json`; everything human goes through `colored`, progress to stderr.

use std::io::BufRead;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::commands::CommandContext;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::search::{SearchOptions, SearchResult};

#[derive(Parser)]
#[command(name = "directory-indexer")]
#[command(about = "Semantic search over local directories")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug info
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index directories for semantic search
    Index {
        /// Directories to index
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Search indexed content
    Search {
        /// Search query (quote multi-word queries)
        query: String,
        /// Max results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
        /// Only results under this path prefix
        #[arg(long)]
        path: Option<String>,
        /// Only results inside a named workspace (WORKSPACE_<NAME> env)
        #[arg(long)]
        workspace: Option<String>,
        /// Drop files scoring below this cosine similarity
        #[arg(long)]
        min_score: Option<f32>,
        /// Show per-chunk scores
        #[arg(long)]
        show_chunks: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find files similar to a given file
    Similar {
        /// An already-indexed file
        file: String,
        /// Max results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print file content, whole or as a chunk range
    Get {
        file: String,
        /// Chunk range, 1-based inclusive: '3' or '2-5'
        #[arg(long)]
        chunks: Option<String>,
    },
    /// Show service health, index counts, and workspaces
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the vector collection and metadata store
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Run the MCP server on stdio
    Serve,
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?.with_verbose(cli.verbose);
    let context = CommandContext::new(config).await?;

    match cli.command {
        Commands::Index { paths } => cmd_index(&context, &paths).await,
        Commands::Search {
            query,
            limit,
            path,
            workspace,
            min_score,
            show_chunks,
            json,
        } => {
            let opts = SearchOptions {
                limit,
                workspace,
                min_score,
                path_prefix: path,
            };
            let results = context.search(&query, &opts).await?;
            print_results(&results, show_chunks, json)
        }
        Commands::Similar { file, limit, json } => {
            let results = context.similar(&file, limit).await?;
            print_results(&results, false, json)
        }
        Commands::Get { file, chunks } => {
            let content = context.get(&file, chunks.as_deref()).await?;
            print!("{content}");
            Ok(())
        }
        Commands::Status { json } => cmd_status(&context, json).await,
        Commands::Reset { force } => cmd_reset(&context, force).await,
        Commands::Serve => crate::mcp::serve_stdio(context).await,
    }
}

async fn cmd_index(context: &CommandContext, paths: &[String]) -> Result<()> {
    // First Ctrl+C requests a stop between files; second one force-exits.
    let cancel = std::sync::Arc::clone(&context.cancel);
    let handler = ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("\nInterrupted. Finishing the current file...");
    });
    if let Err(e) = handler {
        tracing::debug!(error = %e, "Ctrl+C handler not installed");
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Indexing {} director{}...", paths.len(),
        if paths.len() == 1 { "y" } else { "ies" }));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let summary = context.index(paths).await;
    spinner.finish_and_clear();
    let summary = summary?;

    println!(
        "{} {} indexed, {} skipped, {} deleted, {} failed",
        "Done:".green().bold(),
        summary.indexed,
        summary.skipped,
        summary.deleted,
        summary.failed
    );
    for error in &summary.errors {
        eprintln!("  {} {error}", "warning:".yellow());
    }

    // Per-file errors don't fail the run; indexing nothing because the
    // roots were missing does.
    if summary.indexed == 0 && summary.missing_roots > 0 {
        return Err(AppError::NotFound(format!(
            "{} of {} roots could not be scanned",
            summary.missing_roots,
            paths.len()
        )));
    }
    Ok(())
}

fn print_results(results: &[SearchResult], show_chunks: bool, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(results)
                .map_err(|e| AppError::UserInput(e.to_string()))?
        );
        return Ok(());
    }
    if results.is_empty() {
        println!("{}", "No results.".dimmed());
        return Ok(());
    }
    for result in results {
        println!(
            "{:.3}  {}  {}",
            result.score,
            result.file_path.cyan(),
            format!(
                "({}/{} chunks, {} bytes)",
                result.matching_chunks, result.total_chunks, result.size
            )
            .dimmed()
        );
        if show_chunks {
            for chunk in &result.chunks {
                println!("       chunk {:<4} {:.3}", chunk.chunk_id, chunk.score);
            }
        }
    }
    Ok(())
}

async fn cmd_status(context: &CommandContext, json: bool) -> Result<()> {
    let report = context.status().await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| AppError::UserInput(e.to_string()))?
        );
        return Ok(());
    }

    let up = |ok: bool| if ok { "up".green() } else { "down".red() };
    println!("{}", "Services".bold());
    println!("  vector store: {}", up(report.services.vector_store));
    println!(
        "  embedding:    {} ({})",
        up(report.services.embedding),
        report.services.embedding_provider
    );

    let stats = &report.index.stats;
    println!("{}", "Index".bold());
    println!(
        "  {} directories, {} files, {} chunks, {} KB on disk",
        stats.directories,
        stats.files,
        stats.chunks,
        stats.db_size_bytes / 1024
    );
    for dir in &report.index.directories {
        let when = dir
            .indexed_at
            .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".into());
        println!("  {}  {} ({when})", dir.path.cyan(), dir.status);
        if let Some(error) = &dir.last_error {
            println!("      {} {error}", "last error:".yellow());
        }
    }

    if !report.index.workspaces.is_empty() {
        println!("{}", "Workspaces".bold());
        for ws in &report.index.workspaces {
            let mark = if ws.is_valid { "ok".green() } else { "invalid".red() };
            println!("  {}  {}  {}", ws.name, ws.paths.join(","), mark);
        }
    }

    for issue in &report.index.issues {
        println!("{} {issue}", "issue:".yellow());
    }
    Ok(())
}

async fn cmd_reset(context: &CommandContext, force: bool) -> Result<()> {
    if !force {
        println!("This will delete:");
        println!("  - vector collection '{}'", context.config.collection);
        println!("  - metadata store {}", context.config.db_path().display());
        print!("Proceed? [y/N] ");
        use std::io::Write;
        std::io::stdout()
            .flush()
            .map_err(|e| AppError::UserInput(e.to_string()))?;
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| AppError::UserInput(e.to_string()))?;
        if line.trim() != "y" {
            println!("Aborted.");
            return Ok(());
        }
    }

    let report = context.reset(true).await?;
    if report.vector_store_cleared {
        println!("{} vector collection deleted", "ok:".green());
    }
    if report.metadata_cleared {
        println!("{} metadata store truncated", "ok:".green());
    }
    for note in &report.notes {
        eprintln!("  {} {note}", "warning:".yellow());
    }
    Ok(())
}
