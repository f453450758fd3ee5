mod db;
mod parser;
mod tracker;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};

use tracker::source::{HttpStatusStore, SqliteStatusStore, StatusStore};
use tracker::state::Phase;
use tracker::SearchTracker;

#[derive(Parser)]
#[command(name = "adscope", about = "Creative analysis processor and search-job tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Store a raw analysis text ("-" reads stdin)
    Ingest {
        file: PathBuf,
    },
    /// Parse ingested analyses into structured documents
    Process {
        /// Max analyses to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print one parsed analysis
    Show {
        id: i64,
    },
    /// Parsed analyses overview table
    Overview {
        /// Filter to analyses with at least one section in this category
        #[arg(short, long)]
        category: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Follow a competitor-search job until it completes or fails
    Track {
        keyword: String,
        /// Poll an HTTP status endpoint instead of the local database
        #[arg(long)]
        remote: Option<String>,
    },
    /// Maintain search-job records
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
    /// Show ingestion and job statistics
    Stats,
}

#[derive(Subcommand)]
enum JobAction {
    /// Create or restart a job in the processing state
    Start { keyword: String },
    /// Mark a job completed with a result count
    Finish {
        keyword: String,
        #[arg(short = 'c', long)]
        count: i64,
    },
    /// Mark a job failed
    Fail {
        keyword: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List known jobs
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            println!("Schema ready.");
            Ok(())
        }
        Commands::Ingest { file } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let (source, raw) = if file.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                ("stdin".to_string(), buf)
            } else {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string());
                (name, std::fs::read_to_string(&file)?)
            };
            let id = db::insert_analysis(&conn, &source, &raw)?;
            println!("Ingested analysis #{} from {}", id, source);
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pending = db::fetch_unprocessed(&conn, limit)?;
            if pending.is_empty() {
                println!("No unprocessed analyses. Run 'ingest' first.");
                return Ok(());
            }
            println!("Processing {} analyses...", pending.len());
            let counts = process_analyses(&conn, &pending)?;
            counts.print();
            Ok(())
        }
        Commands::Show { id } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            match db::fetch_document(&conn, id)? {
                Some(stored) => {
                    print_document(&stored);
                    Ok(())
                }
                None => {
                    println!("No parsed analysis with id {}. Run 'process' first.", id);
                    Ok(())
                }
            }
        }
        Commands::Overview { category, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, category.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No parsed analyses found.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<18} | {:>8} | {:>8} | {:<44}",
                "#", "Source", "Sections", "Insights", "Summary"
            );
            println!("{}", "-".repeat(94));
            for r in &rows {
                println!(
                    "{:>4} | {:<18} | {:>8} | {:>8} | {:<44}",
                    r.id,
                    truncate(&r.source, 18),
                    r.section_count,
                    r.insight_count,
                    truncate(&r.summary, 44),
                );
            }
            println!("\n{} analyses", rows.len());
            Ok(())
        }
        Commands::Track { keyword, remote } => {
            let store: Arc<dyn StatusStore> = match remote {
                Some(base) => Arc::new(HttpStatusStore::new(base)),
                None => {
                    let conn = db::connect()?;
                    db::init_schema(&conn)?;
                    Arc::new(SqliteStatusStore::new(conn))
                }
            };
            track_job(store, &keyword).await
        }
        Commands::Job { action } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            match action {
                JobAction::Start { keyword } => {
                    db::start_job(&conn, &keyword)?;
                    println!("Job '{}' is processing.", keyword);
                }
                JobAction::Finish { keyword, count } => {
                    if db::finish_job(&conn, &keyword, count)? {
                        println!("Job '{}' completed with {} results.", keyword, count);
                    } else {
                        println!("No job named '{}'.", keyword);
                    }
                }
                JobAction::Fail { keyword, message } => {
                    if db::fail_job(&conn, &keyword, message.as_deref())? {
                        println!("Job '{}' marked failed.", keyword);
                    } else {
                        println!("No job named '{}'.", keyword);
                    }
                }
                JobAction::List => {
                    let jobs = db::list_jobs(&conn)?;
                    if jobs.is_empty() {
                        println!("No jobs recorded.");
                    }
                    for j in &jobs {
                        println!(
                            "{:<24} {:<10} {:>6} results  {}",
                            truncate(&j.keyword, 24),
                            j.status,
                            j.result_count,
                            j.error.as_deref().unwrap_or(""),
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Analyses:    {}", s.analyses);
            println!("Processed:   {}", s.processed);
            println!("Unprocessed: {}", s.unprocessed);
            println!("Sections:    {}", s.sections);
            println!(
                "Jobs:        {} processing, {} completed, {} failed",
                s.jobs_processing, s.jobs_completed, s.jobs_failed
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    documents: usize,
    sections: usize,
    insights: usize,
    colors: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} documents, {} sections, {} insights, {} colors.",
            self.documents, self.sections, self.insights, self.colors,
        );
    }
}

fn process_analyses(
    conn: &rusqlite::Connection,
    pending: &[db::RawAnalysis],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        documents: 0,
        sections: 0,
        insights: 0,
        colors: 0,
    };

    for chunk in pending.chunks(200) {
        let docs: Vec<(i64, parser::AnalysisDocument)> = chunk
            .par_iter()
            .map(|a| (a.id, parser::parse(&a.raw)))
            .collect();

        for (_, doc) in &docs {
            counts.sections += doc.sections.len();
            counts.insights += doc.key_insights.len();
            counts.colors += doc.colors.len();
        }
        counts.documents += docs.len();

        db::save_documents(conn, &docs)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

async fn track_job(store: Arc<dyn StatusStore>, keyword: &str) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("=> "),
    );

    let done_pb = pb.clone();
    let fail_pb = pb.clone();
    let tracker = SearchTracker::spawn(
        store,
        keyword,
        Box::new(move |count| done_pb.println(format!("Search completed: {} ads cached", count))),
        Box::new(move |message| fail_pb.println(format!("Search failed: {}", message))),
    );

    let mut rx = tracker.subscribe();
    while rx.changed().await.is_ok() {
        let s = rx.borrow_and_update().clone();
        pb.set_position(s.progress as u64);
        pb.set_message(format!("{} ({}s)", s.phase.label(), s.elapsed_secs));
        if s.phase.is_terminal() {
            break;
        }
    }

    let end = tracker.wait().await;
    pb.finish_and_clear();
    match end.phase {
        Phase::Completed => println!(
            "'{}' finished after {}s with {} results.",
            keyword,
            end.elapsed_secs,
            end.result_count.unwrap_or(0)
        ),
        Phase::Error => println!(
            "'{}' failed after {}s: {}",
            keyword,
            end.elapsed_secs,
            end.error.as_deref().unwrap_or("unknown error")
        ),
        _ => {}
    }
    Ok(())
}

fn print_document(stored: &db::StoredAnalysis) {
    let doc = &stored.document;
    println!("Analysis #{} ({}, ingested {})", stored.id, stored.source, stored.ingested_at);
    println!("Summary: {}", doc.summary);

    for section in &doc.sections {
        println!(
            "\n[{}] {} ({})",
            section.category.as_str(),
            section.title,
            section.icon.as_str()
        );
        for line in &section.content {
            println!("  - {}", line);
        }
        for sub in &section.subtopics {
            println!("  {}:", sub.title);
            for line in &sub.content {
                println!("    - {}", line);
            }
        }
    }

    if !doc.colors.is_empty() {
        println!("\nColors: {}", doc.colors.join(", "));
    }
    if !doc.key_insights.is_empty() {
        println!("\nKey insights:");
        for insight in &doc.key_insights {
            println!("  - {}", insight);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
