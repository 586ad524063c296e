mod config;
mod db;
mod error;
mod export;
mod importer;
mod ingest;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use config::Config;
use db::CourseFilter;
use export::ExportFormat;
use importer::ImportOptions;
use ingest::Platform;

#[derive(Parser)]
#[command(name = "course_ingest", about = "Udemy / Coursera CSV course importer")]
struct Cli {
    /// SQLite document store (overrides config)
    #[arg(long, global = true, env = "COURSE_DB")]
    db: Option<PathBuf>,
    /// Directory holding the source CSV files (overrides config)
    #[arg(long, global = true, env = "COURSE_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// TOML config file
    #[arg(long, global = true, env = "COURSE_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream one source CSV into the store (upsert by source + link)
    Import {
        #[arg(value_enum)]
        source: Platform,
        /// CSV path (default: <data_dir>/<source file>)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Documents per upsert batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Delete this source's documents before importing
        #[arg(long)]
        reset: bool,
    },
    /// Document counts per source, language and level
    Stats {
        /// Languages to show
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },
    /// Compact table of stored courses
    List {
        #[arg(short, long)]
        source: Option<String>,
        #[arg(short, long)]
        language: Option<String>,
        #[arg(long)]
        level: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Dump stored courses to stdout
    Export {
        #[arg(short, long)]
        source: Option<String>,
        #[arg(short, long)]
        language: Option<String>,
        #[arg(long)]
        level: Option<String>,
        #[arg(long, value_enum, default_value_t = ExportFormat::Jsonl)]
        format: ExportFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let batch_override = match &cli.command {
        Commands::Import { batch_size, .. } => *batch_size,
        _ => None,
    };
    let cfg = Config::load(cli.config.as_deref())?.with_overrides(cli.db, cli.data_dir, batch_override)?;

    let result = match cli.command {
        Commands::Import {
            source,
            file,
            reset,
            ..
        } => {
            let opts = ImportOptions {
                platform: source,
                file: file.unwrap_or_else(|| cfg.source_path(source)),
                batch_size: cfg.batch_size,
                windows: cfg.drift,
                reset,
            };
            let summary = importer::run_import(&cfg.db_path, &opts).await?;
            summary.print(&source.source().name);
            Ok(())
        }
        Commands::Stats { top } => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn, top)?;
            println!("Total:     {}", s.total);
            print_counts("Sources", &s.by_source);
            print_counts("Languages", &s.by_language);
            print_counts("Levels", &s.by_level);
            Ok(())
        }
        Commands::List {
            source,
            language,
            level,
            limit,
        } => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let filter = CourseFilter {
                source,
                language,
                level,
            };
            let rows = db::fetch_courses(&conn, &filter, Some(limit))?;
            if rows.is_empty() {
                println!("No courses found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<36} | {:<12} | {:<12} | {:<18} | {:<10}",
                "#", "Title", "Source", "Language", "Level", "Updated"
            );
            println!("{}", "-".repeat(106));

            for (i, r) in rows.iter().enumerate() {
                let c = &r.course;
                let updated = c
                    .last_updated
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:>3} | {:<36} | {:<12} | {:<12} | {:<18} | {:<10}",
                    i + 1,
                    truncate(&c.title, 36),
                    truncate(&c.source.name, 12),
                    truncate(&c.language, 12),
                    truncate(&c.level, 18),
                    updated
                );
            }

            println!("\n{} courses", rows.len());
            Ok(())
        }
        Commands::Export {
            source,
            language,
            level,
            format,
        } => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let filter = CourseFilter {
                source,
                language,
                level,
            };
            let rows = db::fetch_courses(&conn, &filter, None)?;
            let stdout = std::io::stdout();
            let n = export::write_courses(&mut stdout.lock(), &rows, format)?;
            tracing::info!("Exported {} courses", n);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_counts(label: &str, counts: &[(String, usize)]) {
    println!("\n--- {} ---", label);
    for (name, n) in counts {
        println!("  {:<28} {:>8}", truncate(name, 28), n);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
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
