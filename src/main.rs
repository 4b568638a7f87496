//! Main entry point for the filekit CLI application.
//!
//! Each subcommand maps onto one library operation; see [`filekit::cli::Command`].

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;

use filekit::cli::Command;
use filekit::config::{self, FileKitConfig};
use filekit::{
    ArchiveReader, Cli, CompressionKind, FetchOutcome, WriterSink, logging,
};

/// Application entry point.
///
/// Parses command-line arguments, loads configuration and dispatches to the
/// handler for the chosen subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.quiet);

    let cfg = match &cli.config {
        Some(path) => config::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => config::load_or_init().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using built-in config");
            FileKitConfig::default()
        }),
    };

    match &cli.command {
        Command::Compress {
            source,
            archive,
            store,
            level,
        } => {
            let mut options = cfg.compress.clone();
            if *store {
                options.method = CompressionKind::Stored;
            }
            if let Some(level) = level {
                options.level = *level;
            }
            let summary = filekit::compress(source, archive, &options).await?;
            if !cli.is_quiet() {
                println!(
                    "  {} entries, {} -> {}",
                    summary.entries,
                    format_size(summary.bytes_in),
                    format_size(summary.archive_size)
                );
            }
        }
        Command::List { archive, verbose } => list_files(archive, *verbose).await?,
        Command::Download {
            file,
            name,
            delete,
            output,
        } => {
            let name = match name {
                Some(name) => name.clone(),
                None => file
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .context("cannot derive a display name; pass --name")?,
            };
            match output {
                Some(out) => {
                    let out = tokio::fs::File::create(out)
                        .await
                        .with_context(|| format!("creating {}", out.display()))?;
                    serve(file, &name, *delete, WriterSink::new(out), &cfg, cli.is_quiet()).await?;
                }
                None => {
                    let stdout = tokio::io::stdout();
                    serve(file, &name, *delete, WriterSink::new(stdout), &cfg, cli.is_quiet()).await?;
                }
            }
        }
        Command::Delete { paths } => {
            for path in paths {
                filekit::delete(path).await?;
            }
        }
        Command::Clean { dir } => filekit::clean(dir).await?,
        Command::Fetch { url, dest } => {
            match filekit::fetch_from_url(url, dest, &cfg.fetch).await {
                FetchOutcome::Saved { path, bytes } => {
                    if !cli.is_quiet() {
                        println!("  saved {} ({})", path.display(), format_size(bytes));
                    }
                }
                FetchOutcome::Failed { reason } => bail!("fetch failed: {reason}"),
            }
        }
    }

    Ok(())
}

/// Run a download into `sink`, then print the response headers to stderr.
/// The sink is finished (flushed) by the download itself.
async fn serve<W>(
    file: &Path,
    name: &str,
    delete: bool,
    mut sink: WriterSink<W>,
    cfg: &FileKitConfig,
    quiet: bool,
) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    let bytes = filekit::download(file, name, delete, &mut sink, &cfg.download).await?;
    if !quiet {
        for line in sink.head().lines() {
            eprintln!("{line}");
        }
        eprintln!("{} streamed", format_size(bytes));
    }
    Ok(())
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format: just file names, one per line
/// - Verbose format (`-v`): table with size, compression ratio and timestamps
async fn list_files(archive: &Path, verbose: bool) -> Result<()> {
    let reader = ArchiveReader::open(archive).await?;

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in reader.entries() {
        if !verbose {
            println!("{}", entry.file_name);
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Percentage saved by compression, right-aligned to five columns.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 {
        return "   0%".to_string();
    }
    let saved = 100i64 - (compressed * 100 / uncompressed) as i64;
    format!("{:>4}%", saved)
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
