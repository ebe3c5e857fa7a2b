//! Main entry point for the pkextract CLI application.
//!
//! This binary provides a command-line interface for extracting ZIP files
//! from both local filesystem and remote HTTP URLs.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use pkextract::zip::CompressionMethod;
use pkextract::{
    ArchiveSource, CentralDirectoryEntry, Cli, EntryOutcome, HttpRangeReader, LocalFileReader,
    ZipExtractor,
};

/// Application entry point.
///
/// Loads the archive from a local file or HTTP URL, then lists, pipes or
/// extracts it depending on the flags.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let data = if cli.is_http_url() {
        // Download the remote archive with Range requests
        let reader = HttpRangeReader::new(cli.file.clone()).await?;
        let data = reader.read_all().await?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            let transferred = reader.transferred_bytes();
            eprintln!("Total bytes transferred: {}", format_size(transferred));
        }
        data
    } else {
        LocalFileReader::new(Path::new(&cli.file))
            .await
            .with_context(|| format!("cannot open {}", cli.file))?
            .read_all()
            .await?
    };

    let extractor = ZipExtractor::new(data)
        .with_context(|| format!("{} is not a readable ZIP archive", cli.file))?
        .with_options(cli.extract_options());

    process_zip(&extractor, &cli).await
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the default level.
fn init_tracing(cli: &Cli) {
    let default_level = if cli.is_quiet() { "error" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Process a ZIP archive based on CLI options.
///
/// - List mode (`-l` or `-v`): Display archive contents
/// - Pipe mode (`-p`): Write selected file contents to stdout
/// - Extract mode: Extract entries matching the specified filters
async fn process_zip(extractor: &ZipExtractor, cli: &Cli) -> Result<()> {
    // List mode: display archive contents and exit
    if cli.list || cli.verbose {
        list_files(extractor.entries(), cli.verbose);
        return Ok(());
    }

    let selected: Vec<CentralDirectoryEntry> = extractor
        .entries()
        .iter()
        .filter(|e| cli.selects(&e.name))
        .cloned()
        .collect();

    if cli.pipe {
        return pipe_files(extractor, &selected).await;
    }

    let output_root = Path::new(cli.output_root());
    let total = selected.len();
    let methods: Vec<CompressionMethod> =
        selected.iter().map(|e| e.compression_method()).collect();
    let report = extractor.extract_entries(output_root, selected).await?;

    let mut failed = 0usize;
    for entry in &report.entries {
        match &entry.result {
            Ok(outcome) if !cli.is_quiet() => print_outcome(
                &entry.name,
                methods[entry.index],
                outcome,
                cli,
            ),
            Ok(_) => {}
            Err(err) => {
                failed += 1;
                if !cli.is_very_quiet() {
                    eprintln!("error: {}: {}", entry.name, err);
                }
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} entries could not be extracted", failed, total);
    }

    Ok(())
}

/// Print one unzip-style progress line.
fn print_outcome(name: &str, method: CompressionMethod, outcome: &EntryOutcome, cli: &Cli) {
    match outcome {
        EntryOutcome::Extracted(path) => {
            let verb = if method == CompressionMethod::Deflate {
                "inflating"
            } else {
                "extracting"
            };
            println!("  {:>10}: {}", verb, path.display());
        }
        EntryOutcome::CreatedDirectory(path) => {
            println!("  {:>10}: {}", "creating", path.display())
        }
        EntryOutcome::SkippedExisting(_) if cli.never_overwrite => {
            eprintln!("Skipping: {} (file exists)", name);
        }
        EntryOutcome::SkippedExisting(_) => {
            eprintln!("Skipping: {} (use -o to overwrite)", name);
        }
        EntryOutcome::SkippedDirectory => {}
    }
}

/// Write file contents to stdout, with a marker line per file when
/// more than one file is selected.
async fn pipe_files(extractor: &ZipExtractor, entries: &[CentralDirectoryEntry]) -> Result<()> {
    let files: Vec<_> = entries.iter().filter(|e| !e.is_directory()).collect();
    let show_filename = files.len() > 1;

    let mut stdout = tokio::io::stdout();
    for entry in files {
        if show_filename {
            stdout
                .write_all(format!("--- {} ---\n", entry.name).as_bytes())
                .await?;
        }
        let data = extractor
            .extract_to_memory(entry)
            .with_context(|| format!("cannot extract {}", entry.name))?;
        stdout.write_all(&data).await?;
    }
    stdout.flush().await?;

    Ok(())
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
fn list_files(entries: &[CentralDirectoryEntry], verbose: bool) {
    if verbose {
        // Print table header for verbose output
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        if !verbose {
            println!("{}", entry.name);
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        let compressed = entry.compressed_size as u64;
        let uncompressed = entry.uncompressed_size as u64;

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}{}",
            uncompressed,
            compressed,
            ratio(compressed, uncompressed),
            year,
            month,
            day,
            hour,
            minute,
            entry.name,
            if entry.is_encrypted() { " (encrypted)" } else { "" }
        );

        // Accumulate totals (excluding directories)
        if !entry.is_directory() {
            total_uncompressed += uncompressed;
            total_compressed += compressed;
            file_count += 1;
        }
    }

    // Print summary line in verbose mode
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
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!("{:>4}%", 100i64 - (compressed * 100 / uncompressed) as i64)
    } else {
        "  0%".to_string()
    }
}

/// Format a byte size into a human-readable string.
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
