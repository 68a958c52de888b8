//! Main entry point for the dfunpack CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;

use dfunpack::df::COMPRESSED_MARKER;
use dfunpack::{Cli, DfExtractor, DfParser, DirectoryKind, LocalFileReader, ReadAt};

/// Runs everything on one thread; entries are extracted strictly in
/// directory order.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    pretty_env_logger::formatted_builder()
        .filter_level(cli.log_level())
        .parse_env("RUST_LOG")
        .init();

    if cli.is_list() {
        return list_files(&cli).await;
    }

    let extractor = DfExtractor::new(cli.extract_options());
    let report = extractor
        .extract_file(&cli.archive)
        .await
        .with_context(|| format!("Failed to extract {}", cli.archive.display()))?;

    info!(
        "Done: {} files written ({} inflated, {} truncated), {} skipped, {} nested archives",
        report.extracted, report.compressed, report.truncated, report.skipped, report.archives
    );

    Ok(())
}

/// Print the root directory.
///
/// The verbose form adds offsets and peeks at each payload's first byte to
/// show whether it is stored or compressed.
async fn list_files(cli: &Cli) -> Result<()> {
    let reader = Arc::new(LocalFileReader::new(&cli.archive)?);
    let parser = DfParser::new(reader);
    let entries = parser
        .read_directory(DirectoryKind::Root)
        .await
        .with_context(|| format!("Failed to read directory of {}", cli.archive.display()))?;

    if cli.verbose {
        println!("{:>10}  {:>10}  {:>7}  Name", "Offset", "Size", "Kind");
        println!("{}", "-".repeat(50));
    }

    let mut total_size = 0u64;
    for entry in &entries {
        if cli.verbose {
            let mut marker = [0u8; 1];
            let kind = match parser.reader().read_at(entry.offset(), &mut marker).await? {
                0 => "missing",
                _ if marker[0] == COMPRESSED_MARKER => "deflate",
                _ => "stored",
            };
            let nested = if entry.is_nested_archive() { "  [archive]" } else { "" };
            println!(
                "{:>10}  {:>10}  {:>7}  {}{}",
                entry.offset(),
                entry.size(),
                kind,
                entry.name(),
                nested
            );
            total_size += entry.size();
        } else {
            println!("{}", entry.name());
        }
    }

    if cli.verbose {
        println!("{}", "-".repeat(50));
        println!(
            "{:>10}  {:>10}  {:>7}  {} files",
            "",
            total_size,
            "",
            entries.len()
        );
    }

    Ok(())
}
