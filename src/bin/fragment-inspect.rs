//! Fragment Inspector
//!
//! Prints the book-keeping catalog of committed fragments

use anyhow::{Context, Result};
use clap::Parser;
use fragment_catalog::codec::encode_catalog_with_stats;
use fragment_catalog::fragment::BOOK_KEEPING_FILE;
use fragment_catalog::{list_fragments, CatalogConfig, FragmentReader};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fragment-inspect")]
#[command(about = "Inspect fragment book-keeping catalogs")]
struct Args {
    /// Fragment directory, or an array directory with --all
    path: PathBuf,

    /// Treat PATH as an array directory and inspect every committed fragment
    #[arg(short, long)]
    all: bool,

    /// Print every tile offset instead of per-attribute counts
    #[arg(short, long)]
    offsets: bool,

    /// Catalog configuration file (TOML); report the metadata size each
    /// fragment would have if re-encoded with these settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn print_fragment(path: &Path, show_offsets: bool, config: Option<&CatalogConfig>) -> Result<()> {
    let fragment = FragmentReader::open(path)
        .with_context(|| format!("failed to open fragment {}", path.display()))?;
    let catalog = fragment.catalog();

    println!("fragment {}", fragment.id());
    println!("  path: {}", fragment.dir().display());
    println!("  range: {} bytes ({})", fragment.range().len(), hex::encode(fragment.range()));
    println!("  attributes: {}", catalog.attribute_count());

    for attribute in 0..catalog.attribute_count() {
        let offsets = catalog.tile_offsets(attribute)?;
        if show_offsets {
            println!("    [{}] {:?}", attribute, offsets);
        } else {
            println!("    [{}] {} tiles", attribute, offsets.len());
        }
    }

    if let Some(config) = config {
        let current = std::fs::metadata(path.join(BOOK_KEEPING_FILE))?.len();
        let (_, stats) = encode_catalog_with_stats(catalog, io::sink(), config)?;
        println!(
            "  re-encoded ({:?}, {} byte chunks): {} bytes in {} chunks, currently {} bytes",
            config.compression, config.chunk_size, stats.stored_len, stats.chunks, current
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(config_path) => {
            let config = CatalogConfig::from_file(config_path)
                .with_context(|| format!("failed to load config {}", config_path.display()))?;
            info!("Using config from {:?}", config_path);
            Some(config)
        }
        None => None,
    };

    if args.all {
        let fragments = list_fragments(&args.path)
            .with_context(|| format!("failed to list {}", args.path.display()))?;
        info!("Found {} committed fragments", fragments.len());
        for (_, path) in fragments {
            print_fragment(&path, args.offsets, config.as_ref())?;
        }
    } else {
        print_fragment(&args.path, args.offsets, config.as_ref())?;
    }

    Ok(())
}
