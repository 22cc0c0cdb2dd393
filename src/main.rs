mod cli;

use codex::config::{self, Config};
use codex::enrichment;
use codex::events::PipelineEvent;
use codex::images::derive_key;
use codex::library::{ArtworkRef, Library};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "codex=trace,codex_common=debug".to_string()
        } else {
            "codex=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan { root, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan(config, root, json))
        }
        Commands::SetRoot { path } => set_root(cli.config.as_deref(), &path),
        Commands::Root => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            match config.library_root {
                Some(root) => println!("{}", root.display()),
                None => println!("No library root configured. Use `codex set-root PATH`."),
            }
            Ok(())
        }
        Commands::CacheKey { reference } => {
            let reference = ArtworkRef::parse(reference)
                .context("Artwork reference must not be empty")?;
            println!("{}", derive_key(&reference));
            Ok(())
        }
        Commands::Version => {
            println!("codex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn set_root(config_path: Option<&Path>, path: &Path) -> Result<()> {
    if !path.is_dir() {
        anyhow::bail!("Library root is not a directory: {:?}", path);
    }
    let root = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve library root: {:?}", path))?;
    let target = config::config_path(config_path);
    config::set_library_root(&target, &root)?;
    println!("Library root set to {}", root.display());
    Ok(())
}

async fn scan(config: Config, root: Option<PathBuf>, json: bool) -> Result<()> {
    let root = root.or_else(|| config.library_root.clone()).context(
        "No library root configured. Pass --root or run `codex set-root PATH` first.",
    )?;

    let (handle, task) = enrichment::spawn_pipeline(&config)?;
    let mut events = handle.subscribe();
    let generation = handle.rescan(&root).await?;
    tracing::info!(root = %root.display(), generation = %generation, "Scanning library");

    let ready = handle.ready();
    loop {
        match events.recv().await {
            Ok(PipelineEvent::ScanFailed { message, .. }) => {
                handle.shutdown();
                let _ = task.await;
                anyhow::bail!("Scan failed: {message}");
            }
            Ok(PipelineEvent::DownloadsSettled { generation: g }) if g == generation => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event consumer lagged");
            }
            Err(RecvError::Closed) => anyhow::bail!("Enrichment pipeline stopped unexpectedly"),
        }
    }

    // Let the cache sweep finish before exiting.
    handle.shutdown();
    task.await.context("Enrichment coordinator panicked")?;

    // Read from the watch rather than the event stream; a lagged receiver
    // may have skipped the Ready event.
    let library: Arc<Library> = ready
        .borrow()
        .as_ref()
        .filter(|snapshot| snapshot.generation == generation)
        .map(|snapshot| snapshot.library.clone())
        .context("Pipeline settled without a ready library")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&*library)?);
    } else {
        print_library(&library);
        let with_artwork = library
            .items()
            .filter(|item| item.artwork().is_some())
            .count();
        println!("\n{with_artwork} item(s) with artwork");
    }
    Ok(())
}

fn print_library(library: &Library) {
    let artwork = |r: Option<&ArtworkRef>| match r {
        Some(r) => format!("  [{r}]"),
        None => String::new(),
    };

    println!("Movies: {}", library.movies.len());
    for movie in &library.movies {
        let year = movie.year.map(|y| format!(" ({y})")).unwrap_or_default();
        println!(
            "  {}{}{}",
            movie.info.title,
            year,
            artwork(movie.info.artwork.as_ref())
        );
    }

    println!("\nShows: {}", library.shows.len());
    for show in &library.shows {
        println!("  {}{}", show.info.title, artwork(show.info.artwork.as_ref()));
        for season in &show.seasons {
            println!(
                "    {} ({} episodes){}",
                season.info.title,
                season.episodes.len(),
                artwork(season.info.artwork.as_ref())
            );
            for episode in &season.episodes {
                let number = episode
                    .number
                    .map(|n| format!("{n:>2}. "))
                    .unwrap_or_default();
                println!(
                    "      {}{}{}",
                    number,
                    episode.info.title,
                    artwork(episode.info.artwork.as_ref())
                );
            }
        }
    }

    println!("\nPodcasts: {}", library.podcasts.len());
    for series in &library.podcasts {
        println!("  {} ({} episodes)", series.info.title, series.episodes.len());
    }
}
