use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use omni_core::{
    Clients, Config,
    manager::RadioManager,
    radio::{elapsed_since_midnight, time_session},
    search::SearchKind,
    util::duration_to_hms_string,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = Config::FILENAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the catalogs and print the result as JSON
    Search {
        query: String,

        /// Guess across tracks, albums and artists instead of searching tracks
        #[arg(long)]
        top: bool,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Radio stations
    Radio {
        #[command(subcommand)]
        command: RadioCommand,
    },
    /// Extract the audio of a video to a file
    Extract { url: String, out: PathBuf },
}

#[derive(Subcommand)]
enum RadioCommand {
    /// Show what every station is playing right now
    Now,
    /// Rebuild the station file from the playlist lists
    Build,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("omni=info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let clients = Clients::new(&config);

    match args.command {
        Command::Search { query, top, limit } => {
            let search = clients.search(&config.search);
            let kind = top.then_some(SearchKind::Top);
            let Some(result) = search.resolve(&query, kind, limit).await else {
                anyhow::bail!("No results for {query:?}");
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Radio {
            command: RadioCommand::Now,
        } => {
            let groups = RadioManager::read(&config.radio.stations)
                .await
                .context("Failed to read radio stations")?;
            let elapsed = elapsed_since_midnight(chrono::Local::now());
            for group in groups {
                println!("{}", group.genre.name);
                for station in group.playlists {
                    let durations: Vec<u64> = station.tracks.iter().map(|t| t.duration).collect();
                    let Some(session) = time_session(&durations, elapsed) else {
                        println!("  {}: nothing to play", station.name);
                        continue;
                    };
                    let track = &station.tracks[session.index];
                    println!(
                        "  {}: {track} ({} left)",
                        station.name,
                        duration_to_hms_string(Duration::from_millis(session.remaining))
                    );
                }
            }
        }
        Command::Radio {
            command: RadioCommand::Build,
        } => {
            let count = RadioManager::build(
                &clients.deezer,
                &config.radio.lists,
                &config.radio.stations,
            )
            .await
            .context("Failed to build radio stations")?;
            tracing::info!(
                "Wrote {count} stations to {}",
                config.radio.stations.display()
            );
        }
        Command::Extract { url, out } => {
            let audio = clients
                .extractor
                .audio_buffer(&url)
                .await
                .with_context(|| format!("Failed to extract {url}"))?;
            tokio::fs::write(&out, &audio)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            tracing::info!("Wrote {} bytes to {}", audio.len(), out.display());
        }
    }

    Ok(())
}
