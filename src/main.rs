use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use trackdeck::utils::{progress, Config};
use trackdeck::{
    Catalog, Command, InMemoryCatalog, ManifestCatalog, PlaybackState, PlayerBuilder,
    PlayerController, PlayerError, SimulatedEngine, Track,
};

/// trackdeck - drive a playlist from the terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Track manifest (TOML with [[track]] entries)
    #[arg(short, long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Configuration file layered over the system and user files
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Position sampling interval in milliseconds
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print snapshots as JSON
    #[arg(long)]
    json: bool,

    /// Select this track as soon as the playlist is loaded
    #[arg(long, value_name = "INDEX")]
    autoplay: Option<usize>,
}

/// One line typed on stdin
#[derive(Debug, Clone, Copy, PartialEq)]
enum Input {
    Player(Command),
    List,
    Status,
    Help,
    Quit,
}

fn parse_input(line: &str) -> std::result::Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Status);
    };
    let arg = words.next();

    let input = match verb.to_ascii_lowercase().as_str() {
        "play" | "pause" | "p" => Input::Player(Command::PlayPause),
        "next" | "n" => Input::Player(Command::SeekToNext),
        "prev" | "previous" => Input::Player(Command::SeekToPrevious),
        "ff" => Input::Player(Command::SeekForward),
        "rew" => Input::Player(Command::SeekBackward),
        "stop" => Input::Player(Command::Stop),
        "seek" => {
            let pct = arg
                .ok_or("seek needs a percentage")?
                .trim_end_matches('%')
                .parse::<f32>()
                .map_err(|e| format!("bad percentage: {}", e))?;
            Input::Player(Command::SeekToPercent(pct))
        }
        "select" | "s" => {
            let index = arg
                .ok_or("select needs an index")?
                .parse::<usize>()
                .map_err(|e| format!("bad index: {}", e))?;
            Input::Player(Command::SelectIndex(index))
        }
        "list" | "ls" => Input::List,
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(input)
}

const HELP: &str = "commands: play, next, prev, seek <pct>, ff, rew, select <i>, stop, list, status, quit";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_with(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(tick_ms) = args.tick_ms {
        config.playback.tick_interval_ms = tick_ms;
    }
    if let Some(manifest) = args.manifest.clone() {
        config.catalog.manifest_path = Some(manifest);
    }
    config.validate()?;

    let log_level = if args.debug {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting trackdeck v{}", env!("CARGO_PKG_VERSION"));

    let catalog: Box<dyn Catalog> = match &config.catalog.manifest_path {
        Some(path) => Box::new(ManifestCatalog::new(path)),
        None => {
            warn!("No manifest given, using built-in demo tracks");
            Box::new(demo_catalog())
        }
    };

    let controller = PlayerBuilder::new()
        .with_config(config.playback.clone())
        .with_engine(Arc::new(SimulatedEngine::new()))
        .build()
        .await?;

    let count = controller
        .load_from_catalog(catalog.as_ref(), None)
        .await
        .context("Failed to load playlist")?;
    info!("Playlist ready with {} tracks", count);

    let json = args.json;
    let _printer = controller.subscribe_with({
        let mut last: Option<PlaybackState> = None;
        move |state| {
            if last.as_ref().map_or(true, |prev| is_notable(prev, state)) {
                print_state(state, json);
            }
            last = Some(state.clone());
        }
    });

    if let Some(index) = args.autoplay {
        if let Err(e) = controller.dispatch(Command::SelectIndex(index)).await {
            error!("Autoplay failed: {}", e);
        }
    }

    println!("{}", HELP);
    run_repl(&controller, catalog.as_ref(), json).await?;

    controller.shutdown().await?;
    info!("Goodbye");
    Ok(())
}

async fn run_repl(controller: &PlayerController, catalog: &dyn Catalog, json: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Ok(Input::Player(command)) => match controller.dispatch(command).await {
                Ok(()) => {}
                Err(PlayerError::Validation(e)) => println!("! {}", e),
                Err(e) => return Err(e.into()),
            },
            Ok(Input::List) => print_playlist(catalog, &controller.current_state(), json),
            Ok(Input::Status) => print_state(&controller.current_state(), json),
            Ok(Input::Help) => println!("{}", HELP),
            Ok(Input::Quit) => break,
            Err(message) => println!("! {}\n{}", message, HELP),
        }
    }
    Ok(())
}

/// Changes worth printing unprompted; plain position ticks are not
fn is_notable(prev: &PlaybackState, next: &PlaybackState) -> bool {
    prev.current_index != next.current_index
        || prev.phase != next.phase
        || prev.is_playing != next.is_playing
        || prev.last_error != next.last_error
        || prev.playlist_len != next.playlist_len
}

fn print_state(state: &PlaybackState, json: bool) {
    if json {
        match serde_json::to_string(state) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to encode state: {}", e),
        }
        return;
    }

    let title = state
        .track
        .as_ref()
        .map(|t| {
            if t.artist.is_empty() {
                t.title.clone()
            } else {
                format!("{} - {}", t.title, t.artist)
            }
        })
        .unwrap_or_else(|| "(nothing selected)".to_string());
    let position = state
        .current_index
        .map(|i| format!("{}/{}", i + 1, state.playlist_len))
        .unwrap_or_else(|| format!("-/{}", state.playlist_len));

    println!(
        "[{:?}{}] {} {}  {} / {} ({:.1}%)",
        state.phase,
        if state.is_playing { ", playing" } else { "" },
        position,
        title,
        state.elapsed,
        state.total(),
        state.percent
    );
    if let Some(err) = &state.last_error {
        println!("  last error: {}", err);
    }
}

fn print_playlist(catalog: &dyn Catalog, state: &PlaybackState, json: bool) {
    let tracks = match catalog.list_available_tracks() {
        Ok(tracks) => tracks,
        Err(e) => {
            println!("! {}", e);
            return;
        }
    };

    if json {
        let summary = serde_json::json!({
            "current_index": state.current_index,
            "tracks": tracks,
        });
        println!("{}", summary);
        return;
    }

    let current = state.track.as_ref().map(|t| &t.id);
    for (i, track) in tracks.iter().enumerate() {
        let marker = if current == Some(&track.id) { '>' } else { ' ' };
        println!(
            "{} {:>2}. {} ({})",
            marker,
            i,
            track.title,
            progress::format(track.duration_ms as i64)
        );
    }
}

fn demo_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(vec![
        Track::new("demo-1", "demo://one", "Opening").with_duration_ms(95_000),
        Track::new("demo-2", "demo://two", "Interlude").with_duration_ms(42_000),
        Track::new("demo-3", "demo://three", "Finale")
            .with_artist("trackdeck")
            .with_duration_ms(180_000),
    ])
}
