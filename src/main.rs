use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use riddim::audio::{self, AudioHandle};
use riddim::config::Config;
use riddim::loader::sample_loader::WavLoader;
use riddim::pipeline::clock::SystemClock;
use riddim::pipeline::persistence::{JsonFileStore, RecordingStore};
use riddim::pipeline::sample_store::SampleStore;
use riddim::shared::SessionEvent;
use riddim::Session;

const TICK: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[clap(version, about = "Reggae step sequencer and sampler.")]
struct Cli {
    /// Project directory holding samples/ and .riddim/ (defaults to the current directory).
    #[arg(short, long)]
    project: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available patterns.
    Patterns {},
    /// Loops a pattern through the audio output.
    Play {
        /// The name of the pattern to play.
        pattern: String,
        /// Tempo in beats per minute, overrides the config.
        #[arg(short, long)]
        bpm: Option<f64>,
        /// How long to play for.
        #[arg(short, long, default_value_t = 8.0)]
        seconds: f64,
    },
    /// Replays a saved recording.
    Replay {
        /// The name the recording was saved under.
        name: String,
        /// Give up after this long even if the replay hasn't finished.
        #[arg(short, long, default_value_t = 60.0)]
        seconds: f64,
    },
    /// Lists saved recordings.
    Recordings {},
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let project_dir = match cli.project {
        Some(p) => p,
        None => std::env::current_dir().context("no current directory")?,
    };
    let config = Config::load(&project_dir)?;
    let recordings = JsonFileStore::for_project(&project_dir);

    match cli.command {
        Commands::Patterns {} => {
            let lib = config.pattern_library()?;
            println!("Patterns (count: {}):", lib.len());
            for name in lib.names() {
                println!("- {}", name);
            }
        }
        Commands::Recordings {} => {
            let names = recordings.names()?;
            if names.is_empty() {
                println!("No recordings in {}.", recordings.path().display());
                return Ok(());
            }
            println!("Recordings:");
            for name in names {
                println!("- {}", name);
            }
        }
        Commands::Play { pattern, bpm, seconds } => {
            let mut session = open_session(&config)?;
            if let Some(bpm) = bpm {
                session.set_tempo(bpm)?;
            }
            session.play_pattern(&pattern)?;
            run_loop(&mut session, play_time(seconds)?, |_| false);
            session.stop_pattern();
        }
        Commands::Replay { name, seconds } => {
            let mut session = open_session(&config)?;
            let record = session
                .load_recording(&recordings, &name)?
                .with_context(|| format!("no recording named \"{name}\""))?;
            info!(name = %name, events = record.events.len(), date = %record.date, "replaying");
            session.set_tempo(record.tempo)?;
            session.play_recording(&record.events)?;
            run_loop(&mut session, play_time(seconds)?, |e| *e == SessionEvent::ReplayFinished);
            session.stop_playback();
        }
    }
    Ok(())
}

fn play_time(seconds: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(seconds).with_context(|| format!("invalid duration {seconds}"))
}

fn open_session(config: &Config) -> anyhow::Result<Session<AudioHandle, SystemClock>> {
    let audio = audio::start_audio()?;
    let store = load_samples(config, &config.samples_dir, audio.sample_rate());
    let session = Session::new(store, config.pattern_library()?, audio, SystemClock::new(), config.settings)?;
    Ok(session)
}

fn load_samples(config: &Config, root: &Path, sample_rate: u32) -> SampleStore {
    let loader = WavLoader::new(root, sample_rate);
    let (mut store, report) = SampleStore::load(&config.manifest, &config.fallbacks, &loader, |p| {
        tracing::debug!(percent = p, "loading samples");
    });
    if !report.is_complete() {
        // one more pass, a sample may have been mid-copy on the first one
        let retried = store.retry(&report.failed_definitions(), &config.fallbacks, &loader, |_| {});
        for u in &retried.unresolved {
            warn!("{}", u.to_error());
        }
    }
    store
}

// keep ticking until the time is up or `done` says so
fn run_loop(
    session: &mut Session<AudioHandle, SystemClock>,
    limit: Duration,
    mut done: impl FnMut(&SessionEvent) -> bool,
) {
    let start = Instant::now();
    while start.elapsed() < limit {
        for event in session.tick() {
            match &event {
                SessionEvent::Step { pattern, step } => tracing::debug!(pattern = %pattern, step, "step"),
                SessionEvent::Missing(instrument) => tracing::debug!(%instrument, "missing sample"),
                SessionEvent::ReplayFinished => info!("replay finished"),
            }
            if done(&event) {
                return;
            }
        }
        std::thread::sleep(TICK);
    }
}
