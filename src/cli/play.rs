use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use dacplay::config::EngineConfig;
use dacplay::engine::buffer::BufferState;
use dacplay::engine::catalog::TrackList;
use dacplay::engine::clock::{ClockDriver, ManualClock, ThreadedClock};
use dacplay::engine::controller::{PlaybackController, PlayerState, PollOutcome};
use dacplay::engine::session::FillOutcome;
use dacplay::io::{OutputSink, Storage};
use dacplay::volume_bar;
use indicatif::{MultiProgress, ProgressBar};

use super::command::{Cli, PlayArgs};
use super::progress::create_track_bar;
use super::remote::{Remote, forward_commands};
use crate::config::load_engine_config;
use crate::input::{FsStorage, scan_tracks};
use crate::timestamp::clock_str;
use crate::wav::DacWavWriter;

/// Where DAC codes go on a host without a DAC.
pub enum DacOutput {
    Wav(DacWavWriter<File>),
    Discard,
}

impl DacOutput {
    pub fn open(path: Option<&Path>, config: &EngineConfig) -> Result<Self> {
        let Some(path) = path else {
            return Ok(DacOutput::Discard);
        };
        let file = File::create(path)
            .with_context(|| format!("Cannot create output file {}", path.display()))?;
        log::info!("Recording DAC output to {}", path.display());
        Ok(DacOutput::Wav(DacWavWriter::new(
            file,
            config.sample_rate,
            config.dac_bits,
        )?))
    }

    pub fn finish(&mut self) -> io::Result<()> {
        match self {
            DacOutput::Wav(wav) => {
                wav.finish()?;
                log::info!("Wrote {} samples", wav.samples_written());
                Ok(())
            }
            DacOutput::Discard => Ok(()),
        }
    }
}

impl OutputSink for DacOutput {
    fn write_sample(&mut self, value: u16) {
        if let DacOutput::Wav(wav) = self {
            wav.write_sample(value);
        }
    }
}

pub fn cmd_play(args: &PlayArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let config = load_engine_config(cli.config.as_deref(), &args.engine)?;
    let (root, tracks) = scan_tracks(&args.input, args.max_tracks)?;
    if tracks.is_empty() {
        bail!("No tracks found in {}", args.input.display());
    }

    log::info!("{} tracks in {}", tracks.len(), root.display());
    for (index, name) in tracks.iter().enumerate() {
        log::info!("  [{index}] {name}");
    }

    let catalog = TrackList::from(tracks);
    let storage = FsStorage::new(&root);
    let output = DacOutput::open(args.output.as_deref(), &config)?;

    if args.realtime {
        play_realtime(config, catalog, storage, output, args.track)
    } else {
        play_offline(config, catalog, storage, output, args.track, multi)
    }
}

/// Plays one lap of the catalog as fast as possible, ticking the clock only
/// while the consumer has data so the recording has no gaps.
fn play_offline(
    config: EngineConfig,
    catalog: TrackList,
    storage: FsStorage,
    output: DacOutput,
    start: usize,
    multi: Option<&MultiProgress>,
) -> Result<()> {
    let mut player = PlaybackController::new(config, catalog, storage, |clock| {
        Ok(ManualClock::new(clock, output))
    })?;

    let Some(first) = start_first_playable(&mut player, start) else {
        bail!("No track in the catalog can be played");
    };
    let mut progress = TrackProgress::start(&player, multi)?;

    loop {
        match player.poll()? {
            PollOutcome::Idle => break,
            PollOutcome::Fill(FillOutcome::Filled { .. }) => continue,
            PollOutcome::Fill(_) => {}
            PollOutcome::Finished { next } => {
                progress.finish(&player);
                match next {
                    Some(index) if index != first => {
                        progress = TrackProgress::start(&player, multi)?;
                        continue;
                    }
                    _ => {
                        player.stop();
                        break;
                    }
                }
            }
        }

        let mut ticked = 0u64;
        while consumer_has_data(&player) && player.clock_mut().tick() {
            ticked += 1;
        }
        progress.advance(&player, ticked);
    }

    let stats = player.stats();
    log::info!(
        "Played {} samples ({}), {} underruns",
        stats.consumed,
        clock_str(stats.consumed, player.config().sample_rate),
        stats.underruns
    );

    let mut output = player.into_clock().into_sink();
    output.finish()?;
    Ok(())
}

/// Runs the clock on its own thread and takes commands from stdin until quit.
/// With stdin closed, returns once playback stops.
fn play_realtime(
    config: EngineConfig,
    catalog: TrackList,
    storage: FsStorage,
    output: DacOutput,
    start: usize,
) -> Result<()> {
    let idle = (config.buffer_duration() / 8)
        .clamp(Duration::from_millis(1), Duration::from_millis(20));
    let mut player = PlaybackController::new(config, catalog, storage, |clock| {
        ThreadedClock::spawn(clock, output)
    })?;

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("remote".into())
        .spawn(move || forward_commands(io::stdin().lock(), &tx))?;

    if start_first_playable(&mut player, start).is_none() {
        log::warn!("No track could be started; waiting for commands");
    }
    log::info!("Commands: play [n], pause, resume, p, stop, next, prev, vol N, +, -, quit");

    let mut input_open = true;
    loop {
        while input_open {
            match rx.try_recv() {
                Ok(Remote::Quit) => {
                    player.stop();
                    return finish_threaded(player);
                }
                Ok(Remote::Engine(command)) => {
                    let before = player.volume();
                    if let Err(e) = player.handle(command) {
                        log::warn!("{command:?}: {e}");
                    }
                    if player.volume() != before {
                        log::info!("Volume {:3}% {}", player.volume(), led_string(player.volume()));
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => input_open = false,
            }
        }

        if let PollOutcome::Finished { next: None } = player.poll()? {
            log::info!("Playback finished");
        }
        if !input_open && player.state() == PlayerState::Stopped {
            break;
        }
        thread::sleep(idle);
    }

    finish_threaded(player)
}

fn finish_threaded<S: Storage>(
    player: PlaybackController<S, ThreadedClock<DacOutput>>,
) -> Result<()> {
    let stats = player.stats();
    log::info!(
        "Played {} samples, {} underruns",
        stats.consumed,
        stats.underruns
    );
    let clock = player.into_clock();
    let mut output = clock
        .sink()
        .lock()
        .map_err(|_| anyhow::anyhow!("Sample clock panicked"))?;
    output.finish()?;
    Ok(())
}

/// Starts `start`, or the next track that opens, within one lap.
fn start_first_playable<S: Storage, C: ClockDriver>(
    player: &mut PlaybackController<S, C>,
    start: usize,
) -> Option<usize> {
    let count = player.tracks().len();
    (0..count).map(|step| (start + step) % count).find(|&index| {
        player
            .play(index)
            .map_err(|e| log::warn!("Skipping [{index}]: {e}"))
            .is_ok()
    })
}

fn consumer_has_data<S: Storage>(player: &PlaybackController<S, ManualClock<DacOutput>>) -> bool {
    let pool = player.shared().pool();
    pool.buffer(pool.active()).state() == BufferState::Ready
}

fn led_string(volume: u8) -> String {
    let bar = volume_bar(volume);
    (0..8)
        .map(|i| if bar & (1 << i) != 0 { '#' } else { '.' })
        .collect()
}

/// Per-track progress bar and summary line.
struct TrackProgress {
    bar: Option<ProgressBar>,
    base: u64,
    name: String,
}

impl TrackProgress {
    fn start<S: Storage, C: ClockDriver>(
        player: &PlaybackController<S, C>,
        multi: Option<&MultiProgress>,
    ) -> Result<Self> {
        let name = player.tracks().current().unwrap_or_default().to_string();
        let bar = match multi {
            Some(multi) => {
                let total = player.descriptor().and_then(|d| d.total_frames());
                Some(create_track_bar(multi, total, &name)?)
            }
            None => None,
        };
        Ok(Self {
            bar,
            base: player.stats().consumed,
            name,
        })
    }

    fn advance<S: Storage, C: ClockDriver>(&self, player: &PlaybackController<S, C>, ticked: u64) {
        if ticked == 0 {
            return;
        }
        if let Some(bar) = &self.bar {
            bar.set_position(player.stats().consumed - self.base);
        }
    }

    fn finish<S: Storage, C: ClockDriver>(&self, player: &PlaybackController<S, C>) {
        let played = player.stats().consumed - self.base;
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        log::info!(
            "{}: {} samples ({})",
            self.name,
            played,
            clock_str(played, player.config().sample_rate)
        );
    }
}
