use std::fmt::Display;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{EndOfTrackPolicy, EngineConfig};
use crate::engine::catalog::TrackList;
use crate::engine::clock::{ClockDriver, OutputScaler, SampleClock};
use crate::engine::session::{ClockStats, FillOutcome, PlaybackSession, SharedState};
use crate::io::Storage;
use crate::process::decode::{CodecFactory, DecoderAdapter};
use crate::process::parse::{PCM_BITS_PER_SAMPLE, PCM_HEADER_LEN, Parser};
use crate::structs::source::{AudioSource, ContainerKind, SourceDescriptor, SourceReader};
use crate::utils::errors::{EngineError, FormatError};

/// Bytes scanned for the first frame header of a compressed track.
const SYNC_SCAN_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Loading,
    Playing,
    Paused,
}

impl Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Stopped => write!(f, "Stopped"),
            PlayerState::Loading => write!(f, "Loading"),
            PlayerState::Playing => write!(f, "Playing"),
            PlayerState::Paused => write!(f, "Paused"),
        }
    }
}

/// Discrete transport and volume commands from input collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Play the current catalog entry.
    Play,
    PlayTrack(usize),
    Pause,
    Resume,
    TogglePause,
    Stop,
    Next,
    Previous,
    SetVolume(i32),
    VolumeUp,
    VolumeDown,
}

/// What one foreground iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No track is loaded.
    Idle,
    Fill(FillOutcome),
    /// The current track drained completely. `next` is the track started in
    /// its place, if any.
    Finished { next: Option<usize> },
}

/// The transport state machine.
///
/// Owns the storage reader, the clock driver and the single playback session,
/// and serializes every transition through `&mut self`. Each transition that
/// touches consumer-visible state disables the clock first.
pub struct PlaybackController<S: Storage, C: ClockDriver> {
    config: EngineConfig,
    parser: Parser,
    tracks: TrackList,
    storage: S,
    clock: C,
    session: PlaybackSession<S::Handle>,
    state: PlayerState,
    codec_factory: Option<CodecFactory>,
}

impl<S: Storage, C: ClockDriver> PlaybackController<S, C> {
    /// Validates `config`, allocates the session and hands the sample clock to
    /// `make_clock` to be wrapped in a driver.
    pub fn new(
        config: EngineConfig,
        tracks: TrackList,
        storage: S,
        make_clock: impl FnOnce(SampleClock) -> std::io::Result<C>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let session = PlaybackSession::new(&config);
        let scaler = OutputScaler::new(config.gain_q8, config.dac_bits);
        let clock = make_clock(SampleClock::new(Arc::clone(session.shared()), scaler))?;

        Ok(Self {
            parser: Parser::from(&config),
            config,
            tracks,
            storage,
            clock,
            session,
            state: PlayerState::Stopped,
            codec_factory: default_codec_factory(),
        })
    }

    /// Installs the codec used for compressed tracks.
    pub fn with_codec(mut self, factory: CodecFactory) -> Self {
        self.codec_factory = Some(factory);
        self
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracks(&self) -> &TrackList {
        &self.tracks
    }

    pub fn current_index(&self) -> usize {
        self.tracks.current_index()
    }

    pub fn volume(&self) -> u8 {
        self.session.shared().volume()
    }

    pub fn stats(&self) -> ClockStats {
        self.session.shared().stats()
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        self.session.shared()
    }

    /// Descriptor of the loaded track.
    pub fn descriptor(&self) -> Option<&SourceDescriptor> {
        self.session.source().map(AudioSource::descriptor)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Stops playback, closes any open source and returns the clock driver.
    pub fn into_clock(mut self) -> C {
        self.shutdown();
        self.clock
    }

    /// Starts `index` from the beginning, stopping whatever is playing.
    ///
    /// On any error the controller is left `Stopped` with no source open.
    pub fn play(&mut self, index: usize) -> Result<(), EngineError> {
        if self.tracks.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }
        let Some(name) = self.tracks.get(index).map(str::to_string) else {
            return Err(EngineError::InvalidTrack {
                index,
                count: self.tracks.len(),
            });
        };

        self.shutdown();
        self.tracks.select(index);
        self.state = PlayerState::Loading;

        let source = match self.open_source(&name) {
            Ok(source) => source,
            Err(e) => {
                warn!("Cannot play {name}: {e}");
                self.state = PlayerState::Stopped;
                return Err(e);
            }
        };
        let descriptor = *source.descriptor();
        self.session.attach(source);
        let prefilled = self.session.prefill(&mut self.storage);
        debug!("Prefilled {prefilled} buffers");

        self.clock.set_sample_rate(descriptor.sample_rate);
        self.session.shared().set_transport(true, false);
        self.clock.enable();
        self.state = PlayerState::Playing;

        info!(
            "Playing [{index}] {name}: {:?}, {} Hz, {} ch",
            descriptor.kind, descriptor.sample_rate, descriptor.channels
        );
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing {
            self.ignore("pause");
            return;
        }
        self.clock.disable();
        self.session.shared().set_transport(true, true);
        self.state = PlayerState::Paused;
        info!("Paused");
    }

    pub fn resume(&mut self) {
        if self.state != PlayerState::Paused {
            self.ignore("resume");
            return;
        }
        self.session.shared().set_transport(true, false);
        self.clock.enable();
        self.state = PlayerState::Playing;
        info!("Resumed");
    }

    pub fn stop(&mut self) {
        if !matches!(self.state, PlayerState::Playing | PlayerState::Paused) {
            self.ignore("stop");
            return;
        }
        self.shutdown();
        self.clock.write_silence();
        info!("Stopped");
    }

    pub fn next(&mut self) -> Result<(), EngineError> {
        match self.tracks.next_index() {
            Some(index) => self.change_track(index),
            None => {
                self.ignore("next");
                Ok(())
            }
        }
    }

    pub fn previous(&mut self) -> Result<(), EngineError> {
        match self.tracks.previous_index() {
            Some(index) => self.change_track(index),
            None => {
                self.ignore("previous");
                Ok(())
            }
        }
    }

    /// Clamps to `0..=100`; the clock sees the new value on its next tick.
    pub fn set_volume(&mut self, volume: i32) {
        let volume = volume.clamp(0, 100) as u8;
        self.session.shared().set_volume(volume);
        debug!("Volume {volume}%");
    }

    pub fn handle(&mut self, command: Command) -> Result<(), EngineError> {
        debug!("Command {command:?} in state {}", self.state);
        match command {
            Command::Play => match self.state {
                PlayerState::Paused => self.resume(),
                PlayerState::Playing => self.ignore("play"),
                _ => self.play(self.tracks.current_index())?,
            },
            Command::PlayTrack(index) => self.play(index)?,
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::TogglePause => match self.state {
                PlayerState::Playing => self.pause(),
                PlayerState::Paused => self.resume(),
                _ => self.ignore("toggle pause"),
            },
            Command::Stop => self.stop(),
            Command::Next => self.next()?,
            Command::Previous => self.previous()?,
            Command::SetVolume(volume) => self.set_volume(volume),
            Command::VolumeUp => {
                self.set_volume(self.volume() as i32 + self.config.volume_step as i32)
            }
            Command::VolumeDown => {
                self.set_volume(self.volume() as i32 - self.config.volume_step as i32)
            }
        }
        Ok(())
    }

    /// One foreground iteration: refill, then end-of-track detection.
    pub fn poll(&mut self) -> Result<PollOutcome, EngineError> {
        if !matches!(self.state, PlayerState::Playing | PlayerState::Paused) {
            return Ok(PollOutcome::Idle);
        }
        let fill = self.session.fill(&mut self.storage);
        if self.state == PlayerState::Playing && self.session.is_finished() {
            return self.finish_track();
        }
        Ok(PollOutcome::Fill(fill))
    }

    fn finish_track(&mut self) -> Result<PollOutcome, EngineError> {
        let finished = self.tracks.current_index();
        info!(
            "Finished [{finished}] {}",
            self.tracks.get(finished).unwrap_or_default()
        );
        self.shutdown();

        if self.config.end_of_track == EndOfTrackPolicy::Stop {
            self.clock.write_silence();
            return Ok(PollOutcome::Finished { next: None });
        }

        // Rejected tracks are skipped; one full lap without a playable track stops.
        let count = self.tracks.len();
        for step in 1..=count {
            let index = (finished + step) % count;
            if self.play(index).is_ok() {
                return Ok(PollOutcome::Finished { next: Some(index) });
            }
        }
        self.clock.write_silence();
        Ok(PollOutcome::Finished { next: None })
    }

    fn change_track(&mut self, index: usize) -> Result<(), EngineError> {
        if matches!(self.state, PlayerState::Playing | PlayerState::Paused) {
            self.play(index)
        } else {
            self.tracks.select(index);
            debug!("Selected track {index}");
            Ok(())
        }
    }

    /// Disables the clock, then tears down the source and buffers.
    fn shutdown(&mut self) {
        self.clock.disable();
        self.session.shared().set_transport(false, false);
        self.session.detach(&mut self.storage);
        self.session.shared().pool().reset();
        self.state = PlayerState::Stopped;
    }

    fn ignore(&self, transition: &str) {
        debug!("Ignoring {transition} while {}", self.state);
    }

    fn open_source(&mut self, name: &str) -> Result<AudioSource<S::Handle>, EngineError> {
        let mut handle = self.storage.open(name)?;
        match self.read_descriptor(&mut handle) {
            Ok((descriptor, reader)) => Ok(AudioSource::new(descriptor, handle, reader)),
            Err(e) => {
                self.storage.close(handle);
                Err(e)
            }
        }
    }

    fn read_descriptor(
        &mut self,
        handle: &mut S::Handle,
    ) -> Result<(SourceDescriptor, SourceReader), EngineError> {
        let mut head = [0u8; PCM_HEADER_LEN];
        let n = self.storage.read_full(handle, &mut head)?;
        let bytes = &head[..n];
        let capacity = self.session.shared().pool().capacity();

        match Parser::detect(bytes)? {
            ContainerKind::RawPcm => {
                let descriptor = self.parser.parse_header(bytes)?;
                let scratch = vec![0; capacity * (PCM_BITS_PER_SAMPLE / 8) as usize];
                Ok((descriptor, SourceReader::Pcm { scratch }))
            }
            ContainerKind::Compressed => {
                let codec = self
                    .codec_factory
                    .as_ref()
                    .and_then(|factory| factory())
                    .ok_or(FormatError::CodecUnavailable)?;
                let mut adapter = Box::new(DecoderAdapter::new(codec, &self.config));
                adapter.seed(bytes);

                let header = adapter
                    .locate_first_frame(&mut self.storage, handle, SYNC_SCAN_LIMIT)?
                    .ok_or(FormatError::NotRecognizedContainer)?;
                let descriptor = self.parser.parse_frame_descriptor(&header)?;
                adapter.expect_layout(descriptor.sample_rate, descriptor.channels);

                let needed = header.samples_per_frame() * header.channels() as usize;
                if needed > capacity {
                    return Err(FormatError::BufferTooSmall { needed, capacity }.into());
                }
                Ok((descriptor, SourceReader::Compressed(adapter)))
            }
        }
    }
}

#[cfg(feature = "symphonia")]
fn default_codec_factory() -> Option<CodecFactory> {
    Some(crate::process::codec::SymphoniaMpaCodec::factory())
}

#[cfg(not(feature = "symphonia"))]
fn default_codec_factory() -> Option<CodecFactory> {
    None
}
