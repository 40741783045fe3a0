use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use log::debug;

use crate::config::EngineConfig;
use crate::engine::buffer::BufferPool;
use crate::io::Storage;
use crate::structs::source::AudioSource;

/// State read by the sample clock.
///
/// Every field is a single atomic value with one writer: the producer sets
/// buffers Ready and writes volume and transport flags; the consumer clears
/// Ready, moves `active` and bumps the counters.
#[derive(Debug)]
pub struct SharedState {
    pool: BufferPool,
    volume: AtomicU8,
    playing: AtomicBool,
    paused: AtomicBool,
    consumed: AtomicU64,
    underruns: AtomicU64,
}

impl SharedState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            pool: BufferPool::new(config.frame_aligned_capacity(), config.channels as usize),
            volume: AtomicU8::new(config.volume.min(100)),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            consumed: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
        }
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    pub(crate) fn set_volume(&self, volume: u8) {
        self.volume.store(volume.min(100), Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn set_transport(&self, playing: bool, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        self.playing.store(playing, Ordering::Release);
    }

    pub(crate) fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ClockStats {
        ClockStats {
            consumed: self.consumed.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}

/// Counters maintained by the sample clock since the session was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockStats {
    /// Frames taken from a Ready buffer.
    pub consumed: u64,
    /// Ticks that found the active buffer Empty while playing.
    pub underruns: u64,
}

/// Result of one producer fill step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Filled { buffer: usize, samples: usize },
    /// Both buffers are Ready.
    Idle,
    /// The source produced nothing this step but is not exhausted yet.
    Starved,
    /// No source attached, or the attached source has ended.
    Exhausted,
}

/// The controller's owned playback session: the open source, the staging
/// area it decodes into, and the state shared with the clock.
pub struct PlaybackSession<H> {
    shared: Arc<SharedState>,
    source: Option<AudioSource<H>>,
    staging: Vec<i16>,
}

impl<H> PlaybackSession<H> {
    pub fn new(config: &EngineConfig) -> Self {
        let shared = Arc::new(SharedState::new(config));
        let staging = vec![0; shared.pool().capacity()];
        Self {
            shared,
            source: None,
            staging,
        }
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn source(&self) -> Option<&AudioSource<H>> {
        self.source.as_ref()
    }

    pub(crate) fn attach(&mut self, source: AudioSource<H>) {
        debug_assert!(self.source.is_none());
        self.source = Some(source);
    }

    pub(crate) fn detach<S: Storage<Handle = H>>(&mut self, storage: &mut S) {
        if let Some(source) = self.source.take() {
            source.close(storage);
        }
    }

    /// Fills the buffer the consumer needs next.
    pub fn fill<S: Storage<Handle = H>>(&mut self, storage: &mut S) -> FillOutcome {
        let pool = self.shared.pool();
        let Some(target) = pool.fill_target() else {
            return FillOutcome::Idle;
        };
        let Some(source) = self.source.as_mut() else {
            return FillOutcome::Exhausted;
        };
        if source.is_exhausted() {
            return FillOutcome::Exhausted;
        }

        let produced = source.read_samples(storage, &mut self.staging);
        let samples = pool.publish(target, &self.staging[..produced]);
        if samples > 0 {
            debug!("Filled buffer {target} with {samples} samples");
            FillOutcome::Filled {
                buffer: target,
                samples,
            }
        } else if source.is_exhausted() {
            FillOutcome::Exhausted
        } else {
            FillOutcome::Starved
        }
    }

    /// Fills both buffers before the clock starts.
    pub fn prefill<S: Storage<Handle = H>>(&mut self, storage: &mut S) -> usize {
        let mut filled = 0;
        for _ in 0..8 {
            match self.fill(storage) {
                FillOutcome::Filled { .. } => filled += 1,
                FillOutcome::Starved => continue,
                FillOutcome::Idle | FillOutcome::Exhausted => break,
            }
            if filled == 2 {
                break;
            }
        }
        filled
    }

    /// The source has ended and the consumer has drained everything.
    pub fn is_finished(&self) -> bool {
        self.source
            .as_ref()
            .is_none_or(AudioSource::is_exhausted)
            && self.shared.pool().all_empty()
    }
}
