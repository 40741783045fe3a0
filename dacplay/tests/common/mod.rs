#![allow(dead_code)]

use dacplay::config::EngineConfig;
use dacplay::engine::catalog::TrackList;
use dacplay::engine::clock::ManualClock;
use dacplay::engine::controller::{PlaybackController, PollOutcome};
use dacplay::io::{MemoryHandle, MemoryStorage, Storage};
use dacplay::process::parse::pcm_header;
use dacplay::utils::errors::StorageError;

pub type Player<S> = PlaybackController<S, ManualClock<Vec<u16>>>;

/// Deterministic full-range test signal.
pub fn signal(len: usize) -> Vec<i16> {
    (0..len)
        .map(|i| (i.wrapping_mul(2_654_435_761) % 65_536) as i32 - 32_768)
        .map(|s| s as i16)
        .collect()
}

pub fn pcm_track(samples: &[i16]) -> Vec<u8> {
    let mut bytes = pcm_header(8000, 1, (samples.len() * 2) as u32).to_vec();
    bytes.extend(samples.iter().flat_map(|s| s.to_le_bytes()));
    bytes
}

pub fn memory_storage(files: &[(&str, Vec<u8>)]) -> MemoryStorage {
    let mut storage = MemoryStorage::new();
    for (name, bytes) in files {
        storage.insert(*name, bytes.clone());
    }
    storage
}

pub fn player<S: Storage>(names: &[&str], storage: S, config: EngineConfig) -> Player<S> {
    let tracks: TrackList = names.iter().copied().collect();
    PlaybackController::new(config, tracks, storage, |clock| {
        Ok(ManualClock::new(clock, Vec::<u16>::new()))
    })
    .expect("valid engine configuration")
}

/// Alternates one clock tick with one foreground poll until the current track
/// finishes; returns the number of ticks.
pub fn run_to_finish<S: Storage>(player: &mut Player<S>, max_ticks: usize) -> Option<usize> {
    for tick in 1..=max_ticks {
        player.clock_mut().tick();
        if let PollOutcome::Finished { .. } = player.poll().ok()? {
            return Some(tick);
        }
    }
    None
}

/// Storage wrapper that can cut a stream short, fail reads, deliver short
/// reads, and count every read issued.
#[derive(Debug, Default)]
pub struct ScriptedStorage {
    inner: MemoryStorage,
    /// Stream offset after which reads return no data.
    pub cut_at: Option<usize>,
    /// Return an I/O error instead of `Ok(0)` past the cut.
    pub fail_past_cut: bool,
    /// Upper bound on bytes delivered per read.
    pub chunk: Option<usize>,
    pub reads: usize,
    pub reads_past_cut: usize,
}

pub struct ScriptedHandle {
    inner: MemoryHandle,
    offset: usize,
}

impl ScriptedStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn open_handles(&self) -> usize {
        self.inner.open_handles()
    }
}

impl Storage for ScriptedStorage {
    type Handle = ScriptedHandle;

    fn open(&mut self, name: &str) -> Result<ScriptedHandle, StorageError> {
        Ok(ScriptedHandle {
            inner: self.inner.open(name)?,
            offset: 0,
        })
    }

    fn read(&mut self, handle: &mut ScriptedHandle, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.reads += 1;
        let mut len = buf.len();
        if let Some(chunk) = self.chunk {
            len = len.min(chunk);
        }
        if let Some(cut) = self.cut_at {
            if handle.offset >= cut {
                self.reads_past_cut += 1;
                if self.fail_past_cut {
                    return Err(StorageError::Io(std::io::Error::other("injected fault")));
                }
                return Ok(0);
            }
            len = len.min(cut - handle.offset);
        }
        let n = self.inner.read(&mut handle.inner, &mut buf[..len])?;
        handle.offset += n;
        Ok(n)
    }

    fn close(&mut self, handle: ScriptedHandle) {
        self.inner.close(handle.inner);
    }
}
