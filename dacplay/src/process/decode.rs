use log::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::io::Storage;
use crate::process::extract::{
    FRAME_HEADER_LEN, FrameHeader, MAX_FRAME_LEN, find_frame_sync, id3v2_len,
};
use crate::utils::errors::{FrameError, StorageError};

/// Size of the read-ahead byte window; holds at least two maximal frames.
pub const WINDOW_CAPACITY: usize = 8192;

const _: () = assert!(WINDOW_CAPACITY >= 2 * MAX_FRAME_LEN);

/// Frame-by-frame codec collaborator.
///
/// `window` starts at a validated frame header and holds at least the whole
/// frame declared by that header, followed by whatever has been read ahead.
/// The adapter advances past exactly one frame after a successful decode.
/// `Underflow` asks for more read-ahead before the same frame is retried.
/// Decoded samples are written interleaved into `out`, which always has room
/// for one full frame.
pub trait FrameCodec: Send {
    fn decode_frame(&mut self, window: &[u8], out: &mut [i16]) -> Result<usize, FrameError>;
}

/// Builds a fresh codec instance for each compressed track.
pub type CodecFactory = Box<dyn Fn() -> Option<Box<dyn FrameCodec>> + Send>;

/// Result of one production step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Production {
    pub samples: usize,
    /// The stream has ended; no further production will yield samples.
    pub ended: bool,
}

enum Pull {
    Data,
    Empty,
    Full,
}

/// Feeds a frame codec from storage through a fixed read-ahead window.
///
/// Frame boundaries are located with [`find_frame_sync`]. Corrupt frames are
/// skipped; a run of `max_consecutive_decode_errors` corrupt frames, or
/// `eof_retry_limit` consecutive empty reads, ends the stream.
pub struct DecoderAdapter {
    codec: Box<dyn FrameCodec>,
    window: Vec<u8>,
    start: usize,
    end: usize,
    layout: Option<(u32, u16)>,
    eof_reads: u32,
    eof_retry_limit: u32,
    corrupt_run: u32,
    max_corrupt_run: u32,
    frames_decoded: u64,
    frames_skipped: u64,
    ended: bool,
}

impl DecoderAdapter {
    pub fn new(codec: Box<dyn FrameCodec>, config: &EngineConfig) -> Self {
        Self {
            codec,
            window: vec![0; WINDOW_CAPACITY],
            start: 0,
            end: 0,
            layout: None,
            eof_reads: 0,
            eof_retry_limit: config.eof_retry_limit.max(1),
            corrupt_run: 0,
            max_corrupt_run: config.max_consecutive_decode_errors.max(1),
            frames_decoded: 0,
            frames_skipped: 0,
            ended: false,
        }
    }

    /// Loads bytes already read from the stream (the container header read at open).
    pub fn seed(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.window.len() - self.end);
        self.window[self.end..self.end + n].copy_from_slice(&bytes[..n]);
        self.end += n;
    }

    /// Restricts decoding to frames of the validated sample rate and channel
    /// count; any other frame is skipped as corrupt.
    pub fn expect_layout(&mut self, sample_rate: u32, channels: u16) {
        self.layout = Some((sample_rate, channels));
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Skips a leading ID3v2 tag and positions the window on the first
    /// frame header, scanning at most `scan_limit` bytes.
    ///
    /// Returns `Ok(None)` when no frame sync is found before the limit or the
    /// end of the stream.
    pub fn locate_first_frame<S: Storage>(
        &mut self,
        storage: &mut S,
        handle: &mut S::Handle,
        scan_limit: usize,
    ) -> Result<Option<FrameHeader>, StorageError> {
        if let Some(tag_len) = id3v2_len(&self.window[self.start..self.end]) {
            let buffered = self.end - self.start;
            if tag_len <= buffered {
                self.start += tag_len;
            } else {
                self.start = 0;
                self.end = 0;
                self.discard(storage, handle, tag_len - buffered)?;
            }
            debug!("Skipped {tag_len}-byte ID3v2 tag");
        }

        let mut scanned = 0;
        loop {
            if let Some(offset) = find_frame_sync(&self.window[self.start..self.end]) {
                self.start += offset;
                return Ok(FrameHeader::parse(&self.window[self.start..self.end]));
            }

            scanned += (self.end - self.start).saturating_sub(FRAME_HEADER_LEN - 1);
            if scanned > scan_limit {
                return Ok(None);
            }
            self.keep_tail();
            self.compact();
            let n = storage.read(handle, &mut self.window[self.end..])?;
            if n == 0 {
                return Ok(None);
            }
            self.end += n;
        }
    }

    /// Decodes as many frames as fit into `out`.
    pub fn produce<S: Storage>(
        &mut self,
        storage: &mut S,
        handle: &mut S::Handle,
        out: &mut [i16],
    ) -> Production {
        let mut filled = 0;

        while !self.ended {
            let Some(offset) = find_frame_sync(&self.window[self.start..self.end]) else {
                self.keep_tail();
                match self.pull(storage, handle) {
                    Pull::Data => continue,
                    Pull::Empty | Pull::Full => break,
                }
            };
            self.start += offset;

            let Some(header) = FrameHeader::parse(&self.window[self.start..self.end]) else {
                self.start += 1;
                continue;
            };
            let frame_len = header.frame_len();
            let frame_samples = header.samples_per_frame() * header.channels() as usize;
            let layout_matches = self
                .layout
                .is_none_or(|layout| layout == (header.sample_rate, header.channels()));
            if !layout_matches || frame_samples > out.len() {
                debug!(
                    "Frame of {} Hz, {} ch, {frame_samples} samples does not fit the stream",
                    header.sample_rate,
                    header.channels()
                );
                self.skip_corrupt(frame_len);
                continue;
            }
            if out.len() - filled < frame_samples {
                break;
            }

            if self.end - self.start < frame_len {
                match self.pull(storage, handle) {
                    Pull::Data => continue,
                    Pull::Full => {
                        self.skip_corrupt(1);
                        continue;
                    }
                    Pull::Empty => break,
                }
            }

            let window = &self.window[self.start..self.end];
            match self.codec.decode_frame(window, &mut out[filled..]) {
                Ok(n) => {
                    trace!("Decoded {frame_len}-byte frame into {n} samples");
                    filled += n.min(out.len() - filled);
                    self.start += frame_len;
                    self.corrupt_run = 0;
                    self.eof_reads = 0;
                    self.frames_decoded += 1;
                }
                Err(FrameError::Underflow) => match self.pull(storage, handle) {
                    Pull::Data => continue,
                    Pull::Full => self.skip_corrupt(frame_len),
                    Pull::Empty => break,
                },
                Err(FrameError::Corrupt) => self.skip_corrupt(frame_len),
            }
        }

        Production {
            samples: filled,
            ended: self.ended,
        }
    }

    fn skip_corrupt(&mut self, len: usize) {
        self.start = (self.start + len).min(self.end);
        self.corrupt_run += 1;
        self.frames_skipped += 1;
        debug!(
            "Skipped corrupt frame ({} in a row, {} total)",
            self.corrupt_run, self.frames_skipped
        );
        if self.corrupt_run >= self.max_corrupt_run {
            warn!(
                "{} consecutive corrupt frames, ending stream",
                self.corrupt_run
            );
            self.ended = true;
        }
    }

    /// Drops consumed bytes except those that may hold a split frame header.
    fn keep_tail(&mut self) {
        let keep = (self.end - self.start).min(FRAME_HEADER_LEN - 1);
        self.start = self.end - keep;
    }

    fn compact(&mut self) {
        if self.start > 0 {
            self.window.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
    }

    fn pull<S: Storage>(&mut self, storage: &mut S, handle: &mut S::Handle) -> Pull {
        self.compact();
        if self.end == self.window.len() {
            return Pull::Full;
        }
        match storage.read(handle, &mut self.window[self.end..]) {
            Ok(0) => self.empty_read(),
            Ok(n) => {
                self.end += n;
                self.eof_reads = 0;
                Pull::Data
            }
            Err(e) => {
                warn!("Storage read failed during frame decode: {e}");
                self.empty_read()
            }
        }
    }

    fn empty_read(&mut self) -> Pull {
        self.eof_reads += 1;
        if self.eof_reads >= self.eof_retry_limit {
            debug!("{} consecutive empty reads, ending stream", self.eof_reads);
            self.ended = true;
        }
        Pull::Empty
    }

    fn discard<S: Storage>(
        &mut self,
        storage: &mut S,
        handle: &mut S::Handle,
        mut len: usize,
    ) -> Result<(), StorageError> {
        while len > 0 {
            let chunk = len.min(self.window.len());
            let n = storage.read(handle, &mut self.window[..chunk])?;
            if n == 0 {
                break;
            }
            len -= n;
        }
        Ok(())
    }
}
