use log::{debug, warn};

use crate::io::Storage;
use crate::process::decode::DecoderAdapter;
use crate::process::parse::PCM_BITS_PER_SAMPLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Fixed-header 16-bit little-endian PCM.
    RawPcm,
    /// MPEG audio frame stream.
    Compressed,
}

/// Validated stream parameters of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub kind: ContainerKind,
    pub sample_rate: u32,
    pub channels: u16,
    /// Payload size declared by the container; unknown for frame streams.
    pub payload_bytes: Option<u64>,
}

impl SourceDescriptor {
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (PCM_BITS_PER_SAMPLE / 8) as usize
    }

    /// Whole sample frames declared by the container.
    pub fn total_frames(&self) -> Option<u64> {
        self.payload_bytes
            .map(|bytes| bytes / self.bytes_per_frame().max(1) as u64)
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.total_frames()
            .map(|frames| frames as f64 / self.sample_rate.max(1) as f64)
    }
}

pub(crate) enum SourceReader {
    Pcm { scratch: Vec<u8> },
    Compressed(Box<DecoderAdapter>),
}

/// An open track: storage handle, descriptor and production state.
///
/// Lives from a successful header validation in `play` until stop, track end
/// or error, when it is closed through [`AudioSource::close`].
pub struct AudioSource<H> {
    descriptor: SourceDescriptor,
    handle: H,
    remaining: u64,
    exhausted: bool,
    reader: SourceReader,
}

impl<H> AudioSource<H> {
    pub(crate) fn new(
        descriptor: SourceDescriptor,
        handle: H,
        reader: SourceReader,
    ) -> Self {
        let remaining = descriptor.payload_bytes.unwrap_or(u64::MAX);
        Self {
            descriptor,
            handle,
            remaining,
            exhausted: remaining == 0,
            reader,
        }
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> ContainerKind {
        self.descriptor.kind
    }

    /// Payload bytes not yet read; zero once the source is exhausted.
    pub fn remaining(&self) -> u64 {
        if self.exhausted { 0 } else { self.remaining }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Produces whole frames of interleaved samples into `out`.
    ///
    /// Returns the number of samples written. A zero-length storage read or
    /// an I/O error marks the source exhausted; no further reads are issued
    /// after that.
    pub fn read_samples<S>(&mut self, storage: &mut S, out: &mut [i16]) -> usize
    where
        S: Storage<Handle = H>,
    {
        if self.exhausted {
            return 0;
        }
        let frame_bytes = self.descriptor.bytes_per_frame();
        let channels = self.descriptor.channels as usize;

        match &mut self.reader {
            SourceReader::Pcm { scratch } => {
                let want_frames = (out.len() / channels)
                    .min(scratch.len() / frame_bytes)
                    .min((self.remaining / frame_bytes as u64) as usize);
                let want = want_frames * frame_bytes;
                if want == 0 {
                    self.exhausted = true;
                    return 0;
                }

                let mut got = 0;
                while got < want {
                    match storage.read(&mut self.handle, &mut scratch[got..want]) {
                        Ok(0) => {
                            warn!(
                                "Storage returned no data with {} payload bytes outstanding",
                                self.remaining - got as u64
                            );
                            self.exhausted = true;
                            break;
                        }
                        Ok(n) => got += n,
                        Err(e) => {
                            warn!("Storage read failed, ending track: {e}");
                            self.exhausted = true;
                            break;
                        }
                    }
                }

                self.remaining -= got as u64;
                if self.remaining < frame_bytes as u64 {
                    self.exhausted = true;
                }

                let whole = got / frame_bytes * frame_bytes;
                for (sample, bytes) in out.iter_mut().zip(scratch[..whole].chunks_exact(2)) {
                    *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
                }
                whole / 2
            }
            SourceReader::Compressed(adapter) => {
                let production = adapter.produce(storage, &mut self.handle, out);
                if production.ended {
                    debug!(
                        "Frame stream ended: {} frames decoded, {} skipped",
                        adapter.frames_decoded(),
                        adapter.frames_skipped()
                    );
                    self.exhausted = true;
                }
                production.samples
            }
        }
    }

    pub fn close<S>(self, storage: &mut S)
    where
        S: Storage<Handle = H>,
    {
        storage.close(self.handle);
    }
}
