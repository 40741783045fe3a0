use crate::config::EngineConfig;
use crate::process::extract::{FRAME_HEADER_LEN, FrameHeader, id3v2_len};
use crate::structs::source::{ContainerKind, SourceDescriptor};
use crate::utils::errors::FormatError;

/// Length of the fixed raw-PCM (RIFF/WAVE) header.
pub const PCM_HEADER_LEN: usize = 44;

/// Only 16-bit little-endian integer PCM is streamed.
pub const PCM_BITS_PER_SAMPLE: u16 = 16;

const WAVE_FORMAT_PCM: u16 = 1;

const OFFSET_WAVE: usize = 8;
const OFFSET_AUDIO_FORMAT: usize = 20;
const OFFSET_CHANNELS: usize = 22;
const OFFSET_SAMPLE_RATE: usize = 24;
const OFFSET_BITS_PER_SAMPLE: usize = 34;
const OFFSET_DATA: usize = 36;
const OFFSET_PAYLOAD_SIZE: usize = 40;

/// Validates container headers against the output clock configuration.
///
/// The parser never converts: a descriptor is produced only for sources
/// whose sample rate and channel layout match the configured output exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parser {
    sample_rate: u32,
    channels: u16,
}

impl Default for Parser {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for Parser {
    fn from(config: &EngineConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
        }
    }
}

impl Parser {
    /// Identifies the container from its leading bytes.
    pub fn detect(bytes: &[u8]) -> Result<ContainerKind, FormatError> {
        if bytes.starts_with(b"RIFF") {
            return Ok(ContainerKind::RawPcm);
        }
        if id3v2_len(bytes).is_some() || FrameHeader::parse(bytes).is_some() {
            return Ok(ContainerKind::Compressed);
        }
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(FormatError::TruncatedHeader {
                found: bytes.len(),
                expected: FRAME_HEADER_LEN,
            });
        }
        Err(FormatError::NotRecognizedContainer)
    }

    /// Parses the fixed-length raw-PCM header.
    pub fn parse_header(&self, bytes: &[u8]) -> Result<SourceDescriptor, FormatError> {
        if bytes.len() >= 4 && !bytes.starts_with(b"RIFF") {
            return Err(FormatError::NotRecognizedContainer);
        }
        if bytes.len() < PCM_HEADER_LEN {
            return Err(FormatError::TruncatedHeader {
                found: bytes.len(),
                expected: PCM_HEADER_LEN,
            });
        }
        if &bytes[OFFSET_WAVE..OFFSET_WAVE + 4] != b"WAVE"
            || &bytes[OFFSET_DATA..OFFSET_DATA + 4] != b"data"
            || le_u16(bytes, OFFSET_AUDIO_FORMAT) != WAVE_FORMAT_PCM
        {
            return Err(FormatError::NotRecognizedContainer);
        }

        let channels = le_u16(bytes, OFFSET_CHANNELS);
        let sample_rate = le_u32(bytes, OFFSET_SAMPLE_RATE);
        let bits_per_sample = le_u16(bytes, OFFSET_BITS_PER_SAMPLE);
        let payload_bytes = le_u32(bytes, OFFSET_PAYLOAD_SIZE) as u64;

        self.check_layout(channels, sample_rate)?;
        if bits_per_sample != PCM_BITS_PER_SAMPLE {
            return Err(FormatError::UnsupportedBitDepth(bits_per_sample));
        }

        Ok(SourceDescriptor {
            kind: ContainerKind::RawPcm,
            sample_rate,
            channels,
            payload_bytes: Some(payload_bytes),
        })
    }

    /// Builds a descriptor for a compressed stream from its first frame.
    pub fn parse_frame_descriptor(
        &self,
        header: &FrameHeader,
    ) -> Result<SourceDescriptor, FormatError> {
        self.check_layout(header.channels(), header.sample_rate)?;
        Ok(SourceDescriptor {
            kind: ContainerKind::Compressed,
            sample_rate: header.sample_rate,
            channels: header.channels(),
            payload_bytes: None,
        })
    }

    fn check_layout(&self, channels: u16, sample_rate: u32) -> Result<(), FormatError> {
        if channels != self.channels {
            return Err(FormatError::UnsupportedChannelLayout {
                found: channels,
                expected: self.channels,
            });
        }
        if sample_rate != self.sample_rate {
            return Err(FormatError::UnsupportedSampleRate {
                found: sample_rate,
                expected: self.sample_rate,
            });
        }
        Ok(())
    }
}

#[inline]
fn le_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Builds a canonical 44-byte RIFF/WAVE header for 16-bit PCM.
pub fn pcm_header(sample_rate: u32, channels: u16, payload_bytes: u32) -> [u8; PCM_HEADER_LEN] {
    let block_align = channels * (PCM_BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * block_align as u32;

    let mut header = [0u8; PCM_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&payload_bytes.saturating_add(36).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&PCM_BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&payload_bytes.to_le_bytes());
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configured_layout() {
        let parser = Parser::default();
        let descriptor = parser.parse_header(&pcm_header(8000, 1, 32_000)).unwrap();
        assert_eq!(descriptor.kind, ContainerKind::RawPcm);
        assert_eq!(descriptor.sample_rate, 8000);
        assert_eq!(descriptor.channels, 1);
        assert_eq!(descriptor.payload_bytes, Some(32_000));
        assert_eq!(descriptor.total_frames(), Some(16_000));
    }

    #[test]
    fn rejects_foreign_signature() {
        let mut header = pcm_header(8000, 1, 100);
        header[0..4].copy_from_slice(b"RIFX");
        assert_eq!(
            Parser::default().parse_header(&header),
            Err(FormatError::NotRecognizedContainer)
        );

        let mut header = pcm_header(8000, 1, 100);
        header[8..12].copy_from_slice(b"AVI ");
        assert_eq!(
            Parser::default().parse_header(&header),
            Err(FormatError::NotRecognizedContainer)
        );
    }

    #[test]
    fn rejects_mismatched_layout() {
        let parser = Parser::default();
        assert_eq!(
            parser.parse_header(&pcm_header(8000, 2, 100)),
            Err(FormatError::UnsupportedChannelLayout {
                found: 2,
                expected: 1
            })
        );
        assert_eq!(
            parser.parse_header(&pcm_header(44100, 1, 100)),
            Err(FormatError::UnsupportedSampleRate {
                found: 44100,
                expected: 8000
            })
        );

        let mut header = pcm_header(8000, 1, 100);
        header[34..36].copy_from_slice(&8u16.to_le_bytes());
        assert_eq!(
            parser.parse_header(&header),
            Err(FormatError::UnsupportedBitDepth(8))
        );
    }

    #[test]
    fn short_header_is_truncated() {
        let header = pcm_header(8000, 1, 100);
        assert_eq!(
            Parser::default().parse_header(&header[..20]),
            Err(FormatError::TruncatedHeader {
                found: 20,
                expected: PCM_HEADER_LEN
            })
        );
    }

    #[test]
    fn detects_containers() {
        assert_eq!(
            Parser::detect(&pcm_header(8000, 1, 0)),
            Ok(ContainerKind::RawPcm)
        );
        assert_eq!(
            Parser::detect(&[0xFF, 0xE3, 0x18, 0xC4, 0x00]),
            Ok(ContainerKind::Compressed)
        );
        assert_eq!(
            Parser::detect(b"ID3\x04\x00\x00\x00\x00\x00\x00"),
            Ok(ContainerKind::Compressed)
        );
        assert_eq!(
            Parser::detect(b"OggS\x00\x02"),
            Err(FormatError::NotRecognizedContainer)
        );
        assert!(matches!(
            Parser::detect(b"RI"),
            Err(FormatError::TruncatedHeader { .. })
        ));
    }

    #[test]
    fn frame_descriptor_follows_output_layout() {
        let header = FrameHeader::parse(&[0xFF, 0xE3, 0x18, 0xC4]).unwrap();
        let descriptor = Parser::default().parse_frame_descriptor(&header).unwrap();
        assert_eq!(descriptor.kind, ContainerKind::Compressed);
        assert_eq!(descriptor.payload_bytes, None);

        let stereo = Parser::from(&EngineConfig {
            channels: 2,
            ..Default::default()
        });
        assert!(matches!(
            stereo.parse_frame_descriptor(&header),
            Err(FormatError::UnsupportedChannelLayout { .. })
        ));
    }
}
