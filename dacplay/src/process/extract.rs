use crate::utils::bitstream_io::BsIoSliceReader;

/// Length of an MPEG audio frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest frame any valid header can describe (MPEG-2.5 Layer II,
/// 160 kbit/s at 8 kHz, padded).
pub const MAX_FRAME_LEN: usize = 2881;

/// Most samples per channel a single frame can carry.
pub const MAX_SAMPLES_PER_FRAME: usize = 1152;

const ID3V2_HEADER_LEN: usize = 10;

#[rustfmt::skip]
const BITRATES_KBPS: [[u32; 15]; 5] = [
    // MPEG-1 Layer I, II, III
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56,  64,  80,  96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48,  56,  64,  80,  96, 112, 128, 160, 192, 224, 256, 320],
    // MPEG-2/2.5 Layer I, then Layer II and III
    [0, 32, 48, 56,  64,  80,  96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0,  8, 16, 24,  32,  40,  48,  56,  64,  80,  96, 112, 128, 144, 160],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V2_5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    I,
    II,
    III,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

/// Fields of a 32-bit MPEG audio frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    pub crc_protected: bool,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub channel_mode: ChannelMode,
}

impl FrameHeader {
    /// Parses the header at the start of `bytes`.
    ///
    /// Returns `None` when the sync word is missing or any field holds a
    /// reserved value. Free-format bitrates are rejected because their frame
    /// length cannot be derived from the header alone.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < FRAME_HEADER_LEN {
            return None;
        }
        let mut reader = BsIoSliceReader::from_slice(&bytes[..FRAME_HEADER_LEN]);

        if reader.get_n::<u16>(11).ok()? != 0x7FF {
            return None;
        }

        let version = match reader.get_n::<u8>(2).ok()? {
            0b00 => MpegVersion::V2_5,
            0b10 => MpegVersion::V2,
            0b11 => MpegVersion::V1,
            _ => return None,
        };
        let layer = match reader.get_n::<u8>(2).ok()? {
            0b01 => Layer::III,
            0b10 => Layer::II,
            0b11 => Layer::I,
            _ => return None,
        };
        let crc_protected = !reader.get().ok()?;

        let bitrate_index = reader.get_n::<u8>(4).ok()? as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let table = match (version, layer) {
            (MpegVersion::V1, Layer::I) => 0,
            (MpegVersion::V1, Layer::II) => 1,
            (MpegVersion::V1, Layer::III) => 2,
            (_, Layer::I) => 3,
            (_, _) => 4,
        };
        let bitrate_kbps = BITRATES_KBPS[table][bitrate_index];

        let rate_index = reader.get_n::<u8>(2).ok()? as usize;
        if rate_index == 3 {
            return None;
        }
        let sample_rate = match version {
            MpegVersion::V1 => [44100, 48000, 32000][rate_index],
            MpegVersion::V2 => [22050, 24000, 16000][rate_index],
            MpegVersion::V2_5 => [11025, 12000, 8000][rate_index],
        };

        let padding = reader.get().ok()?;
        reader.skip(1).ok()?; // private

        let channel_mode = match reader.get_n::<u8>(2).ok()? {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        Some(Self {
            version,
            layer,
            crc_protected,
            bitrate_kbps,
            sample_rate,
            padding,
            channel_mode,
        })
    }

    pub fn channels(&self) -> u16 {
        if self.channel_mode == ChannelMode::Mono {
            1
        } else {
            2
        }
    }

    /// Samples per channel carried by one frame.
    pub fn samples_per_frame(&self) -> usize {
        match (self.layer, self.version) {
            (Layer::I, _) => 384,
            (Layer::II, _) | (Layer::III, MpegVersion::V1) => 1152,
            (Layer::III, _) => 576,
        }
    }

    /// Total frame length in bytes, header included.
    pub fn frame_len(&self) -> usize {
        let bitrate = self.bitrate_kbps as usize * 1000;
        let rate = self.sample_rate as usize;
        let padding = self.padding as usize;
        match (self.layer, self.version) {
            (Layer::I, _) => (12 * bitrate / rate + padding) * 4,
            (Layer::III, MpegVersion::V2 | MpegVersion::V2_5) => 72 * bitrate / rate + padding,
            _ => 144 * bitrate / rate + padding,
        }
    }
}

/// Offset of the first valid frame header in `window`, if any.
pub fn find_frame_sync(window: &[u8]) -> Option<usize> {
    window
        .windows(FRAME_HEADER_LEN)
        .position(|candidate| candidate[0] == 0xFF && FrameHeader::parse(candidate).is_some())
}

/// Total length of a leading ID3v2 tag (header, body and optional footer).
///
/// Returns `None` when `bytes` does not start with an ID3v2 tag header.
pub fn id3v2_len(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < ID3V2_HEADER_LEN || &bytes[..3] != b"ID3" {
        return None;
    }
    let size = &bytes[6..10];
    if size.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let body = size
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | (b & 0x7F) as usize);
    let footer = if bytes[5] & 0x10 != 0 {
        ID3V2_HEADER_LEN
    } else {
        0
    };
    Some(ID3V2_HEADER_LEN + body + footer)
}

#[cfg(test)]
mod tests {
    use super::*;

    // MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, no padding, joint stereo
    const V1_L3_128K: [u8; 4] = [0xFF, 0xFB, 0x90, 0x44];
    // MPEG-2.5 Layer III, 8 kbit/s, 8 kHz, mono
    const V25_L3_8K_MONO: [u8; 4] = [0xFF, 0xE3, 0x18, 0xC4];

    #[test]
    fn parses_mpeg1_layer3_header() {
        let header = FrameHeader::parse(&V1_L3_128K).unwrap();
        assert_eq!(header.version, MpegVersion::V1);
        assert_eq!(header.layer, Layer::III);
        assert_eq!(header.bitrate_kbps, 128);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channel_mode, ChannelMode::JointStereo);
        assert_eq!(header.channels(), 2);
        assert_eq!(header.samples_per_frame(), 1152);
        assert_eq!(header.frame_len(), 417);
    }

    #[test]
    fn parses_mpeg25_mono_header() {
        let header = FrameHeader::parse(&V25_L3_8K_MONO).unwrap();
        assert_eq!(header.version, MpegVersion::V2_5);
        assert_eq!(header.sample_rate, 8000);
        assert_eq!(header.bitrate_kbps, 8);
        assert_eq!(header.channels(), 1);
        assert_eq!(header.samples_per_frame(), 576);
        assert_eq!(header.frame_len(), 72);
    }

    #[test]
    fn rejects_reserved_fields() {
        // reserved version
        assert!(FrameHeader::parse(&[0xFF, 0xEB, 0x90, 0x44]).is_none());
        // reserved layer
        assert!(FrameHeader::parse(&[0xFF, 0xF9, 0x90, 0x44]).is_none());
        // free-format bitrate
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0x00, 0x44]).is_none());
        // reserved sample rate
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0x9C, 0x44]).is_none());
        assert!(FrameHeader::parse(&V1_L3_128K[..3]).is_none());
    }

    #[test]
    fn sync_search_skips_garbage() {
        let mut window = vec![0x00, 0xFF, 0x00, 0x12, 0xFF];
        window.extend_from_slice(&V1_L3_128K);
        assert_eq!(find_frame_sync(&window), Some(5));
        assert_eq!(find_frame_sync(&window[..7]), None);
        assert_eq!(find_frame_sync(&[]), None);
    }

    #[test]
    fn id3_tag_length_uses_syncsafe_size() {
        let tag = [b'I', b'D', b'3', 4, 0, 0, 0, 0, 0x02, 0x01];
        assert_eq!(id3v2_len(&tag), Some(10 + 257));

        let with_footer = [b'I', b'D', b'3', 4, 0, 0x10, 0, 0, 0, 0x10];
        assert_eq!(id3v2_len(&with_footer), Some(10 + 16 + 10));

        assert_eq!(id3v2_len(b"RIFF\0\0\0\0WAVE"), None);
    }
}
