use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use dacplay::io::OutputSink;
use dacplayd_macros::ToBytes;

use crate::byteorder::WriteBytesLe;

const HEADER_LEN: u32 = 44;
const RIFF_SIZE_POSITION: u64 = 4;
const DATA_SIZE_POSITION: u64 = 40;

#[derive(ToBytes)]
struct WavHeader {
    riff: [u8; 4],
    riff_size: u32,
    wave: [u8; 4],
    fmt: [u8; 4],
    fmt_size: u32,
    format: u16,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
    data: [u8; 4],
    data_size: u32,
}

impl WavHeader {
    fn mono_16bit(sample_rate: u32, data_size: u32) -> Self {
        Self {
            riff: *b"RIFF",
            riff_size: data_size.saturating_add(HEADER_LEN - 8),
            wave: *b"WAVE",
            fmt: *b"fmt ",
            fmt_size: 16,
            format: 1,
            channels: 1,
            sample_rate,
            byte_rate: sample_rate * 2,
            block_align: 2,
            bits_per_sample: 16,
            data: *b"data",
            data_size,
        }
    }
}

/// Records DAC codes as a mono 16-bit WAV file.
///
/// Codes are re-centred around the DAC's mid-scale and shifted up to 16 bits.
/// The first I/O error stops further writes and is returned by `finish`.
pub struct DacWavWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    dac_bits: u8,
    samples_written: u64,
    error: Option<io::Error>,
}

impl<W: Write + Seek> DacWavWriter<W> {
    pub fn new(writer: W, sample_rate: u32, dac_bits: u8) -> io::Result<Self> {
        let mut writer = BufWriter::new(writer);
        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        WavHeader::mono_16bit(sample_rate, 0).write_le(&mut header);
        writer.write_all(&header)?;

        Ok(Self {
            writer,
            dac_bits: dac_bits.clamp(1, 16),
            samples_written: 0,
            error: None,
        })
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    fn to_pcm(&self, code: u16) -> i16 {
        let half = 1i32 << (self.dac_bits - 1);
        let centred = (code as i32 - half) << (16 - self.dac_bits);
        centred.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }

    /// Flushes samples and patches the RIFF and data sizes.
    pub fn finish(&mut self) -> io::Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()?;

        let data_size = u32::try_from(self.samples_written * 2).unwrap_or(u32::MAX);
        let end = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(RIFF_SIZE_POSITION))?;
        self.writer
            .write_all(&data_size.saturating_add(HEADER_LEN - 8).to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(DATA_SIZE_POSITION))?;
        self.writer.write_all(&data_size.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write + Seek> OutputSink for DacWavWriter<W> {
    fn write_sample(&mut self, value: u16) {
        if self.error.is_some() {
            return;
        }
        let pcm = self.to_pcm(value);
        match self.writer.write_all(&pcm.to_le_bytes()) {
            Ok(()) => self.samples_written += 1,
            Err(e) => self.error = Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn writes_recentred_samples() -> io::Result<()> {
        let mut wav = DacWavWriter::new(Cursor::new(Vec::new()), 8000, 10)?;
        for code in [512, 0, 1023, 513] {
            wav.write_sample(code);
        }
        assert_eq!(wav.samples_written(), 4);
        wav.finish()?;

        let bytes = wav.into_inner()?.into_inner();
        assert_eq!(bytes.len(), 44 + 8);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[4..8], &44u32.to_le_bytes());
        assert_eq!(&bytes[24..28], &8000u32.to_le_bytes());
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(&bytes[40..44], &8u32.to_le_bytes());

        let samples: Vec<i16> = bytes[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, [0, -32768, 32704, 64]);
        Ok(())
    }

    #[test]
    fn header_is_readable_by_engine_parser() -> io::Result<()> {
        let mut wav = DacWavWriter::new(Cursor::new(Vec::new()), 8000, 10)?;
        wav.write_sample(600);
        wav.finish()?;
        let bytes = wav.into_inner()?.into_inner();

        let descriptor = dacplay::process::parse::Parser::default()
            .parse_header(&bytes)
            .map_err(io::Error::other)?;
        assert_eq!(descriptor.payload_bytes, Some(2));
        Ok(())
    }
}
