//! MPEG audio frame codec backed by symphonia.

use log::{debug, trace};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{
    CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_MP3, CodecParameters, CodecType, Decoder,
    DecoderOptions,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;

use crate::process::decode::{CodecFactory, FrameCodec};
use crate::process::extract::{FrameHeader, Layer};
use crate::utils::errors::FrameError;

/// Decodes MPEG-1/2/2.5 Layer I, II and III frames.
///
/// The symphonia decoder is chosen by the layer of the frame being decoded
/// and rebuilt only when the layer changes.
pub struct SymphoniaMpaCodec {
    decoder: Box<dyn Decoder>,
    layer: Layer,
    scratch: Option<(SampleBuffer<i16>, SignalSpec, u64)>,
    ts: u64,
}

fn codec_type(layer: Layer) -> CodecType {
    match layer {
        Layer::I => CODEC_TYPE_MP1,
        Layer::II => CODEC_TYPE_MP2,
        Layer::III => CODEC_TYPE_MP3,
    }
}

fn make_decoder(layer: Layer) -> Result<Box<dyn Decoder>, SymphoniaError> {
    let mut params = CodecParameters::new();
    params.for_codec(codec_type(layer));
    symphonia::default::get_codecs().make(&params, &DecoderOptions::default())
}

impl SymphoniaMpaCodec {
    pub fn new() -> Result<Self, SymphoniaError> {
        Ok(Self {
            decoder: make_decoder(Layer::III)?,
            layer: Layer::III,
            scratch: None,
            ts: 0,
        })
    }

    /// Factory for the controller; yields `None` when the codec cannot be built.
    pub fn factory() -> CodecFactory {
        Box::new(|| {
            Self::new()
                .ok()
                .map(|codec| Box::new(codec) as Box<dyn FrameCodec>)
        })
    }

    fn select_layer(&mut self, layer: Layer) -> Result<(), FrameError> {
        if layer == self.layer {
            return Ok(());
        }
        self.decoder = make_decoder(layer).map_err(|e| {
            debug!("No decoder for Layer {layer:?}: {e}");
            FrameError::Corrupt
        })?;
        self.layer = layer;
        Ok(())
    }
}

impl FrameCodec for SymphoniaMpaCodec {
    fn decode_frame(&mut self, window: &[u8], out: &mut [i16]) -> Result<usize, FrameError> {
        let header = FrameHeader::parse(window).ok_or(FrameError::Corrupt)?;
        let frame = window
            .get(..header.frame_len())
            .ok_or(FrameError::Underflow)?;
        self.select_layer(header.layer)?;

        let packet = Packet::new_from_slice(0, self.ts, 0, frame);
        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // The bit reservoir references data not yet delivered.
            Err(SymphoniaError::IoError(_)) => return Err(FrameError::Underflow),
            Err(e) => {
                trace!("Frame rejected by codec: {e}");
                return Err(FrameError::Corrupt);
            }
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        self.ts += decoded.frames() as u64;

        let reusable = matches!(
            &self.scratch,
            Some((_, cached, frames))
                if cached.rate == spec.rate
                    && cached.channels.count() == spec.channels.count()
                    && *frames >= capacity
        );
        if !reusable {
            self.scratch = Some((SampleBuffer::new(capacity, spec), spec, capacity));
        }
        let Some((buf, _, _)) = self.scratch.as_mut() else {
            return Err(FrameError::Corrupt);
        };

        buf.copy_interleaved_ref(decoded);
        let samples = buf.samples();
        let n = samples.len().min(out.len());
        out[..n].copy_from_slice(&samples[..n]);
        Ok(n)
    }
}
