//! Audio decoding via Symphonia
//!
//! Wraps Symphonia's probe/decode loop to turn a raw byte buffer into
//! per-channel f32 PCM plus the stream's sample rate. The decoder makes
//! no assumption about channel layout; whatever the stream declares is
//! reported as-is.

use crate::error::{Result, TagError};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded PCM audio, one buffer per channel
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Per-channel sample buffers, all the same length
    pub channels: Vec<Vec<f32>>,
    /// Sample rate in Hz as declared by the stream
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode an in-memory audio container to per-channel f32 samples
///
/// `ext_hint` is the file extension, if known; it speeds up format probing
/// but is not required for a correct result.
pub fn decode_bytes(bytes: Vec<u8>, ext_hint: Option<&str>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = ext_hint {
        hint.with_extension(ext);
    }

    // Probe the container format
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| TagError::Decode(e.to_string()))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| TagError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| TagError::Decode("unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| TagError::Decode(e.to_string()))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut channel_count: usize = 0;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    // Decode all packets
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("decode_bytes: error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("decode_bytes: error decoding packet: {}", e);
                continue;
            }
        };

        // Initialize sample buffer on first decode
        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            channel_count = spec.channels.count();
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    if channel_count == 0 {
        return Err(TagError::Decode(
            "stream produced no decodable packets".to_string(),
        ));
    }

    Ok(DecodedAudio {
        channels: deinterleave(&interleaved, channel_count),
        sample_rate,
    })
}

/// Split interleaved samples into per-channel buffers
fn deinterleave(interleaved: &[f32], channel_count: usize) -> Vec<Vec<f32>> {
    let frames = interleaved.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];

    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }

    channels
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a stereo 16-bit WAV to memory with a different constant value
    /// per channel.
    fn stereo_wav_bytes(sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames {
                writer.write_sample(8192i16).unwrap(); // left
                writer.write_sample(-8192i16).unwrap(); // right
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_stereo_wav() {
        let bytes = stereo_wav_bytes(44_100, 1000);
        let decoded = decode_bytes(bytes, Some("wav")).unwrap();

        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.frames(), 1000);

        // 8192/32768 = 0.25, allow for int16 -> f32 conversion variants
        assert!((decoded.channels[0][10] - 0.25).abs() < 1e-3);
        assert!((decoded.channels[1][10] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let bytes = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02, 0x03];
        let err = decode_bytes(bytes, Some("mp3")).unwrap_err();
        assert_eq!(err.stage(), "decoding");
    }

    #[test]
    fn test_decode_without_hint() {
        let bytes = stereo_wav_bytes(22_050, 64);
        let decoded = decode_bytes(bytes, None).unwrap();
        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.frames(), 64);
    }

    #[test]
    fn test_deinterleave_splits_frames() {
        let interleaved = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let channels = deinterleave(&interleaved, 2);
        assert_eq!(channels[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(channels[1], vec![-1.0, -2.0, -3.0]);
    }
}
