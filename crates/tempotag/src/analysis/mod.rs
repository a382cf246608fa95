//! Audio analysis: downmix, decimation, and tempo estimation
//!
//! The analysis input is always a mono signal decimated to
//! [`TARGET_SAMPLE_RATE`]; estimation itself runs in an isolated
//! subprocess (see `batch::analyze_in_subprocess`).

pub mod downsample;
pub mod estimator;

pub use downsample::downsample;

use crate::config::AnalysisConfig;
use crate::error::{Result, TagError};
use serde::{Deserialize, Serialize};

/// Signals are decimated to this rate before estimation
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Result of analyzing one file
///
/// Serializable for subprocess communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Detected tempo in BPM, unrounded
    pub bpm: f32,
    /// Danceability score, when that stage is enabled
    pub danceability: Option<f32>,
}

/// Collapse per-channel PCM into a single mono signal by channel averaging
///
/// A signal that decoded to zero channels or zero frames is degenerate and
/// reported as [`TagError::EmptySignal`].
pub fn downmix_to_mono(channels: &[Vec<f32>]) -> Result<Vec<f32>> {
    let frames = channels.first().map_or(0, |c| c.len());
    if frames == 0 {
        return Err(TagError::EmptySignal);
    }

    if channels.len() == 1 {
        return Ok(channels[0].clone());
    }

    let scale = 1.0 / channels.len() as f32;
    let mut mono = vec![0.0f32; frames];
    for channel in channels {
        for (acc, &sample) in mono.iter_mut().zip(channel) {
            *acc += sample;
        }
    }
    for sample in &mut mono {
        *sample *= scale;
    }

    Ok(mono)
}

/// Run the estimation stage on an already-decimated mono signal
///
/// Input must be at [`TARGET_SAMPLE_RATE`]. This is the function executed
/// inside the isolation subprocess.
pub fn analyze_samples(samples: &[f32], config: &AnalysisConfig) -> Result<AnalysisResult> {
    let bpm = estimator::estimate_tempo(samples, TARGET_SAMPLE_RATE, &config.tempo)?;

    let danceability = if config.danceability {
        Some(estimator::estimate_danceability(
            samples,
            TARGET_SAMPLE_RATE,
        )?)
    } else {
        None
    };

    Ok(AnalysisResult { bpm, danceability })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo_averages_channels() {
        let channels = vec![vec![1.0, 0.0, -1.0], vec![0.0, 1.0, -1.0]];
        let mono = downmix_to_mono(&channels).unwrap();
        assert_eq!(mono, vec![0.5, 0.5, -1.0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let channels = vec![vec![0.25, -0.5]];
        let mono = downmix_to_mono(&channels).unwrap();
        assert_eq!(mono, vec![0.25, -0.5]);
    }

    #[test]
    fn test_downmix_empty_signal_fails() {
        assert_eq!(downmix_to_mono(&[]).unwrap_err().stage(), "downmixing");
        assert_eq!(
            downmix_to_mono(&[Vec::new(), Vec::new()])
                .unwrap_err()
                .stage(),
            "downmixing"
        );
    }
}
