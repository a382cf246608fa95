//! Tempo and danceability estimation using Essentia
//!
//! Thin adapters around Essentia's PercivalBpmEstimator and Danceability
//! algorithms. Each call creates its own Essentia handle; callers must
//! invoke these only from the estimation subprocess because Essentia's
//! C++ core keeps global state and is not thread-safe.

use crate::config::TempoConfig;
use crate::error::{Result, TagError};
use essentia::algorithm::rhythm::danceability::Danceability;
use essentia::algorithm::rhythm::percival_bpm_estimator::PercivalBpmEstimator;
use essentia::data::GetFromDataContainer;
use essentia::essentia::Essentia;

/// Shortest input the estimators accept (one onset-analysis frame)
pub const MIN_ESTIMATOR_SAMPLES: usize = 2048;

/// Reject input the estimators cannot produce a meaningful result for
fn check_input(samples: &[f32]) -> Result<()> {
    if samples.len() < MIN_ESTIMATOR_SAMPLES {
        return Err(TagError::Estimation(format!(
            "input too short: {} samples (minimum {})",
            samples.len(),
            MIN_ESTIMATOR_SAMPLES
        )));
    }
    if samples.iter().all(|&s| s == 0.0) {
        return Err(TagError::Estimation("input signal is all zero".to_string()));
    }
    Ok(())
}

/// Estimate the tempo of a mono signal in BPM
///
/// Returns the unrounded estimator output; callers that embed the value in
/// a filename round it themselves.
pub fn estimate_tempo(samples: &[f32], sample_rate: u32, tempo: &TempoConfig) -> Result<f32> {
    check_input(samples)?;

    let essentia = Essentia::new();

    let mut percival = essentia
        .create::<PercivalBpmEstimator>()
        .sample_rate(sample_rate as i32)
        .map_err(|e| TagError::Estimation(e.to_string()))?
        .min_bpm(tempo.min_bpm)
        .map_err(|e| TagError::Estimation(e.to_string()))?
        .max_bpm(tempo.max_bpm)
        .map_err(|e| TagError::Estimation(e.to_string()))?
        .configure()
        .map_err(|e| TagError::Estimation(e.to_string()))?;

    let result = percival
        .compute(samples)
        .map_err(|e| TagError::Estimation(e.to_string()))?;

    let bpm: f32 = result
        .bpm()
        .map_err(|e| TagError::Estimation(e.to_string()))?
        .get();

    log::debug!(
        "estimate_tempo: {:.2} BPM from {} samples at {} Hz",
        bpm,
        samples.len(),
        sample_rate
    );

    Ok(bpm)
}

/// Estimate the danceability score of a mono signal
///
/// The score correlates rhythmic regularity with perceived danceability;
/// Essentia reports it on a roughly 0-3 scale.
pub fn estimate_danceability(samples: &[f32], sample_rate: u32) -> Result<f32> {
    check_input(samples)?;

    let essentia = Essentia::new();

    let mut dance = essentia
        .create::<Danceability>()
        .sample_rate(sample_rate as f32)
        .map_err(|e| TagError::Estimation(e.to_string()))?
        .configure()
        .map_err(|e| TagError::Estimation(e.to_string()))?;

    let result = dance
        .compute(samples)
        .map_err(|e| TagError::Estimation(e.to_string()))?;

    let danceability: f32 = result
        .danceability()
        .map_err(|e| TagError::Estimation(e.to_string()))?
        .get();

    Ok(danceability)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_input_rejected() {
        let samples = vec![0.5f32; MIN_ESTIMATOR_SAMPLES - 1];
        let err = estimate_tempo(&samples, 16_000, &TempoConfig::default()).unwrap_err();
        assert_eq!(err.stage(), "estimating");
    }

    #[test]
    fn test_all_zero_input_rejected() {
        let samples = vec![0.0f32; MIN_ESTIMATOR_SAMPLES * 4];
        let err = estimate_danceability(&samples, 16_000).unwrap_err();
        assert_eq!(err.stage(), "estimating");
    }
}
