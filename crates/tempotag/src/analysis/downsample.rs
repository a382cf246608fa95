//! Decimation by block averaging
//!
//! Reduces a mono signal's sample rate by averaging consecutive,
//! variable-width sample windows. This trades anti-aliasing fidelity for
//! speed and simplicity, which is fine for tempo estimation: the beat
//! periodicity survives boxcar averaging intact.

use std::borrow::Cow;

/// Downsample a mono signal from `source_rate` to `target_rate`
///
/// When the rates are equal the input is returned as-is (borrowed, no
/// copy). Otherwise the input is partitioned into `round(len / ratio)`
/// consecutive windows, where `ratio = source_rate / target_rate`, and
/// each output sample is the mean of its window. Window `i` ends at input
/// index `round((i + 1) * ratio)`, clamped to the input length.
///
/// The result is a pure function of the inputs; summation is left to
/// right within each window.
pub fn downsample(input: &[f32], source_rate: u32, target_rate: u32) -> Cow<'_, [f32]> {
    debug_assert!(source_rate > 0 && target_rate > 0);

    if source_rate == target_rate {
        return Cow::Borrowed(input);
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = (input.len() as f64 / ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    let mut start = 0usize;
    for i in 0..output_len {
        let end = (((i + 1) as f64) * ratio).round() as usize;
        let end = end.min(input.len());

        if end <= start {
            // Window collapsed by boundary rounding; never divide by zero
            output.push(0.0);
            continue;
        }

        let sum: f64 = input[start..end].iter().map(|&s| s as f64).sum();
        output.push((sum / (end - start) as f64) as f32);
        start = end;
    }

    Cow::Owned(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_when_rates_match() {
        let signal = vec![0.5, -0.25, 0.75, 1.0];
        let out = downsample(&signal, 44_100, 44_100);
        assert_eq!(out.as_ref(), signal.as_slice());
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_halving_averages_pairs() {
        // Two windows of four samples each
        let signal = [0.0, 0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 10.0];
        let out = downsample(&signal, 8, 4);
        assert_eq!(out.as_ref(), &[0.0, 10.0]);
    }

    #[test]
    fn test_output_length_law() {
        for (len, source, target) in [
            (44_100usize, 44_100u32, 16_000u32),
            (100_000, 48_000, 16_000),
            (12_345, 22_050, 16_000),
            (10, 8, 4),
            (7, 3, 2),
        ] {
            let signal = vec![0.25f32; len];
            let ratio = source as f64 / target as f64;
            let expected = (len as f64 / ratio).round() as usize;
            let out = downsample(&signal, source, target);
            assert_eq!(
                out.len(),
                expected,
                "len={} {}->{} Hz",
                len,
                source,
                target
            );
        }
    }

    #[test]
    fn test_means_stay_within_window_extrema() {
        // Deterministic pseudo-random signal in [-1, 1]
        let mut state = 0x2545F4914F6CDD1Du64;
        let signal: Vec<f32> = (0..4410)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((state >> 33) as f64 / (1u64 << 31) as f64 * 2.0 - 1.0) as f32
            })
            .collect();

        let out = downsample(&signal, 44_100, 16_000);
        let ratio = 44_100.0f64 / 16_000.0;

        let mut start = 0usize;
        for (i, &sample) in out.iter().enumerate() {
            let end = ((((i + 1) as f64) * ratio).round() as usize).min(signal.len());
            if end <= start {
                assert_eq!(sample, 0.0);
                continue;
            }
            let window = &signal[start..end];
            let lo = window.iter().cloned().fold(f32::INFINITY, f32::min);
            let hi = window.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            assert!(
                sample >= lo - 1e-6 && sample <= hi + 1e-6,
                "output[{}]={} outside window [{}, {}]",
                i,
                sample,
                lo,
                hi
            );
            start = end;
        }
    }

    #[test]
    fn test_constant_signal_is_preserved() {
        let signal = vec![0.5f32; 44_100];
        let out = downsample(&signal, 44_100, 16_000);
        for &s in out.iter() {
            assert!((s - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_single_window() {
        let signal = [1.0, 2.0, 3.0, 4.0];
        let out = downsample(&signal, 4, 1);
        assert_eq!(out.as_ref(), &[2.5]);
    }
}
