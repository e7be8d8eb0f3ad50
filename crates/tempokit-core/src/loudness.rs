//! Integrated loudness measurement and normalization
//!
//! Loudness is BS.1770 / EBU R128 integrated LUFS over the whole file.
//! Normalization is a single static gain of `target - measured` dB.

use anyhow::{anyhow, ensure, Result};
use ebur128::{EbuR128, Mode};

use crate::types::DecodedAudio;

/// Loudness meter and normalizer seam used by the pipeline
pub trait LoudnessMeter {
    /// Integrated loudness in LUFS
    fn measure(&self, audio: &DecodedAudio) -> Result<f64>;

    /// Scale `audio` from `current_lufs` to `target_lufs`
    fn normalize(&self, audio: &DecodedAudio, current_lufs: f64, target_lufs: f64) -> Result<DecodedAudio> {
        ensure!(
            current_lufs.is_finite() && target_lufs.is_finite(),
            "cannot normalize from {} LUFS to {} LUFS",
            current_lufs,
            target_lufs
        );
        Ok(apply_gain(audio, calculate_gain_compensation(current_lufs, target_lufs)))
    }

    fn name(&self) -> &'static str;
}

/// EBU R128 meter from the `ebur128` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct Ebur128Meter;

impl LoudnessMeter for Ebur128Meter {
    fn measure(&self, audio: &DecodedAudio) -> Result<f64> {
        let channels = u32::try_from(audio.channels())?;
        ensure!(channels > 0 && audio.frames() > 0, "cannot measure empty audio");

        let mut meter = EbuR128::new(channels, audio.sample_rate, Mode::I)
            .map_err(|e| anyhow!("failed to create EBU R128 meter: {:?}", e))?;
        meter
            .add_frames_f32(audio.interleaved())
            .map_err(|e| anyhow!("EBU R128 analysis failed: {:?}", e))?;
        let lufs = meter
            .loudness_global()
            .map_err(|e| anyhow!("failed to read integrated loudness: {:?}", e))?;

        log::info!(
            "Ebur128Meter::measure: {:.2} LUFS over {:.1}s",
            lufs,
            audio.duration_secs()
        );
        Ok(lufs)
    }

    fn name(&self) -> &'static str {
        "ebur128"
    }
}

/// Gain in dB needed to reach `target_lufs` (positive = boost)
#[inline]
pub fn calculate_gain_compensation(measured_lufs: f64, target_lufs: f64) -> f64 {
    target_lufs - measured_lufs
}

/// Decibels to a linear gain factor
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Linear gain factor to decibels
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    20.0 * linear.log10()
}

/// Copy of `audio` with `gain_db` applied
///
/// Logs a warning when the result peaks above full scale; samples are not
/// limited.
pub fn apply_gain(audio: &DecodedAudio, gain_db: f64) -> DecodedAudio {
    let mut out = audio.clone();
    out.samples.scale(db_to_linear(gain_db) as f32);

    let peak = out.samples.peak();
    if peak > 1.0 {
        log::warn!(
            "apply_gain: {:+.2} dB pushes the peak to {:+.2} dBFS, output will clip",
            gain_db,
            linear_to_db(peak as f64)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleMatrix;

    fn tone(amplitude: f32, seconds: f32, sample_rate: u32) -> DecodedAudio {
        let frames = (seconds * sample_rate as f32) as usize;
        let data: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin() * amplitude;
                [s, s]
            })
            .collect();
        DecodedAudio::new(SampleMatrix::from_vec(data, frames, 2).unwrap(), sample_rate)
    }

    #[test]
    fn test_gain_compensation() {
        assert!((calculate_gain_compensation(-10.0, -6.0) - 4.0).abs() < 1e-9);
        assert!((calculate_gain_compensation(-4.0, -6.0) + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_db_linear_conversion() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-9);
        assert!((db_to_linear(-6.0) - 0.501).abs() < 0.001);
        assert!((linear_to_db(db_to_linear(-3.5)) + 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_louder_tone_measures_louder() {
        let meter = Ebur128Meter;
        let quiet = meter.measure(&tone(0.05, 3.0, 48000)).unwrap();
        let loud = meter.measure(&tone(0.5, 3.0, 48000)).unwrap();

        // 20 dB amplitude difference
        assert!((loud - quiet - 20.0).abs() < 0.5, "quiet {quiet}, loud {loud}");
    }

    #[test]
    fn test_normalize_reaches_target() {
        let meter = Ebur128Meter;
        let audio = tone(0.1, 3.0, 48000);

        let current = meter.measure(&audio).unwrap();
        let normalized = meter.normalize(&audio, current, -14.0).unwrap();
        let after = meter.measure(&normalized).unwrap();

        assert!((after + 14.0).abs() < 0.1, "measured {after} LUFS");
    }

    #[test]
    fn test_silence_is_not_finite() {
        let silence = DecodedAudio::new(SampleMatrix::zeros(48000, 2), 48000);
        let lufs = Ebur128Meter.measure(&silence).unwrap();
        assert!(!lufs.is_finite());
        assert!(Ebur128Meter.normalize(&silence, lufs, -14.0).is_err());
    }
}
