//! Essentia-backed tempo estimation and loudness measurement

use anyhow::{bail, Context, Result};
use essentia::algorithm::loudness_dynamics::loudness_ebur_128::LoudnessEbur128;
use essentia::algorithm::rhythm::rhythm_extractor_2013::RhythmExtractor2013;
use essentia::data::GetFromDataContainer;
use essentia::essentia::Essentia;
use tempokit_core::loudness::LoudnessMeter;
use tempokit_core::tempo::{BpmConfig, TempoEstimator};
use tempokit_core::DecodedAudio;

/// Sample rate RhythmExtractor2013 is designed for
const RHYTHM_SAMPLE_RATE: u32 = 44100;

/// StereoSample-compatible struct for passing to Essentia
///
/// This has the same memory layout as `essentia_sys::ffi::StereoSample`
/// which has private fields. Both are simple structs with two f32 fields.
#[repr(C)]
#[derive(Clone, Copy)]
struct StereoSample {
    left: f32,
    right: f32,
}

/// Linear-interpolation resample of a mono signal
fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from as f64 / to as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

/// RhythmExtractor2013 (multifeature) tempo estimator
///
/// Essentia is not thread-safe; the estimator creates its Essentia instance
/// per call and must stay on the pipeline's thread.
pub struct EssentiaTempoEstimator {
    config: BpmConfig,
}

impl EssentiaTempoEstimator {
    pub fn new(mut config: BpmConfig) -> Self {
        config.validate();
        Self { config }
    }
}

impl TempoEstimator for EssentiaTempoEstimator {
    fn estimate(&self, audio: &DecodedAudio) -> Result<f64> {
        let mono = resample_linear(&audio.mono(), audio.sample_rate, RHYTHM_SAMPLE_RATE);
        log::info!("EssentiaTempoEstimator::estimate: {} samples", mono.len());

        let essentia = Essentia::new();
        let mut rhythm = essentia
            .create::<RhythmExtractor2013>()
            .min_tempo(self.config.min_tempo)
            .context("Failed to set min_tempo")?
            .max_tempo(self.config.max_tempo)
            .context("Failed to set max_tempo")?
            .method("multifeature")
            .context("Failed to set method")?
            .configure()
            .context("Failed to configure RhythmExtractor2013")?;

        let result = rhythm
            .compute(mono.as_slice())
            .context("RhythmExtractor2013 computation failed")?;

        let bpm: f32 = result.bpm().context("Failed to get BPM output")?.get();
        log::info!("EssentiaTempoEstimator::estimate: {:.2} BPM", bpm);

        Ok(bpm as f64)
    }

    fn name(&self) -> &'static str {
        "essentia"
    }
}

/// LoudnessEBUR128 integrated loudness
///
/// Mono is duplicated to both sides; wider layouts use their first two
/// channels.
pub struct EssentiaLoudnessMeter;

impl LoudnessMeter for EssentiaLoudnessMeter {
    fn measure(&self, audio: &DecodedAudio) -> Result<f64> {
        let channels = audio.channels();
        if channels == 0 || audio.frames() == 0 {
            bail!("cannot measure empty audio");
        }

        let stereo_samples: Vec<StereoSample> = audio
            .interleaved()
            .chunks_exact(channels)
            .map(|frame| StereoSample {
                left: frame[0],
                right: frame[if channels > 1 { 1 } else { 0 }],
            })
            .collect();

        let essentia = Essentia::new();
        let mut loudness = essentia
            .create::<LoudnessEbur128>()
            .sample_rate(audio.sample_rate as f32)
            .context("Failed to set sample rate")?
            .configure()
            .context("Failed to configure LoudnessEBUR128")?;

        // SAFETY: Our StereoSample has the same layout as essentia_sys::ffi::StereoSample
        // Both are simple structs with two f32 fields (left, right) in the same order.
        let ffi_samples: &[essentia_sys::ffi::StereoSample] = unsafe {
            std::slice::from_raw_parts(
                stereo_samples.as_ptr() as *const essentia_sys::ffi::StereoSample,
                stereo_samples.len(),
            )
        };

        let result = loudness
            .compute(ffi_samples)
            .context("LoudnessEBUR128 computation failed")?;

        let integrated_lufs: f32 = result
            .integrated_loudness()
            .context("Failed to get integrated loudness output")?
            .get();

        log::info!("EssentiaLoudnessMeter::measure: {:.2} LUFS", integrated_lufs);
        Ok(integrated_lufs as f64)
    }

    fn name(&self) -> &'static str {
        "essentia-ebur128"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_linear_lengths() {
        let input = vec![0.0f32; 48000];
        assert_eq!(resample_linear(&input, 48000, 44100).len(), 44100);
        assert_eq!(resample_linear(&input, 44100, 44100).len(), 48000);
    }

    #[test]
    fn test_resample_linear_interpolates() {
        let out = resample_linear(&[0.0, 1.0], 2, 4);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0]);
    }
}
