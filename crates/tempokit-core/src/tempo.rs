//! Global tempo estimation
//!
//! The default estimator builds a spectral-flux onset envelope and picks the
//! strongest periodicity within the configured BPM range. It is deterministic
//! for identical input and holds only its FFT plan, which is reused across
//! every source of a batch.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::types::DecodedAudio;

/// Tempo estimation seam used by the pipeline
pub trait TempoEstimator {
    /// Global tempo of `audio` in BPM
    fn estimate(&self, audio: &DecodedAudio) -> Result<f64>;

    fn name(&self) -> &'static str;
}

/// BPM search range and padding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BpmConfig {
    /// Minimum expected tempo in BPM (range: 40-180)
    pub min_tempo: i32,
    /// Maximum expected tempo in BPM (range: 60-250)
    pub max_tempo: i32,
    /// Pad the signal by half a frame on both sides so the first and last
    /// onsets are seen by a full analysis window
    pub zero_pad: bool,
}

impl Default for BpmConfig {
    fn default() -> Self {
        Self {
            min_tempo: 40,
            max_tempo: 208,
            zero_pad: true,
        }
    }
}

impl BpmConfig {
    /// Clamp values to the supported ranges
    pub fn validate(&mut self) {
        self.min_tempo = self.min_tempo.clamp(40, 180);
        self.max_tempo = self.max_tempo.clamp(60, 250);

        // Ensure min < max with at least 20 BPM gap
        if self.min_tempo >= self.max_tempo {
            self.max_tempo = (self.min_tempo + 20).min(250);
        }
    }

    /// Config for a specific genre (e.g., DnB: 160-190)
    pub fn for_range(min: i32, max: i32) -> Self {
        let mut config = Self {
            min_tempo: min,
            max_tempo: max,
            ..Default::default()
        };
        config.validate();
        config
    }
}

/// Analysis window length in samples
const FRAME_SIZE: usize = 1024;
/// Hop between analysis windows in samples
const HOP_SIZE: usize = 512;
/// Centre of the log-normal tempo prior
const PRIOR_BPM: f64 = 120.0;
/// Width of the tempo prior in octaves
const PRIOR_OCTAVES: f64 = 1.0;

/// Onset-envelope autocorrelation tempo estimator
pub struct OnsetTempoEstimator {
    config: BpmConfig,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl OnsetTempoEstimator {
    pub fn new(mut config: BpmConfig) -> Self {
        config.validate();

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FRAME_SIZE);

        // Hann window
        let window: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / FRAME_SIZE as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        Self { config, fft, window }
    }

    /// Log-compressed positive spectral flux, one value per hop
    fn onset_envelope(&self, mono: &[f32]) -> Result<Vec<f32>> {
        let pad = if self.config.zero_pad { FRAME_SIZE / 2 } else { 0 };
        let mut padded = vec![0.0f32; pad];
        padded.extend_from_slice(mono);
        padded.resize(padded.len() + pad, 0.0);

        if padded.len() < FRAME_SIZE {
            bail!("audio too short for tempo analysis ({} samples)", mono.len());
        }
        let num_frames = (padded.len() - FRAME_SIZE) / HOP_SIZE + 1;

        let mut frame_buf = vec![0.0f32; FRAME_SIZE];
        let mut spectrum = self.fft.make_output_vec();
        let mut scratch = self.fft.make_scratch_vec();
        let mut previous = vec![0.0f32; spectrum.len()];
        let mut envelope = Vec::with_capacity(num_frames);

        for frame_idx in 0..num_frames {
            let start = frame_idx * HOP_SIZE;
            for (i, sample) in frame_buf.iter_mut().enumerate() {
                *sample = padded[start + i] * self.window[i];
            }

            self.fft
                .process_with_scratch(&mut frame_buf, &mut spectrum, &mut scratch)
                .map_err(|e| anyhow!("FFT failed: {:?}", e))?;

            let mut flux = 0.0f32;
            for (bin, prev) in spectrum.iter().zip(previous.iter_mut()) {
                let magnitude = (1.0 + 100.0 * bin.norm()).ln();
                flux += (magnitude - *prev).max(0.0);
                *prev = magnitude;
            }
            envelope.push(flux);
        }

        Ok(envelope)
    }
}

impl TempoEstimator for OnsetTempoEstimator {
    fn estimate(&self, audio: &DecodedAudio) -> Result<f64> {
        if audio.sample_rate == 0 {
            bail!("sample rate is zero");
        }
        let mono = audio.mono();
        let mut envelope = self.onset_envelope(&mono)?;

        let peak = envelope.iter().copied().fold(0.0f32, f32::max);
        if peak <= 1e-6 {
            bail!("no onsets detected, input is silent");
        }

        let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
        for value in &mut envelope {
            *value -= mean;
        }

        let frames_per_sec = audio.sample_rate as f64 / HOP_SIZE as f64;
        let lag_min = ((60.0 * frames_per_sec / self.config.max_tempo as f64).floor() as usize).max(1);
        let lag_max = (60.0 * frames_per_sec / self.config.min_tempo as f64).ceil() as usize;

        if envelope.len() < 2 * lag_max {
            bail!(
                "audio too short for tempo analysis ({:.1}s)",
                audio.duration_secs()
            );
        }

        // Unbiased autocorrelation weighted by the tempo prior
        let scores: Vec<f64> = (lag_min..=lag_max)
            .map(|lag| {
                let n = envelope.len() - lag;
                let sum: f64 = envelope[..n]
                    .iter()
                    .zip(&envelope[lag..])
                    .map(|(a, b)| (*a as f64) * (*b as f64))
                    .sum();
                let bpm = 60.0 * frames_per_sec / lag as f64;
                let octaves = (bpm / PRIOR_BPM).log2() / PRIOR_OCTAVES;
                (sum / n as f64) * (-0.5 * octaves * octaves).exp()
            })
            .collect();

        let (best, best_score) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });
        if best_score <= 0.0 {
            bail!("no periodicity found in {}-{} BPM", self.config.min_tempo, self.config.max_tempo);
        }

        // Parabolic interpolation around the peak
        let offset = if best > 0 && best + 1 < scores.len() {
            let (a, b, c) = (scores[best - 1], scores[best], scores[best + 1]);
            let denom = a - 2.0 * b + c;
            if denom.abs() > f64::EPSILON {
                (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
            } else {
                0.0
            }
        } else {
            0.0
        };

        let lag = (lag_min + best) as f64 + offset;
        let bpm = 60.0 * frames_per_sec / lag;
        log::info!("OnsetTempoEstimator::estimate: {:.2} BPM", bpm);

        Ok(bpm)
    }

    fn name(&self) -> &'static str {
        "onset"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::SampleMatrix;

    /// Mono click track: short decaying 1 kHz bursts on every beat
    pub(crate) fn click_track(bpm: f64, seconds: f64, sample_rate: u32) -> DecodedAudio {
        let frames = (seconds * sample_rate as f64) as usize;
        let period = 60.0 / bpm * sample_rate as f64;
        let burst = (0.01 * sample_rate as f64) as usize;
        let mut data = vec![0.0f32; frames];

        let mut beat = 0.0;
        while (beat as usize) < frames {
            let start = beat as usize;
            for i in 0..burst.min(frames - start) {
                let t = i as f32 / sample_rate as f32;
                let decay = 1.0 - i as f32 / burst as f32;
                data[start + i] = (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * 0.8 * decay;
            }
            beat += period;
        }

        DecodedAudio::new(SampleMatrix::from_vec(data, frames, 1).unwrap(), sample_rate)
    }

    #[test]
    fn test_bpm_config_validate() {
        let config = BpmConfig::for_range(10, 500);
        assert_eq!(config.min_tempo, 40);
        assert_eq!(config.max_tempo, 250);

        let config = BpmConfig::for_range(170, 120);
        assert_eq!(config.min_tempo, 170);
        assert_eq!(config.max_tempo, 190);
    }

    #[test]
    fn test_click_track_120() {
        let estimator = OnsetTempoEstimator::new(BpmConfig::default());
        let bpm = estimator.estimate(&click_track(120.0, 12.0, 44100)).unwrap();
        assert!((bpm - 120.0).abs() < 2.0, "estimated {bpm}");
    }

    #[test]
    fn test_click_track_140() {
        let estimator = OnsetTempoEstimator::new(BpmConfig::default());
        let bpm = estimator.estimate(&click_track(140.0, 12.0, 44100)).unwrap();
        assert!((bpm - 140.0).abs() < 3.0, "estimated {bpm}");
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let estimator = OnsetTempoEstimator::new(BpmConfig::default());
        let audio = click_track(100.0, 8.0, 44100);
        assert_eq!(estimator.estimate(&audio).unwrap(), estimator.estimate(&audio).unwrap());
    }

    #[test]
    fn test_silence_and_short_input_fail() {
        let estimator = OnsetTempoEstimator::new(BpmConfig::default());

        let silence = DecodedAudio::new(SampleMatrix::zeros(44100 * 5, 1), 44100);
        assert!(estimator.estimate(&silence).is_err());

        let short = click_track(120.0, 0.5, 44100);
        assert!(estimator.estimate(&short).is_err());
    }
}
