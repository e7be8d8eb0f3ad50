//! Offline time-stretching via signalsmith-stretch
//!
//! The stretcher changes duration without changing pitch. Output length is
//! `input / rate`: a rate above 1.0 shortens the track.

use std::sync::Mutex;

use anyhow::{anyhow, ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use signalsmith_stretch::Stretch;

use crate::types::SampleMatrix;

/// Time-stretch seam used by the pipeline
pub trait TimeStretcher {
    /// Stretch a `(channels, frames)` buffer
    ///
    /// When `min_rate < max_rate` the implementation picks one rate within
    /// the range. The channel count must be preserved.
    fn stretch(
        &self,
        channel_major: &SampleMatrix,
        sample_rate: u32,
        min_rate: f64,
        max_rate: f64,
    ) -> Result<SampleMatrix>;

    fn name(&self) -> &'static str;
}

/// signalsmith-stretch in offline mode
///
/// Each call builds a fresh stretcher for the buffer's channel count, feeds
/// the whole input, flushes the tail and trims the latency so that output
/// frame 0 lines up with input frame 0.
pub struct SignalsmithStretcher {
    rng: Mutex<StdRng>,
}

impl SignalsmithStretcher {
    /// Stretcher with an entropy-seeded rate generator
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Stretcher whose rate picks are reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick the rate for one call
    fn pick_rate(&self, min_rate: f64, max_rate: f64) -> Result<f64> {
        if min_rate >= max_rate {
            return Ok(min_rate);
        }
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow!("rate generator lock poisoned"))?;
        Ok(rng.gen_range(min_rate..=max_rate))
    }
}

impl Default for SignalsmithStretcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeStretcher for SignalsmithStretcher {
    fn stretch(
        &self,
        channel_major: &SampleMatrix,
        sample_rate: u32,
        min_rate: f64,
        max_rate: f64,
    ) -> Result<SampleMatrix> {
        ensure!(
            min_rate.is_finite() && min_rate > 0.0 && max_rate.is_finite(),
            "invalid stretch rates {}..{}",
            min_rate,
            max_rate
        );
        let (channels, frames) = channel_major.shape();
        ensure!(channels > 0 && frames > 0, "cannot stretch an empty buffer");

        let rate = self.pick_rate(min_rate, max_rate)?;
        let out_frames = ((frames as f64) / rate).round().max(1.0) as usize;
        log::debug!(
            "SignalsmithStretcher::stretch: {} ch, {} -> {} frames at rate {:.4}",
            channels,
            frames,
            out_frames,
            rate
        );

        let mut stretcher = Stretch::preset_default(channels as u32, sample_rate);
        let delay = stretcher.output_latency()
            + ((stretcher.input_latency() as f64) / rate).round() as usize;

        // signalsmith works on interleaved frames
        let interleaved = channel_major.transpose();

        let mut body = vec![0.0f32; out_frames * channels];
        stretcher.process(interleaved.as_slice(), &mut body[..]);

        let mut tail = vec![0.0f32; delay * channels];
        stretcher.flush(&mut tail[..]);

        body.extend_from_slice(&tail);
        let aligned: Vec<f32> = body
            .into_iter()
            .skip(delay * channels)
            .take(out_frames * channels)
            .collect();

        let stretched = SampleMatrix::from_vec(aligned, out_frames, channels)
            .ok_or_else(|| anyhow!("stretch produced a short buffer"))?;

        Ok(stretched.transpose())
    }

    fn name(&self) -> &'static str {
        "signalsmith"
    }
}
