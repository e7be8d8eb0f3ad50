//! MP3 encoding through LAME

use anyhow::{anyhow, bail, Result};
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};

use crate::types::DecodedAudio;

/// Constant bitrate used for every MP3 written
const BITRATE: Bitrate = Bitrate::Kbps192;

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Encode to a 192 kbps MP3 file image
///
/// Mono stays mono; anything wider is reduced to its first two channels,
/// the most LAME accepts.
pub(super) fn encode_mp3(audio: &DecodedAudio) -> Result<Vec<u8>> {
    let channels = audio.channels();
    if channels == 0 || audio.frames() == 0 {
        bail!("cannot encode empty audio to mp3");
    }
    let out_channels: u8 = if channels == 1 { 1 } else { 2 };
    if channels > 2 {
        log::warn!("encode_mp3: keeping the first 2 of {} channels", channels);
    }

    let mut builder = Builder::new().ok_or_else(|| anyhow!("failed to create LAME encoder"))?;
    builder
        .set_num_channels(out_channels)
        .map_err(|e| anyhow!("LAME channel setup failed: {:?}", e))?;
    builder
        .set_sample_rate(audio.sample_rate)
        .map_err(|e| anyhow!("LAME rejected sample rate {}: {:?}", audio.sample_rate, e))?;
    builder
        .set_brate(BITRATE)
        .map_err(|e| anyhow!("LAME bitrate setup failed: {:?}", e))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| anyhow!("LAME quality setup failed: {:?}", e))?;
    let mut encoder = builder
        .build()
        .map_err(|e| anyhow!("failed to initialize LAME: {:?}", e))?;

    let pcm: Vec<i16> = audio
        .interleaved()
        .chunks_exact(channels)
        .flat_map(|frame| frame[..out_channels as usize].iter().copied().map(to_i16))
        .collect();

    let mut out = Vec::new();
    out.reserve(mp3lame_encoder::max_required_buffer_size(pcm.len()));

    let encoded = if out_channels == 1 {
        encoder.encode(MonoPcm(&pcm), out.spare_capacity_mut())
    } else {
        encoder.encode(InterleavedPcm(&pcm), out.spare_capacity_mut())
    }
    .map_err(|e| anyhow!("LAME encode failed: {:?}", e))?;
    // SAFETY: LAME initialised exactly `encoded` bytes of the spare capacity
    unsafe {
        out.set_len(out.len().wrapping_add(encoded));
    }

    out.reserve(7200);
    let flushed = encoder
        .flush::<FlushNoGap>(out.spare_capacity_mut())
        .map_err(|e| anyhow!("LAME flush failed: {:?}", e))?;
    // SAFETY: as above, for the flushed bytes
    unsafe {
        out.set_len(out.len().wrapping_add(flushed));
    }

    log::debug!("encode_mp3: {} frames -> {} bytes", audio.frames(), out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_i16_clamps() {
        assert_eq!(to_i16(2.0), i16::MAX);
        assert_eq!(to_i16(-2.0), -i16::MAX);
        assert_eq!(to_i16(0.0), 0);
    }

    #[test]
    fn test_encode_mono_and_multichannel() {
        let mono = DecodedAudio::from_interleaved(vec![0.1; 4410], 1, 44100).unwrap();
        assert!(!encode_mp3(&mono).unwrap().is_empty());

        let quad = DecodedAudio::from_interleaved(vec![0.1; 4410 * 4], 4, 44100).unwrap();
        assert!(!encode_mp3(&quad).unwrap().is_empty());
    }
}
