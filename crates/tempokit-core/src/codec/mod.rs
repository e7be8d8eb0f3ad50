//! Audio container decode and encode
//!
//! Decoding goes through symphonia for every input format. Encoding writes
//! WAV as 32-bit float with hound and MP3 with LAME.

mod mp3;

use std::io::Cursor;

use anyhow::{anyhow, bail, Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::types::{AudioFormat, DecodedAudio, OutputFormat};

/// Encoder/decoder seam used by the pipeline
pub trait AudioCodec {
    /// Decode encoded bytes to `(frames, channels)` samples
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<DecodedAudio>;

    /// Encode samples into a complete file image
    fn encode(&self, audio: &DecodedAudio, format: OutputFormat) -> Result<Vec<u8>>;
}

/// symphonia decoder with hound/LAME encoders
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaCodec;

impl AudioCodec for SymphoniaCodec {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<DecodedAudio> {
        decode_bytes(bytes, format)
    }

    fn encode(&self, audio: &DecodedAudio, format: OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Wav => encode_wav(audio),
            OutputFormat::Mp3 => mp3::encode_mp3(audio),
        }
    }
}

fn open_reader(bytes: &[u8], format: AudioFormat) -> Result<Box<dyn FormatReader>> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("unsupported or corrupt {} data", format))?;

    Ok(probed.format)
}

/// Sample rate declared by the container, without decoding any packets
pub(crate) fn header_sample_rate(bytes: &[u8], format: AudioFormat) -> Option<u32> {
    let reader = open_reader(bytes, format).ok()?;
    reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .and_then(|t| t.codec_params.sample_rate)
}

/// Decode a complete in-memory file
fn decode_bytes(bytes: &[u8], format: AudioFormat) -> Result<DecodedAudio> {
    let mut reader = open_reader(bytes, format)?;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no audio track found"))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("no decoder for audio track")?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("decode_bytes: Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("decode_bytes: Error decoding packet: {}", e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            sample_rate = Some(spec.rate);
            channels = Some(spec.channels.count());
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| anyhow!("unknown sample rate"))?;
    let channels = channels.ok_or_else(|| anyhow!("unknown channel count"))?;
    if samples.is_empty() {
        bail!("no audio samples decoded");
    }

    log::debug!(
        "decode_bytes: {} frames, {} ch @ {} Hz",
        samples.len() / channels.max(1),
        channels,
        sample_rate
    );

    DecodedAudio::from_interleaved(samples, channels, sample_rate)
        .ok_or_else(|| anyhow!("decoded sample count is not a multiple of {} channels", channels))
}

/// 32-bit float WAV
fn encode_wav(audio: &DecodedAudio) -> Result<Vec<u8>> {
    let channels = u16::try_from(audio.channels()).context("too many channels for WAV")?;
    if channels == 0 {
        bail!("cannot encode audio without channels");
    }

    let spec = WavSpec {
        channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).context("failed to start WAV stream")?;
        for &sample in audio.interleaved() {
            writer.write_sample(sample)?;
        }
        writer.finalize().context("failed to finalize WAV stream")?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Stereo sine as a 16-bit WAV file image
    pub(crate) fn sine_wav(seconds: f32, sample_rate: u32) -> Vec<u8> {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (seconds * sample_rate as f32) as usize;
            for i in 0..frames {
                let t = i as f32 / sample_rate as f32;
                let s = ((2.0 * std::f32::consts::PI * 220.0 * t).sin() * 0.4 * i16::MAX as f32) as i16;
                writer.write_sample(s).unwrap();
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_wav() {
        let bytes = sine_wav(0.5, 44100);
        let audio = SymphoniaCodec.decode(&bytes, AudioFormat::Wav).unwrap();

        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.frames(), 22050);
        assert!(audio.samples.peak() > 0.3);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = SymphoniaCodec.decode(b"definitely not audio", AudioFormat::Wav);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_wav_is_float32() {
        let audio = DecodedAudio::from_interleaved(vec![0.25, -0.25, 0.5, -0.5], 2, 48000).unwrap();
        let bytes = SymphoniaCodec.encode(&audio, OutputFormat::Wav).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_format, SampleFormat::Float);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_rate, 48000);
        let samples: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.25, -0.25, 0.5, -0.5]);
    }

    #[test]
    fn test_wav_mp3_wav_round_trip() {
        let codec = SymphoniaCodec;
        let original = codec.decode(&sine_wav(1.0, 44100), AudioFormat::Wav).unwrap();

        let mp3 = codec.encode(&original, OutputFormat::Mp3).unwrap();
        let from_mp3 = codec.decode(&mp3, AudioFormat::Mp3).unwrap();
        let wav = codec.encode(&from_mp3, OutputFormat::Wav).unwrap();
        let back = codec.decode(&wav, AudioFormat::Wav).unwrap();

        assert_eq!(back.sample_rate, 44100);
        assert!(back.frames() > 0);
        assert!(back.samples.all_finite());
    }
}
