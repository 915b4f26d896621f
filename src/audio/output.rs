//! Audio output device
//!
//! [`AudioOutput`] starts clips; a [`Clip`] can be paused and awaited.
//! [`SpeakerOutput`] plays through the default `cpal` device.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::watch;

use crate::{Error, Result};

/// Sample rate of raw PCM returned by the TTS action
pub const PCM_SAMPLE_RATE: u32 = 24000;

/// A playing clip
#[async_trait]
pub trait Clip: Send + Sync {
    /// Stop output immediately; a paused clip never resumes
    fn pause(&self);

    /// Resolve when the clip ends naturally or fails
    async fn finished(&self) -> Result<()>;
}

/// Device that can start clips
pub trait AudioOutput: Send + Sync {
    /// Decode `audio` and start playing it
    ///
    /// # Errors
    ///
    /// Returns [`Error::Playback`] if the payload cannot be decoded or the
    /// device cannot be opened
    fn play(&self, audio: &[u8]) -> Result<Arc<dyn Clip>>;
}

/// Mono f32 samples with their rate
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode MP3, WAV or raw 16-bit little-endian PCM
///
/// # Errors
///
/// Returns [`Error::Playback`] if the payload is empty or malformed
pub fn decode(audio: &[u8]) -> Result<Decoded> {
    if audio.is_empty() {
        return Err(Error::Playback("empty audio payload".to_string()));
    }

    let decoded = if audio.starts_with(b"RIFF") {
        decode_wav(audio)?
    } else if audio.starts_with(b"ID3") {
        decode_mp3(audio)?
    } else if is_mp3_frame_header(audio) {
        // a PCM clip can open with bytes that look like a frame sync
        match decode_mp3(audio) {
            Ok(mp3) if !mp3.samples.is_empty() => mp3,
            Ok(_) | Err(_) => {
                tracing::debug!("no MP3 frames found, decoding as PCM");
                decode_pcm(audio)
            }
        }
    } else {
        decode_pcm(audio)
    };

    if decoded.samples.is_empty() {
        return Err(Error::Playback("audio payload has no samples".to_string()));
    }
    Ok(decoded)
}

/// Frame sync plus version, layer, bitrate and sample-rate fields that are
/// not reserved or free-format
fn is_mp3_frame_header(audio: &[u8]) -> bool {
    let [b0, b1, b2, ..] = audio else {
        return false;
    };
    let version = (b1 >> 3) & 0b11;
    let layer = (b1 >> 1) & 0b11;
    let bitrate = b2 >> 4;
    let sample_rate = (b2 >> 2) & 0b11;

    *b0 == 0xFF
        && b1 & 0xE0 == 0xE0
        && version != 0b01
        && layer != 0b00
        && bitrate != 0b0000
        && bitrate != 0b1111
        && sample_rate != 0b11
}

fn decode_pcm(audio: &[u8]) -> Decoded {
    let samples = audio
        .chunks_exact(2)
        .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
        .collect();
    Decoded {
        samples,
        sample_rate: PCM_SAMPLE_RATE,
    }
}

fn decode_wav(audio: &[u8]) -> Result<Decoded> {
    let reader = hound::WavReader::new(Cursor::new(audio))
        .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / 32768.0))
            .collect::<std::result::Result<_, _>>(),
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>(),
    }
    .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?;

    Ok(Decoded {
        samples: downmix(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

fn decode_mp3(audio: &[u8]) -> Result<Decoded> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(audio));
    let mut samples = Vec::new();
    let mut sample_rate = PCM_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(PCM_SAMPLE_RATE);
                let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&pcm, frame.channels.max(1)));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(Decoded {
        samples,
        sample_rate,
    })
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    #[allow(clippy::cast_precision_loss)]
    let n = channels as f32;
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / n)
        .collect()
}

/// Plays clips on the default output device
#[derive(Debug, Default, Clone, Copy)]
pub struct SpeakerOutput;

impl AudioOutput for SpeakerOutput {
    fn play(&self, audio: &[u8]) -> Result<Arc<dyn Clip>> {
        let decoded = decode(audio)?;
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = watch::channel(None);

        let thread_stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("hanzi-playback".to_string())
            .spawn(move || {
                let outcome = play_blocking(&decoded, &thread_stop).map_err(|e| e.to_string());
                let _ = done_tx.send(Some(outcome));
            })?;

        Ok(Arc::new(SpeakerClip { stop, done: done_rx }))
    }
}

struct SpeakerClip {
    stop: Arc<AtomicBool>,
    done: watch::Receiver<Option<std::result::Result<(), String>>>,
}

#[async_trait]
impl Clip for SpeakerClip {
    fn pause(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    async fn finished(&self) -> Result<()> {
        let mut rx = self.done.clone();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Playback("playback thread exited".to_string()))?
            .clone();

        match outcome {
            Some(Ok(())) | None => Ok(()),
            Some(Err(e)) => Err(Error::Playback(e)),
        }
    }
}

/// Play samples on the calling thread until they end or `stop` is set
fn play_blocking(decoded: &Decoded, stop: &AtomicBool) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

    let rate = SampleRate(decoded.sample_rate);
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Playback(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .min_by_key(|c| c.channels())
        .ok_or_else(|| Error::Playback("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    let samples = Arc::new(decoded.samples.clone());
    let position = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let cb_samples = Arc::clone(&samples);
    let cb_position = Arc::clone(&position);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = cb_position.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels) {
                    let sample = cb_samples.get(pos).copied().unwrap_or(0.0);
                    frame.fill(sample);
                    if pos < cb_samples.len() {
                        pos += 1;
                    }
                }
                cb_position.store(pos, Ordering::Relaxed);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Playback(e.to_string()))?;

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    let duration_ms = (samples.len() as u64 * 1000) / u64::from(decoded.sample_rate.max(1));
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    while position.load(Ordering::Relaxed) < samples.len() {
        if stop.load(Ordering::SeqCst) {
            tracing::debug!("playback paused");
            drop(stream);
            return Ok(());
        }
        if Instant::now() > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    // Let the device drain its buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);
    tracing::debug!(samples = samples.len(), "playback complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_pcm_decodes_at_tts_rate() {
        let bytes = [0x00, 0x40, 0x00, 0xC0];
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.sample_rate, PCM_SAMPLE_RATE);
        assert_eq!(decoded.samples, vec![0.5, -0.5]);
    }

    #[test]
    fn wav_is_decoded_and_downmixed() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buf, spec).unwrap();
            for s in [16384i16, 0, -16384, 0] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let decoded = decode(buf.get_ref()).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.samples, vec![0.25, -0.25]);
    }

    #[test]
    fn empty_payload_rejected() {
        assert!(matches!(decode(&[]), Err(Error::Playback(_))));
    }

    #[test]
    fn pcm_starting_with_sync_bytes_is_not_mp3() {
        let mut bytes = vec![0xFF, 0xFF];
        for _ in 0..2000 {
            bytes.extend_from_slice(&[0x00, 0x20]);
        }

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.sample_rate, PCM_SAMPLE_RATE);
        assert_eq!(decoded.samples.len(), 2001);
        assert!(decoded.samples[0] < 0.0);
    }

    #[test]
    fn pcm_with_plausible_frame_header_falls_back() {
        // valid MPEG-1 layer III header, no frame body
        let mut bytes = vec![0xFF, 0xFB, 0x90, 0x64];
        bytes.extend(std::iter::repeat_n(0u8, 64));

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.sample_rate, PCM_SAMPLE_RATE);
        assert_eq!(decoded.samples.len(), bytes.len() / 2);
    }

    #[test]
    fn frame_header_fields_are_checked() {
        assert!(is_mp3_frame_header(&[0xFF, 0xFB, 0x90, 0x64]));
        assert!(!is_mp3_frame_header(&[0xFF, 0xFF, 0x00, 0x20]));
        assert!(!is_mp3_frame_header(&[0xFF, 0xEB, 0x90]));
        assert!(!is_mp3_frame_header(&[0xFF, 0xF9, 0x90]));
        assert!(!is_mp3_frame_header(&[0xFF, 0xFB]));
    }

    #[test]
    fn payload_without_samples_rejected() {
        assert!(matches!(decode(&[0x01]), Err(Error::Playback(_))));
    }
}
