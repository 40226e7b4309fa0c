use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;

#[cfg(feature = "ffmpeg-sidecar")]
use ffmpeg_sidecar::{download, paths::ffmpeg_path};
#[cfg(feature = "ffmpeg-sidecar")]
use std::io::Write;
#[cfg(feature = "ffmpeg-sidecar")]
use tempfile::NamedTempFile;

pub const DECODE_SAMPLE_RATE_HZ: u32 = 16_000;
pub const DECODE_TIMEOUT: Duration = Duration::from_secs(15);

#[cfg(feature = "ffmpeg-sidecar")]
const LOG_TARGET: &str = "decode";

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("ffmpeg unavailable: {0}")]
    FfmpegUnavailable(String),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("decode timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid pcm output: {0}")]
    InvalidPcm(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Turns an arbitrary audio container into mono 16 kHz signed 16-bit samples.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, audio: Bytes) -> BoxFuture<'_, Result<Vec<i16>>>;
}

/// Decoder for builds without an audio backend; every call reports the backend missing.
#[derive(Clone, Debug, Default)]
pub struct UnavailableDecoder;

impl AudioDecoder for UnavailableDecoder {
    fn decode(&self, _audio: Bytes) -> BoxFuture<'_, Result<Vec<i16>>> {
        async { Err(DecodeError::FfmpegUnavailable("built without ffmpeg-sidecar".to_owned())) }
            .boxed()
    }
}

#[cfg(feature = "ffmpeg-sidecar")]
#[derive(Clone, Debug)]
pub struct FfmpegAudioDecoder {
    timeout: Duration,
}

#[cfg(feature = "ffmpeg-sidecar")]
impl Default for FfmpegAudioDecoder {
    fn default() -> Self {
        Self {
            timeout: DECODE_TIMEOUT,
        }
    }
}

#[cfg(feature = "ffmpeg-sidecar")]
impl FfmpegAudioDecoder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn ensure_ffmpeg_available(&self) -> Result<()> {
        download::auto_download().map_err(|e| DecodeError::FfmpegUnavailable(e.to_string()))
    }

    /// Copies the recording to a temporary file so ffmpeg can seek it; MP4/M4A files
    /// often keep their index after the audio data.
    async fn spill_to_tempfile(audio: Bytes) -> Result<NamedTempFile> {
        tokio::task::spawn_blocking(move || {
            let mut file = tempfile::Builder::new()
                .prefix("voice-diary-")
                .tempfile()?;
            file.write_all(&audio)?;
            file.flush()?;
            Ok::<NamedTempFile, std::io::Error>(file)
        })
        .await
        .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?
        .map_err(|e| DecodeError::FfmpegFailed(format!("temp file: {e}")))
    }

    async fn decode_with_ffmpeg(&self, audio: Bytes) -> Result<Vec<i16>> {
        let input = Self::spill_to_tempfile(audio).await?;

        let mut child = tokio::process::Command::new(ffmpeg_path())
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-i"])
            .arg(input.path())
            .args([
                "-vn",
                "-sn",
                "-dn",
                "-ac",
                "1",
                "-ar",
                "16000",
                "-f",
                "s16le",
                "-acodec",
                "pcm_s16le",
                "pipe:1",
            ])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        let mut stdout = child.stdout.take().ok_or_else(|| {
            DecodeError::FfmpegFailed("ffmpeg stdout unavailable (pipe not created)".to_owned())
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            DecodeError::FfmpegFailed("ffmpeg stderr unavailable (pipe not created)".to_owned())
        })?;

        let stdout_task = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, std::io::Error>(buf)
        });

        let stderr_task = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, std::io::Error>(buf)
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?,
            Err(_) => {
                let _ = child.start_kill();
                return Err(DecodeError::Timeout(self.timeout));
            }
        };

        let stdout_bytes = stdout_task
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        let stderr_bytes = stderr_task
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        if !status.success() {
            let stderr_s = String::from_utf8_lossy(&stderr_bytes).trim().to_owned();
            return Err(DecodeError::FfmpegFailed(format!(
                "exit_code={:?} stderr={stderr_s}",
                status.code()
            )));
        }

        parse_s16le_mono(&stdout_bytes)
    }
}

#[cfg(feature = "ffmpeg-sidecar")]
impl AudioDecoder for FfmpegAudioDecoder {
    fn decode(&self, audio: Bytes) -> BoxFuture<'_, Result<Vec<i16>>> {
        let this = self.clone();
        async move {
            this.ensure_ffmpeg_available()?;
            let samples = this.decode_with_ffmpeg(audio).await?;
            tracing::debug!(
                target: LOG_TARGET,
                samples = samples.len(),
                duration_ms = duration_from_sample_count(DECODE_SAMPLE_RATE_HZ, samples.len())
                    .as_millis() as u64,
                "audio decoded"
            );
            Ok(samples)
        }
        .boxed()
    }
}

pub fn parse_s16le_mono(raw: &[u8]) -> Result<Vec<i16>> {
    if raw.len() % 2 != 0 {
        return Err(DecodeError::InvalidPcm(format!(
            "s16le byte length must be a multiple of 2, got {}",
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

pub fn duration_from_sample_count(sample_rate_hz: u32, sample_count: usize) -> Duration {
    if sample_rate_hz == 0 {
        return Duration::from_secs(0);
    }
    let micros = (u128::from(sample_count as u64) * 1_000_000u128) / u128::from(sample_rate_hz);
    Duration::from_micros(micros.min(u128::from(u64::MAX)) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_sample_count_mono_16k() {
        let d = duration_from_sample_count(16_000, 16_000);
        assert_eq!(d.as_secs(), 1);
        assert_eq!(duration_from_sample_count(0, 10), Duration::ZERO);
    }

    #[test]
    fn parse_s16le_rejects_odd_length() {
        let err = parse_s16le_mono(&[0, 1, 2]).unwrap_err();
        assert!(err.to_string().contains("multiple of 2"));
    }

    #[test]
    fn parse_s16le_little_endian() {
        let mut raw = Vec::new();
        for s in [0i16, -2, i16::MAX, i16::MIN] {
            raw.extend_from_slice(&s.to_le_bytes());
        }
        assert_eq!(parse_s16le_mono(&raw).unwrap(), vec![0, -2, i16::MAX, i16::MIN]);
        assert!(parse_s16le_mono(&[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_decoder_reports_missing_backend() {
        let err = UnavailableDecoder.decode(Bytes::from_static(b"abc")).await.unwrap_err();
        assert!(matches!(err, DecodeError::FfmpegUnavailable(_)));
    }

    /// 16 kHz mono s16 WAV with the canonical 44-byte RIFF header.
    #[cfg(feature = "ffmpeg-sidecar")]
    fn wav_bytes(samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&DECODE_SAMPLE_RATE_HZ.to_le_bytes());
        out.extend_from_slice(&(DECODE_SAMPLE_RATE_HZ * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[cfg(feature = "ffmpeg-sidecar")]
    fn triangle(len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| ((i % 64) as i16 - 32) * 400)
            .collect()
    }

    #[cfg(feature = "ffmpeg-sidecar")]
    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    // Needs ffmpeg on PATH or a sidecar download.
    #[cfg(feature = "ffmpeg-sidecar")]
    #[tokio::test]
    #[ignore]
    async fn ffmpeg_decodes_in_memory_wav() {
        let recorder = crate::util::log_capture::TargetRecorder::default();
        let _guard = recorder.install();
        let samples = triangle(1_600);
        let decoded = FfmpegAudioDecoder::default()
            .decode(Bytes::from(wav_bytes(&samples)))
            .await
            .unwrap();
        assert_eq!(decoded.len(), samples.len());
        assert_eq!(decoded, samples);
        assert!(recorder.targets().iter().any(|t| t == LOG_TARGET));
    }

    // Needs ffmpeg on PATH or a sidecar download.
    #[cfg(feature = "ffmpeg-sidecar")]
    #[tokio::test]
    #[ignore]
    async fn ffmpeg_decodes_m4a_with_trailing_index() {
        download::auto_download().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("in.wav");
        let m4a = dir.path().join("out.m4a");
        std::fs::write(&wav, wav_bytes(&triangle(16_000))).unwrap();

        // The mp4 muxer writes the moov atom last unless +faststart is requested.
        let status = std::process::Command::new(ffmpeg_path())
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(&wav)
            .args(["-c:a", "aac", "-f", "mp4"])
            .arg(&m4a)
            .status()
            .unwrap();
        assert!(status.success());

        let encoded = std::fs::read(&m4a).unwrap();
        let moov = find(&encoded, b"moov").unwrap();
        let mdat = find(&encoded, b"mdat").unwrap();
        assert!(moov > mdat, "fixture must keep its index after the audio");

        let decoded = FfmpegAudioDecoder::default()
            .decode(Bytes::from(encoded))
            .await
            .unwrap();
        assert!((decoded.len() as i64 - 16_000).abs() < 2_048, "got {}", decoded.len());
        assert!(decoded.iter().any(|s| s.unsigned_abs() > 1_000));
    }
}
