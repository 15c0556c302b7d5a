//! Voice-note pipeline: ship a recording to the backend, transcribe it,
//! clean up the temporary file.

use std::path::Path;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::CompanionError;
use crate::gateway::Gateway;

/// Generate a throwaway name for an uploaded recording.
pub fn temp_wav_name() -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let stem: String = (0..12)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect();
    format!("{stem}.wav")
}

/// Read a recorded WAV from disk. A missing or empty file short-circuits
/// with a typed error instead of an opaque upload failure.
pub fn read_wav(path: &Path) -> Result<Vec<u8>, CompanionError> {
    if !path.exists() {
        return Err(CompanionError::MissingInput {
            what: "recording file",
        });
    }
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(CompanionError::MissingInput { what: "audio data" });
    }
    Ok(bytes)
}

/// Run one recording through the backend: save, transcribe, delete the
/// temporary upload. Returns the transcription text.
///
/// Cleanup failure is logged and swallowed; the transcription already
/// succeeded and the stale file is the backend's problem.
pub async fn transcribe_recording(
    gateway: &Gateway,
    wav: Vec<u8>,
) -> Result<String, CompanionError> {
    if wav.is_empty() {
        return Err(CompanionError::MissingInput { what: "audio data" });
    }

    let name = temp_wav_name();
    let stored_path = gateway.save_audio(wav, &name).await?;
    debug!(path = %stored_path, "recording saved");

    let text = gateway.transcribe(&stored_path).await?;

    if let Err(e) = gateway.delete_audio(&stored_path).await {
        warn!(error = %e, path = %stored_path, "temporary recording not cleaned up");
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_temp_wav_name_shape() {
        let name = temp_wav_name();
        assert!(name.ends_with(".wav"));
        assert_eq!(name.len(), 16);
        let stem = name.trim_end_matches(".wav");
        assert!(stem
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_temp_wav_names_vary() {
        let names: std::collections::HashSet<String> =
            (0..50).map(|_| temp_wav_name()).collect();
        assert!(names.len() > 45);
    }

    #[test]
    fn test_read_wav_missing_file() {
        let err = read_wav(Path::new("/definitely/not/here.wav")).expect_err("missing");
        assert!(matches!(err, CompanionError::MissingInput { .. }));
    }

    #[test]
    fn test_read_wav_empty_file() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let err = read_wav(file.path()).expect_err("empty");
        assert!(matches!(
            err,
            CompanionError::MissingInput { what: "audio data" }
        ));
    }

    #[test]
    fn test_read_wav_returns_bytes() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"RIFF....WAVE").expect("write");
        let bytes = read_wav(file.path()).expect("read");
        assert_eq!(bytes, b"RIFF....WAVE");
    }

    #[tokio::test]
    async fn test_transcribe_recording_rejects_empty_input() {
        let gateway = Gateway::new(crate::gateway::GatewayConfig::new(
            "http://127.0.0.1:5000",
        ))
        .expect("client");
        let err = transcribe_recording(&gateway, Vec::new())
            .await
            .expect_err("empty input");
        assert!(matches!(
            err,
            CompanionError::MissingInput { what: "audio data" }
        ));
    }
}
