//! Synthesis output files: voice audio, caption sidecar, temp lifecycle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use clipcast_common::clock::SkewClock;
use clipcast_common::error::{ClipcastError, ClipcastResult};
use tokio_util::sync::CancellationToken;

use crate::captions::{generate_srt, segment};
use crate::protocol::AUDIO_EXTENSION;
use crate::session::{SpeechSynthesizer, SynthesisRequest};

/// Result of a synthesize-to-file operation.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisFileResult {
    /// Synthesized audio duration in seconds; 0.0 when the duration could
    /// not be derived from the produced audio.
    pub duration_secs: f64,
}

static SETUP_MILLIS: OnceLock<u128> = OnceLock::new();

fn setup_millis() -> u128 {
    *SETUP_MILLIS.get_or_init(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    })
}

/// The process-fixed transient voice file path.
///
/// One path per process run; a later render resolves its default voice
/// track here.
pub fn transient_voice_path() -> PathBuf {
    std::env::temp_dir().join(format!("clipcast-voice-{}.{AUDIO_EXTENSION}", setup_millis()))
}

/// Caption sidecar path for an audio file: same stem, `.srt` extension.
pub fn caption_sidecar_path(audio_path: &Path) -> PathBuf {
    audio_path.with_extension("srt")
}

/// Delete the transient voice file and its caption sidecar, if present.
pub fn clear_transient_files() -> ClipcastResult<()> {
    let voice = transient_voice_path();
    if voice.exists() {
        std::fs::remove_file(&voice)?;
    }
    let srt = caption_sidecar_path(&voice);
    if srt.exists() {
        std::fs::remove_file(&srt)?;
    }
    Ok(())
}

/// Synthesize speech and write it to disk, optionally with an SRT sidecar.
///
/// With no explicit `output_path` the process-fixed transient voice path
/// is used. A pre-existing output file is replaced. Duration derivation is
/// best-effort: an unparseable audio stream yields the 0.0 sentinel rather
/// than failing the operation.
pub async fn synthesize_to_file(
    clock: Arc<SkewClock>,
    request: &SynthesisRequest,
    output_path: Option<PathBuf>,
    with_caption: bool,
    cancel: &CancellationToken,
) -> ClipcastResult<SynthesisFileResult> {
    let synthesizer = SpeechSynthesizer::new(clock);
    let result = synthesizer.synthesize(request, cancel).await?;

    let output_path = output_path.unwrap_or_else(transient_voice_path);
    if output_path.exists() {
        std::fs::remove_file(&output_path)?;
    }
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClipcastError::filesystem(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }
    std::fs::write(&output_path, result.audio())?;
    tracing::info!(path = %output_path.display(), bytes = result.audio_len(), "Voice track written");

    if with_caption {
        let cues = segment(result.word_boundaries());
        let srt_path = caption_sidecar_path(&output_path);
        if srt_path.exists() {
            std::fs::remove_file(&srt_path)?;
        }
        std::fs::write(&srt_path, generate_srt(&cues))?;
        tracing::info!(path = %srt_path.display(), cues = cues.len(), "Caption sidecar written");
    }

    let duration_secs = match probe_duration_secs(&output_path).await {
        Some(secs) => secs,
        None => {
            tracing::warn!("Could not derive audio duration, reporting 0");
            0.0
        }
    };

    Ok(SynthesisFileResult { duration_secs })
}

#[derive(Debug, serde::Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Derive the duration of a written audio file with `ffprobe`. Returns
/// `None` when the probe cannot run, fails, or reports no duration.
pub async fn probe_duration_secs(path: &Path) -> Option<f64> {
    let output = tokio::process::Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `ffprobe -print_format json -show_format` output into seconds.
fn parse_probe_duration(json: &str) -> Option<f64> {
    let probe: ProbeOutput = serde_json::from_str(json).ok()?;
    let duration = probe.format?.duration?.parse::<f64>().ok()?;
    duration.is_finite().then_some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_duration_parses_format_section() {
        let json = r#"{"format": {"filename": "voice.mp3", "duration": "2.400000", "size": "14400"}}"#;
        assert_eq!(parse_probe_duration(json), Some(2.4));
    }

    #[test]
    fn test_unparseable_probe_output_yields_none() {
        assert!(parse_probe_duration("").is_none());
        assert!(parse_probe_duration("not json").is_none());
        assert!(parse_probe_duration(r#"{"format": {}}"#).is_none());
        assert!(parse_probe_duration(r#"{"format": {"duration": "nan"}}"#).is_none());
        assert!(parse_probe_duration(r#"{"streams": []}"#).is_none());
    }

    #[tokio::test]
    async fn test_probe_of_missing_file_yields_none() {
        // Whether ffprobe is installed or not, a nonexistent input must
        // degrade to None rather than error.
        let path = Path::new("/nonexistent/clipcast-no-such-voice.mp3");
        assert_eq!(probe_duration_secs(path).await, None);
    }

    #[test]
    fn test_caption_sidecar_path() {
        let audio = Path::new("/tmp/clipcast-voice-1.mp3");
        assert_eq!(
            caption_sidecar_path(audio),
            Path::new("/tmp/clipcast-voice-1.srt")
        );
    }

    #[test]
    fn test_transient_path_is_stable_within_process() {
        assert_eq!(transient_voice_path(), transient_voice_path());
        assert_eq!(
            transient_voice_path().extension().and_then(|e| e.to_str()),
            Some("mp3")
        );
    }
}
