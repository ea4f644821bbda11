//! The single public render operation.
//!
//! Resolves default voice/caption paths, validates the destination,
//! compiles the filter graph, supervises the encoder, and cleans up the
//! transient synthesis artifacts on success. Cleanup is deliberately not
//! performed on the failure path; the error propagates unchanged.

use std::path::PathBuf;

use clipcast_common::{ClipcastError, ClipcastResult};
use clipcast_speech::{caption_sidecar_path, transient_voice_path};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::filter::{build_filter_graph, ClipSource, OutputSize, RenderRequest};
use crate::supervisor::{run_encoder, EncoderBinary};

/// Caller-facing render description. Voice and caption paths are optional;
/// absent values fall back to the transient files a prior synthesis wrote.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RenderJob {
    pub clips: Vec<ClipSource>,
    pub voice_path: Option<PathBuf>,
    pub music_path: Option<PathBuf>,
    pub caption_path: Option<PathBuf>,
    pub output_size: OutputSize,
    pub output_duration_secs: Option<f64>,
    pub output_dir: PathBuf,
    pub file_name: String,
}

/// Render a job to a collision-free path under `output_dir`.
///
/// Progress events and cancellation pass straight through to the encoder
/// supervisor. Returns the path the video was written to.
pub async fn render(
    job: RenderJob,
    binary: &EncoderBinary,
    progress: Option<mpsc::Sender<u8>>,
    cancel: &CancellationToken,
) -> ClipcastResult<PathBuf> {
    let voice_supplied = job.voice_path.is_some();
    let voice_path = job.voice_path.unwrap_or_else(transient_voice_path);

    // A derived sidecar is only used when the prior synthesis actually
    // produced one; an explicitly supplied path is trusted as-is. A
    // sidecar next to a supplied voice file is caller-owned too and is
    // never cleaned up.
    let caption_supplied = job.caption_path.is_some() || voice_supplied;
    let caption_path = job.caption_path.or_else(|| {
        let sidecar = caption_sidecar_path(&voice_path);
        sidecar.exists().then_some(sidecar)
    });

    if !job.output_dir.is_dir() {
        return Err(ClipcastError::filesystem(format!(
            "output directory does not exist: {}",
            job.output_dir.display()
        )));
    }

    let request = RenderRequest {
        clips: job.clips,
        voice_path: voice_path.clone(),
        music_path: job.music_path,
        caption_path: caption_path.clone(),
        output_size: job.output_size,
        output_duration_secs: job.output_duration_secs,
        destination: job.output_dir.join(&job.file_name),
    };

    let graph = build_filter_graph(&request)?;
    tracing::info!(
        clips = request.clips.len(),
        destination = %graph.destination.display(),
        "starting render"
    );

    run_encoder(binary, &graph.args, progress, cancel).await?;

    if !voice_supplied {
        remove_transient(&voice_path);
    }
    if !caption_supplied {
        if let Some(caption) = &caption_path {
            remove_transient(caption);
        }
    }

    tracing::info!(destination = %graph.destination.display(), "render finished");
    Ok(graph.destination)
}

fn remove_transient(path: &std::path::Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed transient file"),
        Err(err) => tracing::debug!(path = %path.display(), error = %err, "transient file not removed"),
    }
}
