//! Assemble clips, narration, and music into a short video.

use std::path::PathBuf;

use clipcast_common::AppConfig;
use clipcast_render_engine::{render, ClipSource, EncoderBinary, OutputSize, RenderJob};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &AppConfig,
    clips: Vec<PathBuf>,
    trim: Vec<String>,
    voice_file: Option<PathBuf>,
    music: Option<PathBuf>,
    captions: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<f64>,
    output_dir: Option<PathBuf>,
    name: String,
) -> anyhow::Result<()> {
    if trim.len() != clips.len() {
        anyhow::bail!(
            "expected one --trim start:end per clip ({} clips, {} trims)",
            clips.len(),
            trim.len()
        );
    }

    let clips: Vec<ClipSource> = clips
        .into_iter()
        .zip(trim.iter())
        .map(|(path, window)| {
            let (start, end) = parse_trim(window)?;
            Ok(ClipSource {
                path,
                trim_start_secs: start,
                trim_end_secs: end,
            })
        })
        .collect::<anyhow::Result<_>>()?;

    let job = RenderJob {
        clips,
        voice_path: voice_file,
        music_path: music,
        caption_path: captions,
        output_size: OutputSize {
            width: width.unwrap_or(config.render.width),
            height: height.unwrap_or(config.render.height),
        },
        output_duration_secs: duration,
        output_dir: output_dir.unwrap_or_else(|| config.render.output_dir.clone()),
        file_name: name,
    };

    println!("Rendering {} clip(s)", job.clips.len());

    let (tx, mut rx) = mpsc::channel(32);
    let printer = tokio::spawn(async move {
        use std::io::Write;
        while let Some(value) = rx.recv().await {
            print!("\r  Progress: {value}%  ");
            let _ = std::io::stdout().flush();
        }
    });

    let cancel = CancellationToken::new();
    let result = render(job, &EncoderBinary::default(), Some(tx), &cancel).await;
    let _ = printer.await;

    match result {
        Ok(destination) => {
            println!("\nRender complete: {}", destination.display());
            Ok(())
        }
        Err(e) => {
            println!("\nRender failed: {e}");
            Err(e.into())
        }
    }
}

fn parse_trim(window: &str) -> anyhow::Result<(f64, f64)> {
    let (start, end) = window
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("trim must be start:end seconds, got {window:?}"))?;
    let start: f64 = start.parse()?;
    let end: f64 = end.parse()?;
    if !(start >= 0.0 && end > start) {
        anyhow::bail!("trim window must satisfy 0 <= start < end, got {window:?}");
    }
    Ok((start, end))
}
