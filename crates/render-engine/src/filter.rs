//! Filter-graph compilation.
//!
//! Turns a [`RenderRequest`] into the complete argument vector for one
//! encoder invocation. The builder is deterministic: an identical request
//! against an identical filesystem state yields a byte-identical vector.
//! The only I/O performed is probing the destination path for collisions.

use std::path::{Path, PathBuf};

use clipcast_common::{ClipcastError, ClipcastResult};
use serde::{Deserialize, Serialize};

/// Output frame rate applied to every clip and the encode.
const OUTPUT_FPS: u32 = 30;

/// One source clip with its trim window in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSource {
    pub path: PathBuf,
    pub trim_start_secs: f64,
    pub trim_end_secs: f64,
}

/// Target output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

impl Default for OutputSize {
    fn default() -> Self {
        // Portrait short-video format.
        Self {
            width: 1080,
            height: 1920,
        }
    }
}

/// Everything the builder needs to compile one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub clips: Vec<ClipSource>,
    pub voice_path: PathBuf,
    pub music_path: Option<PathBuf>,
    pub caption_path: Option<PathBuf>,
    pub output_size: OutputSize,
    /// Caps the *output* duration, not wall-clock encode time.
    pub output_duration_secs: Option<f64>,
    /// Desired destination; the builder resolves name collisions.
    pub destination: PathBuf,
}

/// Compiled invocation: filter clauses, full argument vector, and the
/// collision-resolved destination the final positional argument points at.
#[derive(Debug, Clone)]
pub struct FilterGraph {
    pub filters: Vec<String>,
    pub args: Vec<String>,
    pub destination: PathBuf,
}

/// Compile a request into an encoder argument vector.
pub fn build_filter_graph(request: &RenderRequest) -> ClipcastResult<FilterGraph> {
    if request.clips.is_empty() {
        return Err(ClipcastError::validation("render request has no clips"));
    }

    let width = request.output_size.width;
    let height = request.output_size.height;
    let voice_index = request.clips.len();
    let music_index = request.music_path.as_ref().map(|_| voice_index + 1);

    let mut args: Vec<String> = Vec::new();
    for clip in &request.clips {
        args.push("-i".to_string());
        args.push(clip.path.display().to_string());
    }
    args.push("-i".to_string());
    args.push(request.voice_path.display().to_string());
    if let Some(music) = &request.music_path {
        args.push("-i".to_string());
        args.push(music.display().to_string());
    }

    let mut filters: Vec<String> = Vec::new();

    for (i, clip) in request.clips.iter().enumerate() {
        filters.push(format!(
            "[{i}:v]trim=start={start}:end={end},setpts=PTS-STARTPTS,\
             scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,\
             fps={OUTPUT_FPS},format=yuv420p,setsar=1[v{i}]",
            start = clip.trim_start_secs,
            end = clip.trim_end_secs,
        ));
    }

    let concat_inputs: String = (0..request.clips.len()).map(|i| format!("[v{i}]")).collect();
    filters.push(format!(
        "{concat_inputs}concat=n={n}:v=1:a=0[vout]",
        n = request.clips.len(),
    ));

    let video_label = if let Some(captions) = &request.caption_path {
        filters.push(format!(
            "[vout]subtitles='{}'[with_subs]",
            escape_filter_path(captions),
        ));
        "[with_subs]"
    } else {
        "[vout]"
    };

    filters.push(format!("[{voice_index}:a]volume=2.0[voice]"));
    if let Some(music_index) = music_index {
        filters.push(format!("[{music_index}:a]volume=0.5[bgm]"));
        filters.push("[voice][bgm]amix=inputs=2:duration=longest[aout]".to_string());
    } else {
        filters.push("[voice]anull[aout]".to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(filters.join(";"));
    args.push("-map".to_string());
    args.push(video_label.to_string());
    args.push("-map".to_string());
    args.push("[aout]".to_string());

    args.extend(
        [
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-crf",
            "23",
            "-r",
            "30",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-s",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(format!("{width}x{height}"));
    args.push("-progress".to_string());
    args.push("pipe:1".to_string());

    if let Some(cap) = request.output_duration_secs {
        args.push("-t".to_string());
        args.push(cap.to_string());
    }

    let destination = resolve_collision_free(&request.destination);
    args.push(destination.display().to_string());

    Ok(FilterGraph {
        filters,
        args,
        destination,
    })
}

/// Escape a path for embedding in a single-quoted filter option.
///
/// Colons delimit filter options and quotes/backslashes delimit the quoted
/// string itself, so all three must be escaped.
fn escape_filter_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Append `(1)`, `(2)`, ... before the extension until the name is unused.
pub fn resolve_collision_free(desired: &Path) -> PathBuf {
    if !desired.exists() {
        return desired.to_path_buf();
    }

    let stem = desired
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = desired.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = desired.parent().unwrap_or_else(|| Path::new(""));

    for n in 1.. {
        let name = match &extension {
            Some(ext) => format!("{stem}({n}).{ext}"),
            None => format!("{stem}({n})"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("collision counter exhausted");
}
