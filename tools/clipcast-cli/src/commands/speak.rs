//! Synthesize narration to an audio file.

use std::path::PathBuf;
use std::sync::Arc;

use clipcast_common::{AppConfig, SkewClock};
use clipcast_speech::{synthesize_to_file, SynthesisOptions, SynthesisRequest};
use tokio_util::sync::CancellationToken;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &AppConfig,
    text: String,
    voice: Option<String>,
    pitch: Option<i32>,
    rate: Option<f64>,
    volume: Option<i32>,
    output: Option<PathBuf>,
    no_caption: bool,
) -> anyhow::Result<()> {
    let defaults = &config.synthesis;
    let request = SynthesisRequest {
        text,
        voice: voice.unwrap_or_else(|| defaults.voice.clone()),
        options: SynthesisOptions {
            pitch: pitch.unwrap_or(defaults.pitch),
            rate: rate.unwrap_or(defaults.rate),
            volume: volume.unwrap_or(defaults.volume),
        },
    };
    let with_caption = !no_caption && config.synthesis.caption;

    println!("Synthesizing with voice: {}", request.voice);

    let clock = Arc::new(SkewClock::new());
    let cancel = CancellationToken::new();
    let result = synthesize_to_file(clock, &request, output.clone(), with_caption, &cancel).await?;

    let written = output.unwrap_or_else(clipcast_speech::transient_voice_path);
    println!("Voice track: {}", written.display());
    if with_caption {
        println!(
            "Captions:    {}",
            clipcast_speech::caption_sidecar_path(&written).display()
        );
    }
    if result.duration_secs > 0.0 {
        println!("Duration:    {:.2}s", result.duration_secs);
    } else {
        println!("Duration:    unknown");
    }

    Ok(())
}
