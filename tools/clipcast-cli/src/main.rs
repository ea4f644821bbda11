//! Clipcast CLI — Command-line interface for narration and rendering.
//!
//! Usage:
//!   clipcast voices [OPTIONS]      List available narration voices
//!   clipcast speak <TEXT>          Synthesize narration to an audio file
//!   clipcast render <CLIPS>...     Assemble clips, narration, and music
//!   clipcast check                 Check encoder availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clipcast_common::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "clipcast",
    about = "Short-video assembly with synthesized narration and captions",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available narration voices
    Voices {
        /// Only show voices for this locale (e.g. "en-US")
        #[arg(short, long)]
        locale: Option<String>,
    },

    /// Synthesize narration to an audio file
    Speak {
        /// Text to speak
        text: String,

        /// Voice short name (defaults from config)
        #[arg(long)]
        voice: Option<String>,

        /// Pitch adjustment in Hz, integer in [-100, 100]
        #[arg(long)]
        pitch: Option<i32>,

        /// Rate adjustment in percent, [-100, 100]
        #[arg(long)]
        rate: Option<f64>,

        /// Volume adjustment in percent, integer in [-100, 100]
        #[arg(long)]
        volume: Option<i32>,

        /// Output audio file (defaults to a temporary voice track)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip writing the caption sidecar
        #[arg(long)]
        no_caption: bool,
    },

    /// Assemble clips, narration, and music into a short video
    Render {
        /// Source clips, in order
        #[arg(required = true)]
        clips: Vec<PathBuf>,

        /// Trim window per clip as start:end seconds, once per clip
        #[arg(short, long)]
        trim: Vec<String>,

        /// Narration audio track (defaults to the last synthesized one)
        #[arg(long)]
        voice_file: Option<PathBuf>,

        /// Background music track
        #[arg(long)]
        music: Option<PathBuf>,

        /// Caption file to burn in (defaults to the narration sidecar)
        #[arg(long)]
        captions: Option<PathBuf>,

        /// Output width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Output height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Cap the output duration in seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Destination directory (must exist)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output file name
        #[arg(long, default_value = "clip.mp4")]
        name: String,
    },

    /// Check encoder availability
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load();
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    clipcast_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Voices { locale } => commands::voices::run(locale).await,
        Commands::Speak {
            text,
            voice,
            pitch,
            rate,
            volume,
            output,
            no_caption,
        } => {
            commands::speak::run(
                &config, text, voice, pitch, rate, volume, output, no_caption,
            )
            .await
        }
        Commands::Render {
            clips,
            trim,
            voice_file,
            music,
            captions,
            width,
            height,
            duration,
            output_dir,
            name,
        } => {
            commands::render::run(
                &config, clips, trim, voice_file, music, captions, width, height, duration,
                output_dir, name,
            )
            .await
        }
        Commands::Check => commands::check::run().await,
    }
}
