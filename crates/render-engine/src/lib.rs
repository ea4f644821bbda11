//! Clipcast Render Engine
//!
//! Compiles a declarative render request into a single encoder invocation
//! and supervises the resulting process.
//!
//! # Pipeline Architecture
//!
//! ```text
//! clip0.mp4 ──┐
//! clip1.mp4 ──┼── Trim/Scale/Pad ── Concat ── Subtitle Burn ──┐
//! clipN.mp4 ──┘                                               ├── Encode (H.264)
//! voice.mp3 ──── Gain (2.0x) ──┐                              │
//! music.mp3 ──── Duck (0.5x) ──┴── Mix ──────────────────────-┘
//!                                                             │
//!                                                             ▼
//!                                                        output.mp4
//! ```
//!
//! The topology is fixed: N trimmed clips concatenated into one video
//! stream, one voice track, one optional music track, one optional
//! caption overlay. Arbitrary filter composition is out of scope.

pub mod filter;
pub mod orchestrator;
pub mod supervisor;

pub use filter::{build_filter_graph, ClipSource, FilterGraph, OutputSize, RenderRequest};
pub use orchestrator::{render, RenderJob};
pub use supervisor::{run_encoder, EncoderBinary, EncoderOutput};
