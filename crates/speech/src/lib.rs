//! Clipcast Speech Synthesis
//!
//! Streaming client for the readaloud synthesis endpoint:
//! - **Token:** time-bucketed `Sec-MS-GEC` derivation from a skew-corrected clock
//! - **Protocol:** framed pseudo-HTTP messages over a persistent WebSocket
//! - **Session:** per-call state machine producing audio plus timed word boundaries
//! - **Captions:** word-boundary segmentation into SRT cues
//! - **Voices:** catalog listing over plain HTTPS

pub mod captions;
pub mod output;
pub mod protocol;
pub mod session;
pub mod token;
pub mod voices;

pub use captions::*;
pub use output::*;
pub use protocol::WordBoundary;
pub use session::*;
pub use voices::*;
