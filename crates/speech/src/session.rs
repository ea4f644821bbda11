//! Per-call synthesis session over the persistent socket.
//!
//! Each `synthesize` call owns an independent socket and independent
//! buffers; the only shared state is the skew-corrected clock behind the
//! token generator. The session walks
//! `Connecting → ConfigSent → SpeechSent → Streaming → Closed`,
//! demultiplexing inbound frames into audio chunks and word boundaries.

use std::sync::Arc;

use clipcast_common::clock::SkewClock;
use clipcast_common::error::{ClipcastError, ClipcastResult};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::protocol::{
    build_config_message, build_speech_message, build_ssml, parse_frame, Frame, WordBoundary,
};
use crate::token::{
    TokenGenerator, CHROMIUM_MAJOR_VERSION, SEC_MS_GEC_VERSION, TRUSTED_CLIENT_TOKEN, WSS_URL,
};

/// Prosody options for one synthesis call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisOptions {
    /// Pitch adjustment in Hz, integer in [-100, 100].
    pub pitch: i32,
    /// Rate adjustment in percent, [-100, 100]. Unlike pitch and volume
    /// this accepts fractional values.
    pub rate: f64,
    /// Volume adjustment in percent, integer in [-100, 100].
    pub volume: i32,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            pitch: 0,
            rate: 0.0,
            volume: 0,
        }
    }
}

/// One synthesis request: text, voice, prosody.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub options: SynthesisOptions,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            options: SynthesisOptions::default(),
        }
    }
}

/// Immutable aggregate of one successful session.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    audio: Vec<u8>,
    word_boundaries: Vec<WordBoundary>,
}

impl SynthesisResult {
    fn new(audio_chunks: Vec<Vec<u8>>, word_boundaries: Vec<WordBoundary>) -> Self {
        Self {
            audio: audio_chunks.concat(),
            word_boundaries,
        }
    }

    /// Concatenated audio bytes in arrival order.
    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    /// Word boundaries in receipt order (nondecreasing offsets).
    pub fn word_boundaries(&self) -> &[WordBoundary] {
        &self.word_boundaries
    }

    /// Audio size in bytes.
    pub fn audio_len(&self) -> usize {
        self.audio.len()
    }
}

/// Demultiplexed frame buffers of one in-flight session.
#[derive(Debug, Default)]
struct FrameAccumulator {
    audio_chunks: Vec<Vec<u8>>,
    word_boundaries: Vec<WordBoundary>,
}

impl FrameAccumulator {
    /// Absorb one parsed frame. Returns true when the turn is complete
    /// and the client should close the socket.
    fn absorb(&mut self, frame: Frame) -> bool {
        match frame {
            Frame::Metadata(Some(word)) => self.word_boundaries.push(word),
            Frame::Metadata(None) => {}
            Frame::Audio(data) if !data.is_empty() => self.audio_chunks.push(data),
            Frame::Audio(_) => {}
            Frame::TurnEnd => return true,
            Frame::Other => {}
        }
        false
    }

    /// Finalize the stream. A session that produced no audio bytes is a
    /// protocol failure even when the turn ended cleanly.
    fn finish(self) -> ClipcastResult<SynthesisResult> {
        if self.audio_chunks.is_empty() {
            return Err(ClipcastError::protocol("no audio data"));
        }
        Ok(SynthesisResult::new(self.audio_chunks, self.word_boundaries))
    }
}

/// Validate prosody options before any network activity.
///
/// Pitch and volume are integers by type; rate additionally has to be
/// finite. All three are range checked at ±100.
pub fn validate_options(options: &SynthesisOptions) -> ClipcastResult<()> {
    if !(-100..=100).contains(&options.pitch) {
        return Err(ClipcastError::validation(format!(
            "invalid pitch {}: expected integer between -100 and 100 Hz",
            options.pitch
        )));
    }
    if !options.rate.is_finite() || options.rate < -100.0 || options.rate > 100.0 {
        return Err(ClipcastError::validation(format!(
            "invalid rate {}: expected value between -100 and 100%",
            options.rate
        )));
    }
    if !(-100..=100).contains(&options.volume) {
        return Err(ClipcastError::validation(format!(
            "invalid volume {}: expected integer between -100 and 100%",
            options.volume
        )));
    }
    Ok(())
}

/// Speech synthesizer holding the shared skew clock.
#[derive(Debug, Clone)]
pub struct SpeechSynthesizer {
    token: TokenGenerator,
}

impl SpeechSynthesizer {
    pub fn new(clock: Arc<SkewClock>) -> Self {
        Self {
            token: TokenGenerator::new(clock),
        }
    }

    /// Run one synthesis session to completion.
    ///
    /// Fails with `Validation` before connecting on out-of-range prosody,
    /// with `Protocol` on socket errors or an audio-less stream, and with
    /// `Cancelled` when the token fires at the socket wait.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> ClipcastResult<SynthesisResult> {
        validate_options(&request.options)?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let url = format!(
            "{WSS_URL}?trustedclienttoken={TRUSTED_CLIENT_TOKEN}\
             &Sec-MS-GEC={}&Sec-MS-GEC-Version={SEC_MS_GEC_VERSION}\
             &ConnectionId={request_id}",
            self.token.generate()
        );

        tracing::debug!(request_id = %request_id, voice = %request.voice, "Opening synthesis socket");

        let ws_request = build_upgrade_request(&url)?;
        let (mut socket, _response) = match connect_async(ws_request).await {
            Ok(pair) => pair,
            Err(err) => return Err(self.map_connect_error(err)),
        };

        let ssml = build_ssml(
            &request.text,
            &request.voice,
            request.options.pitch,
            request.options.rate,
            request.options.volume,
        );
        socket
            .send(Message::Text(build_config_message()))
            .await
            .map_err(|e| ClipcastError::protocol(format!("failed to send config: {e}")))?;
        socket
            .send(Message::Text(build_speech_message(&request_id, &ssml)))
            .await
            .map_err(|e| ClipcastError::protocol(format!("failed to send speech request: {e}")))?;

        let mut accumulator = FrameAccumulator::default();

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = socket.close(None).await;
                    return Err(ClipcastError::cancelled("synthesis cancelled"));
                }
                message = socket.next() => message,
            };

            let message = match message {
                None => break,
                Some(Ok(message)) => message,
                Some(Err(err)) => {
                    // Partial buffers are discarded with the session.
                    return Err(ClipcastError::protocol(format!("socket error: {err}")));
                }
            };

            let payload = match &message {
                Message::Text(text) => text.as_bytes(),
                Message::Binary(bytes) => bytes.as_slice(),
                Message::Close(_) => break,
                _ => continue,
            };

            if accumulator.absorb(parse_frame(payload)) {
                // The client closes the socket, not the server.
                let _ = socket.close(None).await;
                break;
            }
        }

        let result = accumulator.finish()?;

        tracing::debug!(
            request_id = %request_id,
            bytes = result.audio_len(),
            words = result.word_boundaries().len(),
            "Synthesis session complete"
        );

        Ok(result)
    }

    /// Map a handshake failure, learning clock skew from a rejected
    /// response's `Date` header so the next token lands in the right
    /// bucket. A rejection without a parseable date surfaces as `Token`.
    fn map_connect_error(&self, err: tungstenite::Error) -> ClipcastError {
        if let tungstenite::Error::Http(response) = &err {
            let status = response.status();
            let date = response
                .headers()
                .get("Date")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            if let Err(token_err) = self.token.clock().adjust_from_date_header(date.as_deref()) {
                return token_err;
            }
            return ClipcastError::protocol(format!(
                "synthesis handshake rejected with status {status}"
            ));
        }
        ClipcastError::protocol(format!("failed to open synthesis socket: {err}"))
    }
}

fn build_upgrade_request(
    url: &str,
) -> ClipcastResult<tungstenite::handshake::client::Request> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ClipcastError::protocol(format!("invalid synthesis url: {e}")))?;

    let user_agent = format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/{v}.0.0.0 Safari/537.36 Edg/{v}.0.0.0",
        v = CHROMIUM_MAJOR_VERSION
    );

    let headers = request.headers_mut();
    headers.insert(
        "User-Agent",
        HeaderValue::from_str(&user_agent)
            .map_err(|e| ClipcastError::protocol(format!("invalid user agent: {e}")))?,
    );
    headers.insert("Accept-Encoding", HeaderValue::from_static("gzip, deflate, br"));
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert(
        "Origin",
        HeaderValue::from_static("chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold"),
    );
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pitch: i32, rate: f64, volume: i32) -> SynthesisOptions {
        SynthesisOptions {
            pitch,
            rate,
            volume,
        }
    }

    #[test]
    fn test_boundary_values_accepted() {
        assert!(validate_options(&options(-100, 0.0, 0)).is_ok());
        assert!(validate_options(&options(100, 0.0, 0)).is_ok());
        assert!(validate_options(&options(0, -100.0, 0)).is_ok());
        assert!(validate_options(&options(0, 100.0, 0)).is_ok());
        assert!(validate_options(&options(0, 0.0, -100)).is_ok());
        assert!(validate_options(&options(0, 0.0, 100)).is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(validate_options(&options(-101, 0.0, 0)).is_err());
        assert!(validate_options(&options(101, 0.0, 0)).is_err());
        assert!(validate_options(&options(0, -100.5, 0)).is_err());
        assert!(validate_options(&options(0, 100.5, 0)).is_err());
        assert!(validate_options(&options(0, 0.0, -101)).is_err());
        assert!(validate_options(&options(0, 0.0, 101)).is_err());
    }

    #[test]
    fn test_rate_accepts_fractions_but_not_nan() {
        assert!(validate_options(&options(0, 12.5, 0)).is_ok());
        assert!(validate_options(&options(0, -99.9, 0)).is_ok());
        assert!(validate_options(&options(0, f64::NAN, 0)).is_err());
        assert!(validate_options(&options(0, f64::INFINITY, 0)).is_err());
    }

    #[test]
    fn test_validation_error_kind() {
        let err = validate_options(&options(101, 0.0, 0)).unwrap_err();
        assert!(matches!(err, ClipcastError::Validation { .. }));
    }

    #[test]
    fn test_stream_without_audio_is_a_protocol_error() {
        // Word boundaries alone do not make a usable result; a clean
        // turn end with zero audio bytes still fails.
        let mut accumulator = FrameAccumulator::default();
        assert!(!accumulator.absorb(Frame::Metadata(Some(WordBoundary {
            offset_ticks: 0,
            duration_ticks: 10,
            text: "hi".into(),
        }))));
        assert!(!accumulator.absorb(Frame::Audio(Vec::new())));
        assert!(accumulator.absorb(Frame::TurnEnd));

        let err = accumulator.finish().unwrap_err();
        assert!(matches!(err, ClipcastError::Protocol { .. }));
        assert!(err.to_string().contains("no audio data"));
    }

    #[test]
    fn test_accumulator_collects_audio_and_words_in_order() {
        let mut accumulator = FrameAccumulator::default();
        assert!(!accumulator.absorb(Frame::Audio(vec![1, 2])));
        assert!(!accumulator.absorb(Frame::Other));
        assert!(!accumulator.absorb(Frame::Metadata(Some(WordBoundary {
            offset_ticks: 0,
            duration_ticks: 10,
            text: "hi".into(),
        }))));
        assert!(!accumulator.absorb(Frame::Metadata(None)));
        assert!(!accumulator.absorb(Frame::Audio(vec![3])));
        assert!(accumulator.absorb(Frame::TurnEnd));

        let result = accumulator.finish().unwrap();
        assert_eq!(result.audio(), &[1, 2, 3]);
        assert_eq!(result.word_boundaries().len(), 1);
    }

    #[test]
    fn test_empty_result_concat() {
        let result = SynthesisResult::new(
            vec![vec![1, 2], vec![], vec![3]],
            vec![WordBoundary {
                offset_ticks: 0,
                duration_ticks: 10,
                text: "hi".into(),
            }],
        );
        assert_eq!(result.audio(), &[1, 2, 3]);
        assert_eq!(result.audio_len(), 3);
        assert_eq!(result.word_boundaries().len(), 1);
    }
}
