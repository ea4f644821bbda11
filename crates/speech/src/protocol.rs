//! Framed pseudo-HTTP messages on the synthesis socket.
//!
//! Every message, text or binary, is a block of colon-delimited header
//! lines followed by a body. Text frames terminate the header block with a
//! blank line; binary frames prefix it with a two-byte big-endian length
//! and run the body straight after the last header. Inbound messages are
//! dispatched on the `Path` header into a tagged [`Frame`] so marker text
//! inside audio payload bytes can never be mistaken for a frame boundary.

use serde::Deserialize;

/// A timed word boundary reported by the synthesis service.
///
/// Offsets and durations are in 100-nanosecond ticks. Sessions produce
/// boundaries in nondecreasing offset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordBoundary {
    pub offset_ticks: u64,
    pub duration_ticks: u64,
    pub text: String,
}

impl WordBoundary {
    /// End of the covered fragment, in ticks.
    pub fn end_ticks(&self) -> u64 {
        self.offset_ticks + self.duration_ticks
    }
}

/// One parsed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `Path:audio.metadata` — carries a word boundary when the first
    /// metadata entry is of type `WordBoundary`, nothing otherwise.
    Metadata(Option<WordBoundary>),
    /// `Path:audio` — raw encoded audio bytes (possibly empty).
    Audio(Vec<u8>),
    /// `Path:turn.end` — the stream is complete; the client closes.
    TurnEnd,
    /// Anything else (`response`, `turn.start`, unknown paths).
    Other,
}

/// Parse one inbound message into a [`Frame`].
pub fn parse_frame(payload: &[u8]) -> Frame {
    let (headers, body) = split_headers(payload)
        .or_else(|| {
            // Binary frames carry a two-byte big-endian header-length
            // prefix before the first header line.
            payload.get(2..).and_then(split_headers)
        })
        .unwrap_or_default();

    match headers
        .iter()
        .find(|(name, _)| name == "Path")
        .map(|(_, value)| value.as_str())
    {
        Some("audio.metadata") => Frame::Metadata(parse_word_boundary(body)),
        Some("audio") => Frame::Audio(body.to_vec()),
        Some("turn.end") => Frame::TurnEnd,
        _ => Frame::Other,
    }
}

/// Split a message into its header lines and body.
///
/// Header lines are CRLF-terminated `Name:value` pairs; the block ends at
/// a blank line (consumed) or at the first line that is not a well-formed
/// header (left in the body — binary bodies have no blank-line separator).
/// Returns `None` when the payload does not start with a header line.
fn split_headers(payload: &[u8]) -> Option<(Vec<(String, String)>, &[u8])> {
    let mut headers = Vec::new();
    let mut pos = 0;

    while let Some(eol) = find_crlf(&payload[pos..]) {
        let line = &payload[pos..pos + eol];
        if line.is_empty() {
            pos += 2;
            break;
        }
        match parse_header_line(line) {
            Some(header) => {
                headers.push(header);
                pos += eol + 2;
            }
            None => break,
        }
    }

    if headers.is_empty() {
        return None;
    }
    Some((headers, &payload[pos..]))
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|pair| pair == b"\r\n")
}

fn parse_header_line(line: &[u8]) -> Option<(String, String)> {
    let text = std::str::from_utf8(line).ok()?;
    let (name, value) = text.split_once(':')?;
    if name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

#[derive(Deserialize)]
struct MetadataEnvelope {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<MetadataEntry>,
}

#[derive(Deserialize)]
struct MetadataEntry {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Data")]
    data: Option<BoundaryData>,
}

#[derive(Deserialize)]
struct BoundaryData {
    #[serde(rename = "Offset")]
    offset: u64,
    #[serde(rename = "Duration")]
    duration: u64,
    text: BoundaryText,
}

#[derive(Deserialize)]
struct BoundaryText {
    #[serde(rename = "Text")]
    text: String,
}

/// Extract a word boundary from a metadata body.
///
/// Only the first metadata entry is examined, and only entries of type
/// `WordBoundary` produce a value.
fn parse_word_boundary(body: &[u8]) -> Option<WordBoundary> {
    let envelope: MetadataEnvelope = serde_json::from_slice(body).ok()?;
    let entry = envelope.metadata.into_iter().next()?;
    if entry.kind != "WordBoundary" {
        return None;
    }
    let data = entry.data?;
    Some(WordBoundary {
        offset_ticks: data.offset,
        duration_ticks: data.duration,
        text: data.text.text,
    })
}

/// Audio output format requested in the config message.
pub const AUDIO_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// File extension matching [`AUDIO_FORMAT`].
pub const AUDIO_EXTENSION: &str = "mp3";

fn timestamp() -> String {
    // The service expects an ISO timestamp with a doubled trailing Z.
    format!(
        "{}Z",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    )
}

/// The `speech.config` message sent first on every connection: enables
/// word-boundary metadata, disables sentence boundaries, names the audio
/// output format.
pub fn build_config_message() -> String {
    let body = serde_json::json!({
        "context": {
            "synthesis": {
                "audio": {
                    "metadataoptions": {
                        "sentenceBoundaryEnabled": false,
                        "wordBoundaryEnabled": true,
                    },
                    "outputFormat": AUDIO_FORMAT,
                },
            },
        },
    });
    format!(
        "X-Timestamp:{}\r\nContent-Type:application/json; charset=utf-8\r\nPath:speech.config\r\n\r\n{}",
        timestamp(),
        body
    )
}

/// The `ssml` message carrying the actual synthesis request.
pub fn build_speech_message(request_id: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{}\r\nContent-Type:application/ssml+xml\r\nX-Timestamp:{}\r\nPath:ssml\r\n\r\n{}",
        request_id,
        timestamp(),
        ssml
    )
}

/// SSML document embedding the voice name and prosody settings.
pub fn build_ssml(text: &str, voice: &str, pitch: i32, rate: f64, volume: i32) -> String {
    format!(
        "<speak version='1.0' xml:lang='en-US'>\
         <voice name='{voice}'>\
         <prosody pitch='{pitch}Hz' rate='{rate}%' volume='{volume}%'>\
         {text}\
         </prosody>\
         </voice>\
         </speak>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_metadata_frame() {
        let body = r#"{"Metadata":[{"Type":"WordBoundary","Data":{"Offset":1000000,"Duration":500000,"text":{"Text":"Hello","Length":5,"BoundaryType":"WordBoundary"}}}]}"#;
        let frame = format!(
            "X-RequestId:abc\r\nContent-Type:application/json\r\nPath:audio.metadata\r\n\r\n{body}"
        );
        match parse_frame(frame.as_bytes()) {
            Frame::Metadata(Some(word)) => {
                assert_eq!(word.offset_ticks, 1_000_000);
                assert_eq!(word.duration_ticks, 500_000);
                assert_eq!(word.text, "Hello");
            }
            other => panic!("expected word boundary, got {other:?}"),
        }
    }

    #[test]
    fn test_metadata_frame_with_other_type() {
        let body = r#"{"Metadata":[{"Type":"SessionEnd","Data":null}]}"#;
        let frame = format!("Path:audio.metadata\r\n\r\n{body}");
        assert_eq!(parse_frame(frame.as_bytes()), Frame::Metadata(None));
    }

    #[test]
    fn test_parse_binary_audio_frame() {
        // Two-byte header-length prefix, headers, then raw payload with no
        // blank-line separator.
        let headers = b"X-RequestId:abc\r\nContent-Type:audio/mpeg\r\nPath:audio\r\n";
        let audio = [0xffu8, 0xf3, 0x44, 0x00, 0x13, 0x37];
        let mut payload = Vec::new();
        payload.extend_from_slice(&(headers.len() as u16).to_be_bytes());
        payload.extend_from_slice(headers);
        payload.extend_from_slice(&audio);

        assert_eq!(parse_frame(&payload), Frame::Audio(audio.to_vec()));
    }

    #[test]
    fn test_marker_inside_audio_body_is_not_a_frame() {
        // Payload bytes that happen to contain the turn.end marker must
        // still be treated as audio.
        let headers = b"Path:audio\r\n";
        let audio = b"\xff\xf3Path:turn.end\r\nmore";
        let mut payload = Vec::new();
        payload.extend_from_slice(&(headers.len() as u16).to_be_bytes());
        payload.extend_from_slice(headers);
        payload.extend_from_slice(audio);

        assert_eq!(parse_frame(&payload), Frame::Audio(audio.to_vec()));
    }

    #[test]
    fn test_turn_end_frame() {
        let frame = b"X-RequestId:abc\r\nPath:turn.end\r\n\r\n{}";
        assert_eq!(parse_frame(frame), Frame::TurnEnd);
    }

    #[test]
    fn test_unknown_path_is_other() {
        let frame = b"Path:turn.start\r\n\r\n{}";
        assert_eq!(parse_frame(frame), Frame::Other);
        assert_eq!(parse_frame(b"\x00\x01garbage"), Frame::Other);
    }

    #[test]
    fn test_config_message_shape() {
        let message = build_config_message();
        let (headers, body) = message.split_once("\r\n\r\n").unwrap();
        assert!(headers.contains("Path:speech.config"));
        assert!(headers.contains("Content-Type:application/json; charset=utf-8"));

        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        let options = &json["context"]["synthesis"]["audio"]["metadataoptions"];
        assert_eq!(options["wordBoundaryEnabled"], true);
        assert_eq!(options["sentenceBoundaryEnabled"], false);
        assert_eq!(
            json["context"]["synthesis"]["audio"]["outputFormat"],
            AUDIO_FORMAT
        );
    }

    #[test]
    fn test_speech_message_embeds_ssml() {
        let ssml = build_ssml("Hi there", "en-US-AnaNeural", 0, 0.0, 0);
        let message = build_speech_message("req-1", &ssml);
        assert!(message.starts_with("X-RequestId:req-1\r\n"));
        assert!(message.contains("Path:ssml\r\n\r\n<speak"));
        assert!(ssml.contains("<voice name='en-US-AnaNeural'>"));
        assert!(ssml.contains("pitch='0Hz' rate='0%' volume='0%'"));
        assert!(ssml.contains("Hi there"));
    }
}
