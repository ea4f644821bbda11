//! Voice catalog listing.

use std::sync::Arc;

use clipcast_common::clock::SkewClock;
use clipcast_common::error::{ClipcastError, ClipcastResult};
use serde::{Deserialize, Serialize};

use crate::token::{CHROMIUM_MAJOR_VERSION, TRUSTED_CLIENT_TOKEN, VOICES_URL};

/// Tag metadata attached to a voice descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VoiceTag {
    #[serde(rename = "ContentCategories", default)]
    pub content_categories: Vec<String>,
    #[serde(rename = "VoicePersonalities", default)]
    pub voice_personalities: Vec<String>,
}

/// One entry from the voice catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ShortName")]
    pub short_name: String,
    #[serde(rename = "FriendlyName")]
    pub friendly_name: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Locale")]
    pub locale: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "VoiceTag", default)]
    pub voice_tag: VoiceTag,
    #[serde(rename = "SuggestedCodec")]
    pub suggested_codec: String,
}

/// Fetch the full voice catalog.
///
/// A rejected response feeds its `Date` header into the skew clock before
/// failing, so a drifted local clock recovers on the next token.
pub async fn list_voices(clock: &Arc<SkewClock>) -> ClipcastResult<Vec<Voice>> {
    let url = format!("{VOICES_URL}?trustedclienttoken={TRUSTED_CLIENT_TOKEN}");
    let user_agent = format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/{v}.0.0.0 Safari/537.36 Edg/{v}.0.0.0",
        v = CHROMIUM_MAJOR_VERSION
    );

    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|e| ClipcastError::protocol(format!("failed to build http client: {e}")))?;

    let response = client
        .get(&url)
        .header("Accept", "*/*")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| ClipcastError::protocol(format!("voice catalog request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let date = response
            .headers()
            .get("Date")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        clock.adjust_from_date_header(date.as_deref())?;
        return Err(ClipcastError::protocol(format!(
            "voice catalog request rejected with status {status}"
        )));
    }

    let voices: Vec<Voice> = response
        .json()
        .await
        .map_err(|e| ClipcastError::protocol(format!("invalid voice catalog payload: {e}")))?;

    tracing::debug!(count = voices.len(), "Fetched voice catalog");
    Ok(voices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_descriptor_deserializes() {
        let json = r#"{
            "Name": "Microsoft Server Speech Text to Speech Voice (en-US, AnaNeural)",
            "ShortName": "en-US-AnaNeural",
            "FriendlyName": "Microsoft Ana Online (Natural) - English (United States)",
            "Gender": "Female",
            "Locale": "en-US",
            "Status": "GA",
            "VoiceTag": {
                "ContentCategories": ["Cartoon", "Conversation"],
                "VoicePersonalities": ["Cute"]
            },
            "SuggestedCodec": "audio-24khz-48kbitrate-mono-mp3"
        }"#;

        let voice: Voice = serde_json::from_str(json).unwrap();
        assert_eq!(voice.short_name, "en-US-AnaNeural");
        assert_eq!(voice.gender, "Female");
        assert_eq!(voice.voice_tag.content_categories.len(), 2);
    }

    #[test]
    fn test_voice_tag_defaults_when_missing() {
        let json = r#"{
            "Name": "n", "ShortName": "s", "FriendlyName": "f",
            "Gender": "Male", "Locale": "en-GB", "Status": "GA",
            "SuggestedCodec": "audio-24khz-48kbitrate-mono-mp3"
        }"#;
        let voice: Voice = serde_json::from_str(json).unwrap();
        assert!(voice.voice_tag.content_categories.is_empty());
    }
}
