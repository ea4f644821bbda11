//! List the narration voice catalog.

use std::sync::Arc;

use clipcast_common::SkewClock;
use clipcast_speech::list_voices;

pub async fn run(locale: Option<String>) -> anyhow::Result<()> {
    let clock = Arc::new(SkewClock::new());
    let mut voices = list_voices(&clock).await?;

    if let Some(locale) = &locale {
        voices.retain(|v| v.locale.eq_ignore_ascii_case(locale));
    }
    voices.sort_by(|a, b| a.short_name.cmp(&b.short_name));

    if voices.is_empty() {
        println!("No voices found.");
        return Ok(());
    }

    for voice in &voices {
        println!(
            "{:<32} {:<8} {:<8} {}",
            voice.short_name,
            voice.locale,
            voice.gender,
            voice.voice_tag.content_categories.join(", "),
        );
    }
    println!("\n{} voices", voices.len());

    Ok(())
}
