//! Caption cue segmentation and SRT generation.
//!
//! Word boundaries arrive as 100-nanosecond tick offsets; cues are built
//! by growing a sentence buffer until the concatenated text runs past 24
//! characters or a silence gap longer than 100 ms separates two words.

use crate::protocol::WordBoundary;

/// Concatenated buffer length above which a cue is flushed.
const MAX_CUE_CHARS: usize = 24;

/// Inter-word gap, in ticks, above which a cue is flushed (100 ms).
const GAP_THRESHOLD_TICKS: u64 = 1_000_000;

/// Ticks per millisecond.
const TICKS_PER_MS: u64 = 10_000;

/// One subtitle cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionCue {
    /// Start time in milliseconds.
    pub start_ms: u64,
    /// End time in milliseconds.
    pub end_ms: u64,
    /// Cue text: the covered words concatenated with no separator (the
    /// service includes leading spaces in its word fragments).
    pub text: String,
}

/// Segment an ordered word-boundary list into caption cues.
pub fn segment(words: &[WordBoundary]) -> Vec<CaptionCue> {
    let mut cues = Vec::new();
    let mut current: Vec<&WordBoundary> = Vec::new();

    for (index, word) in words.iter().enumerate() {
        if index > 0 {
            let too_long = current
                .iter()
                .map(|w| w.text.chars().count())
                .sum::<usize>()
                > MAX_CUE_CHARS;
            let gap = word.offset_ticks.saturating_sub(words[index - 1].end_ticks())
                > GAP_THRESHOLD_TICKS;

            if too_long || gap {
                cues.push(flush(&current));
                current = vec![word];
                continue;
            }
        }
        current.push(word);
    }

    if !current.is_empty() {
        cues.push(flush(&current));
    }

    cues
}

fn flush(buffer: &[&WordBoundary]) -> CaptionCue {
    let first = buffer[0];
    let last = buffer[buffer.len() - 1];
    CaptionCue {
        start_ms: first.offset_ticks / TICKS_PER_MS,
        end_ms: last.end_ticks() / TICKS_PER_MS,
        text: buffer.iter().map(|w| w.text.as_str()).collect(),
    }
}

/// Generate SRT subtitle content from caption cues.
pub fn generate_srt(cues: &[CaptionCue]) -> String {
    let mut output = String::new();

    for (i, cue) in cues.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(cue.start_ms),
            format_srt_time(cue.end_ms),
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output
}

/// Format milliseconds as an SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(total_ms: u64) -> String {
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}
