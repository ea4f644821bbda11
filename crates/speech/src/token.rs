//! Time-bucketed authentication token for the synthesis endpoint.
//!
//! The endpoint authenticates WebSocket upgrades with a `Sec-MS-GEC` query
//! parameter: a SHA-256 over the current Windows file time truncated to a
//! five-minute bucket, concatenated with a fixed trusted-client constant.
//! Any two tokens generated inside the same bucket are identical, so the
//! clock feeding the generator must stay within the server's tolerance —
//! hence the injected [`SkewClock`].

use std::sync::Arc;

use clipcast_common::clock::SkewClock;
use sha2::{Digest, Sha256};

/// Trusted-client constant shared by all readaloud clients.
pub const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

/// Persistent synthesis socket endpoint.
pub const WSS_URL: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";

/// Voice catalog endpoint.
pub const VOICES_URL: &str =
    "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list";

/// Chromium build the client impersonates.
pub const CHROMIUM_FULL_VERSION: &str = "130.0.2849.68";

/// Major version component of [`CHROMIUM_FULL_VERSION`].
pub const CHROMIUM_MAJOR_VERSION: &str = "130";

/// Protocol version string, `1-` followed by [`CHROMIUM_FULL_VERSION`].
pub const SEC_MS_GEC_VERSION: &str = "1-130.0.2849.68";

/// Seconds between the Windows epoch (1601-01-01) and the Unix epoch.
pub const WIN_EPOCH_SECS: i64 = 11_644_473_600;

/// Token bucket width in seconds.
const TOKEN_BUCKET_SECS: i64 = 300;

/// Derives `Sec-MS-GEC` tokens from a skew-corrected clock.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    clock: Arc<SkewClock>,
}

impl TokenGenerator {
    pub fn new(clock: Arc<SkewClock>) -> Self {
        Self { clock }
    }

    /// The clock this generator reads from.
    pub fn clock(&self) -> &Arc<SkewClock> {
        &self.clock
    }

    /// Generate a token for the current (corrected) time.
    pub fn generate(&self) -> String {
        token_for_timestamp(self.clock.corrected_now())
    }
}

/// Token derivation over an explicit Unix timestamp in seconds.
///
/// Windows file time, truncated down to the nearest 300-second bucket,
/// expressed in 100-nanosecond units, concatenated with the trusted-client
/// constant, SHA-256 hashed, uppercase hex.
pub fn token_for_timestamp(unix_seconds: f64) -> String {
    let mut win_secs = unix_seconds as i64 + WIN_EPOCH_SECS;
    win_secs -= win_secs % TOKEN_BUCKET_SECS;

    // 100 ns units fit u64 comfortably; going through integers avoids the
    // f64 precision loss a direct float multiply would introduce.
    let ticks = win_secs as u64 * 10_000_000;

    let mut hasher = Sha256::new();
    hasher.update(format!("{ticks}{TRUSTED_CLIENT_TOKEN}").as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(hex, "{byte:02X}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_uppercase_hex() {
        let token = token_for_timestamp(1_700_000_000.0);
        assert_eq!(token.len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_same_bucket_same_token() {
        // 1_700_000_100 and 1_700_000_399 share a 300 s bucket once the
        // Windows epoch offset is applied (offset is itself a multiple of
        // 300, so buckets align with Unix time).
        let a = token_for_timestamp(1_700_000_100.0);
        let b = token_for_timestamp(1_700_000_399.9);
        assert_eq!(a, b);
    }

    #[test]
    fn test_next_bucket_differs() {
        let a = token_for_timestamp(1_700_000_399.0);
        let b = token_for_timestamp(1_700_000_400.0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_generator_reads_skew() {
        let clock = Arc::new(SkewClock::new());
        let gen = TokenGenerator::new(clock.clone());
        let before = gen.generate();
        // Jump several buckets forward; the token must change.
        clock.adjust(1800.0);
        let after = gen.generate();
        assert_ne!(before, after);
    }
}
