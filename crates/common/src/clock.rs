//! Clock-skew correction for time-bucketed authentication tokens.
//!
//! The synthesis endpoint rejects tokens derived from a clock that drifts
//! too far from the server's. `SkewClock` keeps an additive correction,
//! learned from server `Date` headers, on top of local wall-clock reads.
//!
//! The correction is append-only: each adjustment adds to the running
//! total and is never reset. Because addition is order-insensitive, the
//! clock is safe to share across concurrent synthesis calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ClipcastError, ClipcastResult};

/// A wall clock with an additive skew correction, in seconds.
///
/// One instance per process is typical; share it via `Arc` and inject it
/// into the token generator rather than reaching for a global.
#[derive(Debug, Default)]
pub struct SkewClock {
    /// Accumulated skew in seconds, stored as f64 bits.
    skew_bits: AtomicU64,
}

impl SkewClock {
    /// A clock with zero accumulated skew.
    pub fn new() -> Self {
        Self {
            skew_bits: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    /// Current accumulated skew in seconds.
    pub fn skew_seconds(&self) -> f64 {
        f64::from_bits(self.skew_bits.load(Ordering::Acquire))
    }

    /// Add `delta_seconds` to the running skew. Never resets.
    pub fn adjust(&self, delta_seconds: f64) {
        let mut current = self.skew_bits.load(Ordering::Acquire);
        loop {
            let next = (f64::from_bits(current) + delta_seconds).to_bits();
            match self.skew_bits.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Corrected Unix timestamp in seconds: local time plus skew.
    pub fn corrected_now(&self) -> f64 {
        let local = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        local + self.skew_seconds()
    }

    /// Learn skew from a server response's `Date` header.
    ///
    /// A missing or unparseable header is a hard failure: silently
    /// skipping the correction would leave every subsequent token invalid.
    pub fn adjust_from_date_header(&self, date: Option<&str>) -> ClipcastResult<()> {
        let date = date.ok_or_else(|| ClipcastError::token("no server date in headers"))?;
        let server_ts = parse_rfc2616_date(date).ok_or_else(|| {
            ClipcastError::token(format!("failed to parse server date: {date}"))
        })?;
        let delta = server_ts - self.corrected_now();
        tracing::debug!(delta_seconds = delta, "Adjusting clock skew from server date");
        self.adjust(delta);
        Ok(())
    }
}

/// Parse an RFC 2616 date string into a Unix timestamp in seconds.
///
/// HTTP dates are RFC 1123 formatted, which chrono's RFC 2822 parser
/// accepts ("Tue, 01 Nov 2094 08:49:37 GMT").
pub fn parse_rfc2616_date(date: &str) -> Option<f64> {
    chrono::DateTime::parse_from_rfc2822(date)
        .ok()
        .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skew_accumulates() {
        let clock = SkewClock::new();
        assert_eq!(clock.skew_seconds(), 0.0);
        clock.adjust(2.5);
        clock.adjust(-1.0);
        assert!((clock.skew_seconds() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_corrected_now_tracks_skew() {
        let clock = SkewClock::new();
        let before = clock.corrected_now();
        clock.adjust(300.0);
        let after = clock.corrected_now();
        // Wall clock moved by well under a second between the reads.
        assert!(after - before > 299.0 && after - before < 301.0);
    }

    #[test]
    fn test_parse_rfc2616_date() {
        let ts = parse_rfc2616_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(ts as i64, 784111777);
        assert!(parse_rfc2616_date("not a date").is_none());
    }

    #[test]
    fn test_missing_date_header_is_an_error() {
        let clock = SkewClock::new();
        let err = clock.adjust_from_date_header(None).unwrap_err();
        assert!(matches!(err, ClipcastError::Token { .. }));
        assert_eq!(clock.skew_seconds(), 0.0);

        let err = clock.adjust_from_date_header(Some("garbage")).unwrap_err();
        assert!(matches!(err, ClipcastError::Token { .. }));

        // A weekday that disagrees with the calendar date is rejected.
        let err = clock
            .adjust_from_date_header(Some("Tue, 01 Jan 2095 00:00:00 GMT"))
            .unwrap_err();
        assert!(matches!(err, ClipcastError::Token { .. }));
    }

    #[test]
    fn test_adjust_from_valid_header_moves_clock() {
        let clock = SkewClock::new();
        // A date far in the future produces a large positive skew.
        clock
            .adjust_from_date_header(Some("Sat, 01 Jan 2095 00:00:00 GMT"))
            .unwrap();
        assert!(clock.skew_seconds() > 1.0e9);
    }
}
