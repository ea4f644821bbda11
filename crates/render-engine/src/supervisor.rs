//! Encoder process supervision.
//!
//! Spawns the external encoder, streams its combined output for `time=`
//! progress tokens, and resolves to a structured success or typed failure.
//! Cancellation terminates the child gracefully; the resulting exit still
//! reports through the normal nonzero-exit failure path.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use clipcast_common::{ClipcastError, ClipcastResult};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Intermediate progress never exceeds this; 100 is reserved for the
/// single terminal report on clean exit.
const PROGRESS_CEILING: u8 = 99;

/// How the encoder binary is located.
#[derive(Debug, Clone)]
pub enum EncoderBinary {
    /// Resolved through PATH at spawn time, no pre-flight.
    System(String),
    /// Explicit path shipped with the application; verified before spawn.
    Bundled(PathBuf),
}

impl Default for EncoderBinary {
    fn default() -> Self {
        Self::System("ffmpeg".to_string())
    }
}

impl EncoderBinary {
    fn program(&self) -> std::ffi::OsString {
        match self {
            Self::System(name) => name.into(),
            Self::Bundled(path) => path.into(),
        }
    }

    /// Verify a bundled binary exists and is executable before spawning.
    fn preflight(&self) -> ClipcastResult<()> {
        let Self::Bundled(path) = self else {
            return Ok(());
        };

        let metadata = std::fs::metadata(path).map_err(|_| {
            ClipcastError::preflight(format!("encoder binary not found: {}", path.display()))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(ClipcastError::preflight(format!(
                    "encoder binary is not executable: {}",
                    path.display()
                )));
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        Ok(())
    }
}

/// Captured output of a successful encoder run.
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

/// Run the encoder with the given argument vector.
///
/// Progress values are elapsed output seconds clamped to 99; exactly one
/// terminal 100 is reported when the process exits cleanly. Reported
/// values are non-decreasing.
pub async fn run_encoder(
    binary: &EncoderBinary,
    args: &[String],
    progress: Option<mpsc::Sender<u8>>,
    cancel: &CancellationToken,
) -> ClipcastResult<EncoderOutput> {
    binary.preflight()?;

    tracing::debug!(args_len = args.len(), "spawning encoder");
    let mut child = Command::new(binary.program())
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ClipcastError::spawn(format!("failed to start encoder: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ClipcastError::spawn("failed to capture encoder stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ClipcastError::spawn("failed to capture encoder stderr"))?;

    // Both streams feed one high-water mark so progress stays monotonic
    // regardless of which stream carries the time token.
    let high_water = Arc::new(AtomicU8::new(0));
    let stdout_task = tokio::spawn(drain_stream(stdout, progress.clone(), high_water.clone()));
    let stderr_task = tokio::spawn(drain_stream(stderr, progress.clone(), high_water.clone()));

    let status = tokio::select! {
        status = child.wait() => status,
        _ = cancel.cancelled() => {
            tracing::info!("cancellation requested, terminating encoder");
            terminate(&mut child);
            child.wait().await
        }
    }
    .map_err(|e| ClipcastError::spawn(format!("failed to wait on encoder: {e}")))?;

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    if !status.success() {
        tracing::warn!(code = ?status.code(), "encoder exited with failure");
        return Err(ClipcastError::Process {
            code: status.code(),
            stderr,
        });
    }

    if let Some(tx) = &progress {
        let _ = tx.send(100).await;
    }
    tracing::info!("encoder finished");

    Ok(EncoderOutput {
        stdout,
        stderr,
        code: 0,
    })
}

/// Ask the child to stop. SIGTERM on unix so the encoder can flush and
/// close its output file; hard kill elsewhere.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        return;
    }

    let _ = child.start_kill();
}

async fn drain_stream<R: AsyncRead + Unpin>(
    mut stream: R,
    progress: Option<mpsc::Sender<u8>>,
    high_water: Arc<AtomicU8>,
) -> String {
    let mut captured = String::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]);
                captured.push_str(&chunk);

                let Some(tx) = &progress else { continue };
                let Some(secs) = parse_progress_time(&chunk) else {
                    continue;
                };
                let value = clamp_progress(secs);
                let previous = high_water.fetch_max(value, Ordering::SeqCst);
                if value > previous {
                    let _ = tx.send(value).await;
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "encoder output stream closed");
                break;
            }
        }
    }
    captured
}

/// Extract elapsed output seconds from the most recent `time=` token in a
/// chunk. Chunks without the token yield nothing.
fn parse_progress_time(chunk: &str) -> Option<f64> {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    let re = TIME_RE
        .get_or_init(|| Regex::new(r"time=(\d{2}):(\d{2}):(\d{2}\.\d{2})").expect("valid regex"));

    let caps = re.captures_iter(chunk).last()?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn clamp_progress(secs: f64) -> u8 {
    secs.max(0.0).min(PROGRESS_CEILING as f64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> (EncoderBinary, Vec<String>) {
        (
            EncoderBinary::System("sh".to_string()),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    #[test]
    fn progress_time_parses_to_seconds() {
        let chunk = "frame=  901 fps= 30 time=00:01:05.50 bitrate=1800kbits/s";
        assert_eq!(parse_progress_time(chunk), Some(65.5));
    }

    #[test]
    fn progress_time_uses_latest_token_in_chunk() {
        let chunk = "time=00:00:01.00\ntime=00:00:04.25\n";
        assert_eq!(parse_progress_time(chunk), Some(4.25));
    }

    #[test]
    fn chunks_without_time_token_yield_nothing() {
        assert_eq!(parse_progress_time("frame= 10 fps= 30 speed=1x"), None);
        assert_eq!(parse_progress_time(""), None);
    }

    #[test]
    fn progress_clamps_to_ninety_nine() {
        assert_eq!(clamp_progress(12.7), 12);
        assert_eq!(clamp_progress(99.0), 99);
        assert_eq!(clamp_progress(250.0), 99);
        assert_eq!(clamp_progress(-3.0), 0);
    }

    #[test]
    fn bundled_preflight_rejects_missing_binary() {
        let binary = EncoderBinary::Bundled(PathBuf::from("/nonexistent/ffmpeg"));
        assert!(matches!(
            binary.preflight(),
            Err(ClipcastError::Preflight { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn bundled_preflight_rejects_non_executable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ffmpeg");
        std::fs::write(&path, b"not a binary").unwrap();
        let binary = EncoderBinary::Bundled(path);
        assert!(matches!(
            binary.preflight(),
            Err(ClipcastError::Preflight { .. })
        ));
    }

    #[tokio::test]
    async fn clean_exit_reports_exactly_one_terminal_hundred() {
        let (binary, args) = sh("echo 'time=00:00:05.00'; echo 'time=00:00:08.00'");
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let output = run_encoder(&binary, &args, Some(tx), &cancel)
            .await
            .unwrap();
        assert_eq!(output.code, 0);

        let mut reported = Vec::new();
        while let Some(value) = rx.recv().await {
            reported.push(value);
        }
        assert_eq!(reported.last(), Some(&100));
        assert_eq!(reported.iter().filter(|&&v| v == 100).count(), 1);
        let mut sorted = reported.clone();
        sorted.sort_unstable();
        assert_eq!(reported, sorted);
        assert!(reported[..reported.len() - 1].iter().all(|&v| v <= 99));
    }

    #[tokio::test]
    async fn nonzero_exit_carries_code_and_stderr() {
        let (binary, args) = sh("echo 'boom' >&2; exit 3");
        let cancel = CancellationToken::new();

        let err = run_encoder(&binary, &args, None, &cancel)
            .await
            .unwrap_err();
        match err {
            ClipcastError::Process { code, stderr } => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected process error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn spawn_failure_has_no_exit_code() {
        let binary = EncoderBinary::System("clipcast-no-such-binary".to_string());
        let cancel = CancellationToken::new();

        let err = run_encoder(&binary, &[], None, &cancel).await.unwrap_err();
        assert!(matches!(err, ClipcastError::Spawn { .. }));
    }

    #[tokio::test]
    async fn cancellation_always_fails_the_run() {
        let (binary, args) = sh("sleep 30");
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { run_encoder(&binary, &args, None, &cancel).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ClipcastError::Process { .. })));
    }
}
