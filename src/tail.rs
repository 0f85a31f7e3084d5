//! Log tailer: follows a growing, possibly rotated file from EOF.
//!
//! The tailer polls the file on a fixed interval rather than relying on
//! OS-level change notification. Polling is mandatory in containerized
//! deployments, where shell redirection creates the log outside the
//! notification graph. On the first successful open the tailer seeks to
//! end-of-file so existing history is never replayed; afterwards it emits
//! each complete appended line exactly once, buffering partial trailing
//! lines until the newline arrives. Rotation (inode change) and in-place
//! truncation both cause the follower to rewind to the start of the new
//! content. Filesystem errors are logged and retried on the next tick;
//! the task only exits on cancellation.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Tailer tuning knobs.
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// How often to poll the file for appended data.
    pub poll_interval: Duration,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Handle to a background log-following task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct LogTailer {
    cancel: CancellationToken,
}

impl LogTailer {
    /// Spawns a follower for `path`. Each complete appended line is handed
    /// to `sink` without its trailing newline.
    pub fn spawn<F>(path: PathBuf, config: TailerConfig, sink: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        tokio::spawn(follow(path, config, sink, cancel.clone()));
        Self { cancel }
    }

    /// Cancels the follower task. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for LogTailer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct FollowState {
    file: File,
    position: u64,
    identity: u64,
}

async fn follow<F>(path: PathBuf, config: TailerConfig, mut sink: F, cancel: CancellationToken)
where
    F: FnMut(&str) + Send + 'static,
{
    // Only the initial attach seeks to EOF: history present at startup is
    // never replayed. Everything that appears after this point, including a
    // file created later or swapped in by rotation, is new content and is
    // read from the beginning.
    let mut state = open(&path, true).await;
    let mut pending = String::new();

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        if let Some(current) = &mut state {
            if check_rotation(&path, current, &mut pending, &mut sink).await {
                state = None;
            }
        }

        if state.is_none() {
            state = open(&path, false).await;
        }

        if let Some(current) = &mut state {
            read_appended(current, &mut pending, &mut sink).await;
        }
    }
}

/// Returns `true` when the file under `path` is no longer the one we hold,
/// draining whatever the old handle still has first. In-place truncation
/// is handled by rewinding without a reopen.
async fn check_rotation<F>(
    path: &Path,
    state: &mut FollowState,
    pending: &mut String,
    sink: &mut F,
) -> bool
where
    F: FnMut(&str) + Send + 'static,
{
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            if file_identity(&meta) != state.identity {
                tracing::info!(path = %path.display(), "Log rotated, reopening");
                read_appended(state, pending, sink).await;
                flush_partial(pending, sink);
                true
            } else {
                if meta.len() < state.position {
                    tracing::info!(path = %path.display(), "Log truncated, rewinding");
                    if state.file.seek(SeekFrom::Start(0)).await.is_ok() {
                        state.position = 0;
                    }
                    pending.clear();
                }
                false
            }
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Log file vanished, waiting for recreation");
            read_appended(state, pending, sink).await;
            flush_partial(pending, sink);
            true
        }
    }
}

async fn open(path: &Path, attach_at_end: bool) -> Option<FollowState> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "Cannot open log file, will retry");
            return None;
        }
    };

    let meta = match file.metadata().await {
        Ok(meta) => meta,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Cannot stat log file, will retry");
            return None;
        }
    };

    let position = if attach_at_end {
        match file.seek(SeekFrom::End(0)).await {
            Ok(position) => position,
            Err(_) => meta.len(),
        }
    } else {
        0
    };

    Some(FollowState {
        file,
        position,
        identity: file_identity(&meta),
    })
}

async fn read_appended<F>(state: &mut FollowState, pending: &mut String, sink: &mut F)
where
    F: FnMut(&str) + Send + 'static,
{
    let mut buf = [0u8; 8192];
    loop {
        match state.file.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                state.position += n as u64;
                pending.push_str(&String::from_utf8_lossy(&buf[..n]));
            }
            Err(err) => {
                tracing::warn!(error = %err, "Error reading log file, will retry");
                break;
            }
        }
    }

    while let Some(newline) = pending.find('\n') {
        let line: String = pending.drain(..=newline).collect();
        let line = line.trim_end_matches(['\n', '\r']);
        if !line.is_empty() {
            sink(line);
        }
    }
}

fn flush_partial<F>(pending: &mut String, sink: &mut F)
where
    F: FnMut(&str) + Send + 'static,
{
    if !pending.is_empty() {
        let line = std::mem::take(pending);
        sink(line.trim_end_matches(['\n', '\r']));
    }
}

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn file_identity(_meta: &std::fs::Metadata) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn fast_config() -> TailerConfig {
        TailerConfig {
            poll_interval: Duration::from_millis(10),
        }
    }

    fn collect_sink() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel()
    }

    async fn recv_line(rx: &mpsc::Receiver<String>, timeout: Duration) -> Option<String> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Ok(line) = rx.try_recv() {
                return Some(line);
            }
            if std::time::Instant::now() > deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    #[tokio::test]
    async fn does_not_replay_existing_history() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("scan.log");
        append(&log, "historic line one\nhistoric line two\n");

        let (tx, rx) = collect_sink();
        let tailer = LogTailer::spawn(log.clone(), fast_config(), move |line| {
            tx.send(line.to_string()).unwrap();
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        append(&log, "fresh line\n");

        let line = recv_line(&rx, Duration::from_secs(2)).await.unwrap();
        assert_eq!(line, "fresh line");
        assert!(recv_line(&rx, Duration::from_millis(80)).await.is_none());
        tailer.stop();
    }

    #[tokio::test]
    async fn buffers_partial_lines_until_newline() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("scan.log");
        append(&log, "");

        let (tx, rx) = collect_sink();
        let tailer = LogTailer::spawn(log.clone(), fast_config(), move |line| {
            tx.send(line.to_string()).unwrap();
        });
        tokio::time::sleep(Duration::from_millis(60)).await;

        append(&log, "partial");
        assert!(recv_line(&rx, Duration::from_millis(80)).await.is_none());

        append(&log, " completed\n");
        let line = recv_line(&rx, Duration::from_secs(2)).await.unwrap();
        assert_eq!(line, "partial completed");
        tailer.stop();
    }

    #[tokio::test]
    async fn follows_file_created_after_spawn() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("late.log");

        let (tx, rx) = collect_sink();
        let tailer = LogTailer::spawn(log.clone(), fast_config(), move |line| {
            tx.send(line.to_string()).unwrap();
        });
        tokio::time::sleep(Duration::from_millis(60)).await;

        append(&log, "first line after creation\n");
        let line = recv_line(&rx, Duration::from_secs(2)).await.unwrap();
        assert_eq!(line, "first line after creation");
        tailer.stop();
    }

    #[tokio::test]
    async fn handles_truncation() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("scan.log");
        append(&log, "");

        let (tx, rx) = collect_sink();
        let tailer = LogTailer::spawn(log.clone(), fast_config(), move |line| {
            tx.send(line.to_string()).unwrap();
        });
        tokio::time::sleep(Duration::from_millis(60)).await;

        append(&log, "before truncation\n");
        assert_eq!(
            recv_line(&rx, Duration::from_secs(2)).await.unwrap(),
            "before truncation"
        );

        std::fs::write(&log, "").unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        append(&log, "after truncation\n");
        assert_eq!(
            recv_line(&rx, Duration::from_secs(2)).await.unwrap(),
            "after truncation"
        );
        tailer.stop();
    }

    #[tokio::test]
    async fn handles_rotation() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("scan.log");
        append(&log, "");

        let (tx, rx) = collect_sink();
        let tailer = LogTailer::spawn(log.clone(), fast_config(), move |line| {
            tx.send(line.to_string()).unwrap();
        });
        tokio::time::sleep(Duration::from_millis(60)).await;

        std::fs::rename(&log, dir.path().join("scan.log.1")).unwrap();
        append(&log, "line in rotated-in file\n");

        assert_eq!(
            recv_line(&rx, Duration::from_secs(2)).await.unwrap(),
            "line in rotated-in file"
        );
        tailer.stop();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("scan.log");
        append(&log, "");

        let tailer = LogTailer::spawn(log, fast_config(), |_| {});
        tailer.stop();
        tailer.stop();
    }
}
