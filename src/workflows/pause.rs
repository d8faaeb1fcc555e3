// Rendezvous between walkthrough steps

use async_trait::async_trait;
use std::io::BufRead;
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, Mutex};

use super::steps::WorkflowStep;

/// Blocks the workflow after a step until the caller is ready to continue.
///
/// There is no timeout: the workflow resumes only when `pause` returns (or
/// the run is cancelled). Any `Fn()` closure works as a pause.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, completed: WorkflowStep);
}

/// Resumes immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPause;

#[async_trait]
impl Pause for NoPause {
    async fn pause(&self, _completed: WorkflowStep) {}
}

#[async_trait]
impl<F> Pause for F
where
    F: Fn() + Send + Sync,
{
    async fn pause(&self, _completed: WorkflowStep) {
        self()
    }
}

type LineReceiver = Arc<Mutex<mpsc::UnboundedReceiver<String>>>;

/// Waits for the user to press Enter.
///
/// Lines are read on a detached thread and delivered over a channel. A
/// pending pause can be dropped at any time; unread lines stay queued.
#[derive(Debug, Clone)]
pub struct ConsolePause {
    lines: LineReceiver,
}

impl Default for ConsolePause {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolePause {
    /// Pause on lines read from the process's stdin
    pub fn new() -> Self {
        Self {
            lines: stdin_lines(),
        }
    }

    /// Pause on lines delivered through `lines`
    pub fn from_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
        }
    }

    /// Final prompt before the host exits
    pub async fn wait_for_exit(&self) {
        println!("\nPress enter to exit the sample application.");
        self.next_line().await;
    }

    async fn next_line(&self) {
        if self.lines.lock().await.recv().await.is_none() {
            // Without a terminal there is nobody to wait for.
            tracing::debug!("stdin closed, continuing");
        }
    }

    fn hint(completed: WorkflowStep) -> Option<&'static str> {
        match completed {
            WorkflowStep::CreateContainer => Some(
                "Take a minute and verify in the portal.\nNext a file will be created and uploaded to the container.",
            ),
            WorkflowStep::UploadFile => Some("The file was uploaded. We'll verify by listing the blobs next."),
            WorkflowStep::ListBlobs => Some(
                "You can also verify by looking inside the container in the portal.\nNext the blob will be downloaded with an altered file name.",
            ),
            // The last step is never followed by a pause.
            WorkflowStep::DownloadFile => None,
        }
    }
}

#[async_trait]
impl Pause for ConsolePause {
    async fn pause(&self, completed: WorkflowStep) {
        if let Some(hint) = Self::hint(completed) {
            println!("\n{hint}");
        }
        println!("Press 'Enter' to continue.");
        self.next_line().await;
    }
}

/// Shared receiver fed by a single detached reader thread
fn stdin_lines() -> LineReceiver {
    static LINES: OnceLock<LineReceiver> = OnceLock::new();
    LINES
        .get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let spawned = std::thread::Builder::new()
                .name("stdin-lines".to_string())
                .spawn(move || {
                    for line in std::io::stdin().lock().lines() {
                        match line {
                            Ok(line) => {
                                if tx.send(line).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Could not read from stdin, continuing: {}", e);
                                break;
                            }
                        }
                    }
                });
            if let Err(e) = spawned {
                tracing::warn!("Could not start stdin reader, pauses are skipped: {}", e);
            }
            Arc::new(Mutex::new(rx))
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_closure_is_a_pause() {
        let count = AtomicUsize::new(0);
        let pause = || {
            count.fetch_add(1, Ordering::SeqCst);
        };

        pause.pause(WorkflowStep::CreateContainer).await;
        pause.pause(WorkflowStep::UploadFile).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_pause_returns_immediately() {
        NoPause.pause(WorkflowStep::ListBlobs).await;
    }

    #[tokio::test]
    async fn test_console_pause_resumes_on_line() {
        let (tx, rx) = mpsc::unbounded_channel();
        let pause = ConsolePause::from_lines(rx);
        tx.send(String::new()).unwrap();

        let resumed = tokio::time::timeout(Duration::from_secs(1), pause.pause(WorkflowStep::UploadFile)).await;
        assert!(resumed.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_pause_keeps_next_line() {
        let (tx, rx) = mpsc::unbounded_channel();
        let pause = ConsolePause::from_lines(rx);
        let token = CancellationToken::new();
        token.cancel();

        let cancelled = tokio::select! {
            biased;
            _ = token.cancelled() => true,
            _ = pause.pause(WorkflowStep::CreateContainer) => false,
        };
        assert!(cancelled);

        tx.send("typed ahead".to_string()).unwrap();
        let resumed = tokio::time::timeout(Duration::from_secs(1), pause.pause(WorkflowStep::UploadFile)).await;
        assert!(resumed.is_ok());
    }

    #[tokio::test]
    async fn test_closed_input_does_not_block() {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        drop(tx);
        let pause = ConsolePause::from_lines(rx);

        let resumed = tokio::time::timeout(Duration::from_secs(1), pause.wait_for_exit()).await;
        assert!(resumed.is_ok());
    }

    #[test]
    fn test_runtime_shuts_down_after_abandoned_stdin_pause() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let pause = ConsolePause::new();

        runtime.block_on(async {
            tokio::select! {
                _ = pause.pause(WorkflowStep::CreateContainer) => {}
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        });

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_last_step_has_no_hint() {
        assert!(ConsolePause::hint(WorkflowStep::DownloadFile).is_none());
        for step in [
            WorkflowStep::CreateContainer,
            WorkflowStep::UploadFile,
            WorkflowStep::ListBlobs,
        ] {
            assert!(ConsolePause::hint(step).is_some());
        }
    }
}
