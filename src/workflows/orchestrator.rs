// Walkthrough orchestration: one linear run over the blob lifecycle
// Each step runs only after its predecessor succeeded; the first failure ends the run

use futures::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::config::Settings;
use crate::fs::FileSystemOperations;
use crate::storage::{BlobStorage, ContainerHandle};
use crate::telemetry::{create_step_span, generate_run_id};

use super::observer::{WorkflowEvent, WorkflowObserver};
use super::pause::Pause;
use super::steps::{
    downloaded_path, SessionArtifacts, StepFailure, WorkflowError, WorkflowOptions, WorkflowReport,
    WorkflowStep,
};

/// Drives the walkthrough against injected storage and file system collaborators
pub struct Workflow {
    storage: Arc<dyn BlobStorage>,
    fs: Arc<dyn FileSystemOperations>,
    cancel: CancellationToken,
}

struct UploadedFile {
    blob_name: String,
    source_path: PathBuf,
}

/// State of one run
struct Run<'a> {
    options: &'a WorkflowOptions,
    pause: &'a dyn Pause,
    observer: &'a dyn WorkflowObserver,
    through: WorkflowStep,
    report: WorkflowReport,
}

impl Workflow {
    pub fn new(storage: Arc<dyn BlobStorage>, fs: Arc<dyn FileSystemOperations>) -> Self {
        Self {
            storage,
            fs,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the run cooperatively when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every step through `DownloadFile`
    pub async fn run(
        &self,
        settings: &Settings,
        pause: &dyn Pause,
        observer: &dyn WorkflowObserver,
    ) -> Result<WorkflowReport, WorkflowError> {
        self.run_until(settings, pause, observer, WorkflowStep::DownloadFile)
            .await
    }

    /// Run the step sequence up to and including `through`
    pub async fn run_until(
        &self,
        settings: &Settings,
        pause: &dyn Pause,
        observer: &dyn WorkflowObserver,
        through: WorkflowStep,
    ) -> Result<WorkflowReport, WorkflowError> {
        let run_id = generate_run_id();
        info!(run.id = %run_id, through = %through, "Starting blob walkthrough");

        let mut run = Run {
            options: &settings.workflow,
            pause,
            observer,
            through,
            report: WorkflowReport {
                completed: Vec::new(),
                artifacts: SessionArtifacts::default(),
                listed_blobs: Vec::new(),
            },
        };

        let result = self.execute(&mut run, &run_id).await;
        match &result {
            Ok(()) => info!(run.id = %run_id, steps = run.report.completed.len(), "Walkthrough completed"),
            Err(e) => warn!(run.id = %run_id, step = %e.step, "Walkthrough failed: {}", e.cause),
        }
        result.map(|()| run.report)
    }

    async fn execute(&self, run: &mut Run<'_>, run_id: &str) -> Result<(), WorkflowError> {
        let step = WorkflowStep::CreateContainer;
        let container = self
            .create_container(run)
            .instrument(create_step_span(step.name(), run_id))
            .await?;
        if !self.advance(run, step).await? {
            return Ok(());
        }

        let step = WorkflowStep::UploadFile;
        let uploaded = self
            .upload_file(run, &container)
            .instrument(create_step_span(step.name(), run_id))
            .await?;
        if !self.advance(run, step).await? {
            return Ok(());
        }

        let step = WorkflowStep::ListBlobs;
        self.list_blobs(run, &container)
            .instrument(create_step_span(step.name(), run_id))
            .await?;
        if !self.advance(run, step).await? {
            return Ok(());
        }

        let step = WorkflowStep::DownloadFile;
        self.download_file(run, &container, &uploaded)
            .instrument(create_step_span(step.name(), run_id))
            .await?;
        self.advance(run, step).await?;
        Ok(())
    }

    /// Record `step` as completed and pause if another step follows.
    /// Returns whether the run continues.
    async fn advance(&self, run: &mut Run<'_>, step: WorkflowStep) -> Result<bool, WorkflowError> {
        run.report.completed.push(step);

        let continues = step < run.through && step.next().is_some();
        if continues {
            debug!(step = %step, "Waiting for acknowledgment before the next step");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(WorkflowError::new(step, StepFailure::Cancelled));
                }
                _ = run.pause.pause(step) => {}
            }
            // A pause may resume in the same poll that cancelled the run.
            if self.cancel.is_cancelled() {
                return Err(WorkflowError::new(step, StepFailure::Cancelled));
            }
        }
        Ok(continues)
    }

    /// Await a collaborator call, failing `step` if the run is cancelled first
    async fn guarded<T, E, F>(&self, step: WorkflowStep, call: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StepFailure>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WorkflowError::new(step, StepFailure::Cancelled)),
            result = call => result.map_err(|e| WorkflowError::new(step, e)),
        }
    }

    async fn create_container(&self, run: &mut Run<'_>) -> Result<ContainerHandle, WorkflowError> {
        let step = WorkflowStep::CreateContainer;
        run.observer.notify(&WorkflowEvent::StepStarted(step));

        let name = run.options.container_name();
        debug!(container = %name, "Creating container");
        let container = self
            .guarded(step, self.storage.create_container(&name))
            .await?;

        run.report.artifacts.container = Some(container.clone());
        run.observer.notify(&WorkflowEvent::StepCompleted {
            step,
            summary: format!("A container named '{container}' has been created."),
        });
        Ok(container)
    }

    async fn upload_file(
        &self,
        run: &mut Run<'_>,
        container: &ContainerHandle,
    ) -> Result<UploadedFile, WorkflowError> {
        let step = WorkflowStep::UploadFile;
        run.observer.notify(&WorkflowEvent::StepStarted(step));

        let file_name = run.options.file_name();
        let source_path = run.options.data_dir.join(&file_name);
        run.report.artifacts.local_file_name = Some(file_name.clone());

        self.guarded(step, self.fs.create_dir_all(&run.options.data_dir))
            .await?;
        self.guarded(step, self.fs.write(&source_path, &run.options.payload))
            .await?;
        run.report.artifacts.source_path = Some(source_path.clone());

        let content = self.guarded(step, self.fs.open_read(&source_path)).await?;
        debug!(blob = %file_name, path = %source_path.display(), "Uploading blob");
        self.guarded(
            step,
            self.storage.upload_blob(container, &file_name, content, true),
        )
        .await?;

        run.report.artifacts.blob_name = Some(file_name.clone());
        run.observer.notify(&WorkflowEvent::StepCompleted {
            step,
            summary: format!(
                "Uploaded {} to blob '{file_name}' in container '{container}'.",
                source_path.display()
            ),
        });
        Ok(UploadedFile {
            blob_name: file_name,
            source_path,
        })
    }

    async fn list_blobs(&self, run: &mut Run<'_>, container: &ContainerHandle) -> Result<(), WorkflowError> {
        let step = WorkflowStep::ListBlobs;
        run.observer.notify(&WorkflowEvent::StepStarted(step));

        let mut names = self.guarded(step, self.storage.list_blobs(container)).await?;
        loop {
            let next = self
                .guarded(step, async { Ok::<_, StepFailure>(names.next().await) })
                .await?;
            let Some(name) = next else { break };
            let name = name.map_err(|e| WorkflowError::new(step, e))?;
            run.observer.notify(&WorkflowEvent::BlobListed(name.clone()));
            run.report.listed_blobs.push(name);
        }

        run.observer.notify(&WorkflowEvent::StepCompleted {
            step,
            summary: format!(
                "Listed {} blob(s) in container '{container}'.",
                run.report.listed_blobs.len()
            ),
        });
        Ok(())
    }

    async fn download_file(
        &self,
        run: &mut Run<'_>,
        container: &ContainerHandle,
        uploaded: &UploadedFile,
    ) -> Result<(), WorkflowError> {
        let step = WorkflowStep::DownloadFile;
        run.observer.notify(&WorkflowEvent::StepStarted(step));

        let destination = downloaded_path(&uploaded.source_path, &run.options.download_marker);
        debug!(blob = %uploaded.blob_name, path = %destination.display(), "Downloading blob");

        let mut content = self
            .guarded(step, self.storage.download_blob(container, &uploaded.blob_name))
            .await?;
        let mut sink = self.guarded(step, self.fs.open_write(&destination)).await?;
        let bytes = self
            .guarded(step, async {
                let copied = tokio::io::copy(&mut content, &mut sink).await?;
                sink.flush().await?;
                sink.shutdown().await?;
                Ok::<_, std::io::Error>(copied)
            })
            .await?;

        run.report.artifacts.downloaded_path = Some(destination.clone());
        run.observer.notify(&WorkflowEvent::StepCompleted {
            step,
            summary: format!(
                "Downloaded {bytes} byte(s) to {}.",
                destination.display()
            ),
        });
        Ok(())
    }
}
