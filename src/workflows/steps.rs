// Walkthrough steps, run-scoped artifacts and the failure taxonomy

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::storage::{ContainerHandle, StorageError};

/// One stage of the walkthrough, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum WorkflowStep {
    CreateContainer,
    UploadFile,
    ListBlobs,
    DownloadFile,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 4] = [
        WorkflowStep::CreateContainer,
        WorkflowStep::UploadFile,
        WorkflowStep::ListBlobs,
        WorkflowStep::DownloadFile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStep::CreateContainer => "CreateContainer",
            WorkflowStep::UploadFile => "UploadFile",
            WorkflowStep::ListBlobs => "ListBlobs",
            WorkflowStep::DownloadFile => "DownloadFile",
        }
    }

    /// The step that must complete before this one, if any
    pub fn predecessor(&self) -> Option<WorkflowStep> {
        match self {
            WorkflowStep::CreateContainer => None,
            WorkflowStep::UploadFile => Some(WorkflowStep::CreateContainer),
            WorkflowStep::ListBlobs => Some(WorkflowStep::UploadFile),
            WorkflowStep::DownloadFile => Some(WorkflowStep::ListBlobs),
        }
    }

    pub fn next(&self) -> Option<WorkflowStep> {
        match self {
            WorkflowStep::CreateContainer => Some(WorkflowStep::UploadFile),
            WorkflowStep::UploadFile => Some(WorkflowStep::ListBlobs),
            WorkflowStep::ListBlobs => Some(WorkflowStep::DownloadFile),
            WorkflowStep::DownloadFile => None,
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Naming and payload options; every field has a default
///
/// Settings keys are matched in lowercase (`containerPrefix` in a JSON file,
/// `BLOB_WALKTHROUGH__WORKFLOW__CONTAINERPREFIX` in the environment).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkflowOptions {
    #[serde(rename = "containerprefix", alias = "container_prefix")]
    pub container_prefix: String,
    #[serde(rename = "fileprefix", alias = "file_prefix")]
    pub file_prefix: String,
    #[serde(rename = "fileextension", alias = "file_extension")]
    pub file_extension: String,
    pub payload: String,
    #[serde(rename = "datadir", alias = "data_dir")]
    pub data_dir: PathBuf,
    #[serde(rename = "downloadmarker", alias = "download_marker")]
    pub download_marker: String,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            container_prefix: "wtblob".to_string(),
            file_prefix: "wtfile".to_string(),
            file_extension: "txt".to_string(),
            payload: "Hello, World!".to_string(),
            data_dir: PathBuf::from("./data"),
            download_marker: "DOWNLOADED".to_string(),
        }
    }
}

impl WorkflowOptions {
    /// Container name: prefix followed by a fresh UUID, lowercased as the service requires
    pub fn container_name(&self) -> String {
        format!("{}{}", self.container_prefix.to_lowercase(), Uuid::new_v4())
    }

    /// Local file name, also used as the blob name
    pub fn file_name(&self) -> String {
        let extension = self.file_extension.trim_start_matches('.');
        if extension.is_empty() {
            format!("{}{}", self.file_prefix, Uuid::new_v4())
        } else {
            format!("{}{}.{}", self.file_prefix, Uuid::new_v4(), extension)
        }
    }
}

/// Insert `marker` immediately before the extension of `path`'s file name.
///
/// `data/wtfileABC.txt` becomes `data/wtfileABCDOWNLOADED.txt`; a file name
/// without an extension gets the marker appended.
pub fn downloaded_path(path: &Path, marker: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}{marker}.{}", ext.to_string_lossy()),
        None => format!("{stem}{marker}"),
    };
    path.with_file_name(file_name)
}

/// Values produced by one run; never shared between runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionArtifacts {
    pub container: Option<ContainerHandle>,
    pub local_file_name: Option<String>,
    pub blob_name: Option<String>,
    pub source_path: Option<PathBuf>,
    pub downloaded_path: Option<PathBuf>,
}

/// Outcome of a run that reached its terminal step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    pub completed: Vec<WorkflowStep>,
    pub artifacts: SessionArtifacts,
    pub listed_blobs: Vec<String>,
}

impl WorkflowReport {
    pub fn last_step(&self) -> Option<WorkflowStep> {
        self.completed.last().copied()
    }
}

#[derive(Debug, Error)]
pub enum StepFailure {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),
    #[error("Workflow cancelled")]
    Cancelled,
}

/// Terminal failure of a run: the step that failed and why
#[derive(Debug, Error)]
#[error("Step {step} failed: {cause}")]
pub struct WorkflowError {
    pub step: WorkflowStep,
    #[source]
    pub cause: StepFailure,
}

impl WorkflowError {
    pub fn new(step: WorkflowStep, cause: impl Into<StepFailure>) -> Self {
        Self {
            step,
            cause: cause.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, StepFailure::Cancelled)
    }
}
