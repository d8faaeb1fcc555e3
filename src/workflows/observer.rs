// Progress notifications emitted while a walkthrough runs

use std::sync::Mutex;

use super::steps::WorkflowStep;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    StepStarted(WorkflowStep),
    StepCompleted { step: WorkflowStep, summary: String },
    BlobListed(String),
}

/// Receives progress notifications in the order they happen
pub trait WorkflowObserver: Send + Sync {
    fn notify(&self, event: &WorkflowEvent);
}

/// Prints walkthrough narration to stdout
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl WorkflowObserver for ConsoleObserver {
    fn notify(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::StepStarted(step) => println!("\n▶ {}", describe(*step)),
            WorkflowEvent::StepCompleted { summary, .. } => println!("{summary}"),
            WorkflowEvent::BlobListed(name) => println!("\t{name}"),
        }
    }
}

fn describe(step: WorkflowStep) -> &'static str {
    match step {
        WorkflowStep::CreateContainer => "Creating a container",
        WorkflowStep::UploadFile => "Uploading a file to the container",
        WorkflowStep::ListBlobs => "Listing blobs in the container",
        WorkflowStep::DownloadFile => "Downloading the blob",
    }
}

/// Forwards events to `tracing` instead of the console
#[derive(Debug, Default)]
pub struct TracingObserver;

impl WorkflowObserver for TracingObserver {
    fn notify(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::StepStarted(step) => tracing::info!(step = %step, "Step started"),
            WorkflowEvent::StepCompleted { step, summary } => {
                tracing::info!(step = %step, summary = %summary, "Step completed")
            }
            WorkflowEvent::BlobListed(name) => tracing::info!(blob = %name, "Blob listed"),
        }
    }
}

/// Keeps every event for later inspection
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn listed_blobs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                WorkflowEvent::BlobListed(name) => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl WorkflowObserver for RecordingObserver {
    fn notify(&self, event: &WorkflowEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
