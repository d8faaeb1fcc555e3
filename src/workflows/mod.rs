// Workflow orchestration modules
// Linear blob lifecycle: create container, upload, list, download

pub mod observer;
pub mod orchestrator;
pub mod pause;
pub mod steps;

pub use observer::{ConsoleObserver, RecordingObserver, TracingObserver, WorkflowEvent, WorkflowObserver};
pub use orchestrator::Workflow;
pub use pause::{ConsolePause, NoPause, Pause};
pub use steps::{
    downloaded_path, SessionArtifacts, StepFailure, WorkflowError, WorkflowOptions, WorkflowReport,
    WorkflowStep,
};
