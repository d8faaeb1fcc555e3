// Blob Walkthrough Library - guided blob storage lifecycle
// This exposes the core components for the CLI host and for testing

pub mod cli;
pub mod config;
pub mod fs;
pub mod storage;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use config::{ConfigError, ConfigLayer, Settings, SettingsResolver, StorageAccountSettings};
pub use fs::{FileSystemOperations, MemoryFileSystem, StandardFileSystem};
pub use storage::{BlobStorage, ContainerHandle, InMemoryBlobStorage, StorageError};
pub use telemetry::{init_telemetry, generate_run_id, create_step_span};
pub use workflows::{
    ConsoleObserver, ConsolePause, NoPause, Pause, RecordingObserver, SessionArtifacts,
    StepFailure, TracingObserver, Workflow, WorkflowError, WorkflowEvent, WorkflowObserver,
    WorkflowOptions, WorkflowReport, WorkflowStep,
};
