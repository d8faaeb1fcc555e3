//! Integration tests for the blob walkthrough
//!
//! These tests drive the full step sequence against the in-memory blob
//! service and file systems, checking ordering, pacing, failure propagation
//! and the files left behind.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use blob_walkthrough::storage::{StorageCall, StorageOperation};
use blob_walkthrough::{
    InMemoryBlobStorage, MemoryFileSystem, NoPause, RecordingObserver, Settings, StandardFileSystem,
    StepFailure, StorageError, Workflow, WorkflowEvent, WorkflowStep,
};
use tempfile::TempDir;

fn settings() -> Settings {
    Settings::new("DefaultEndpointsProtocol=https;AccountName=stub;AccountKey=c3R1Yg==")
}

fn workflow(storage: &Arc<InMemoryBlobStorage>, fs_ops: &MemoryFileSystem) -> Workflow {
    Workflow::new(storage.clone(), Arc::new(fs_ops.clone()))
}

#[tokio::test]
async fn test_full_run_visits_every_step_in_order() {
    let storage = Arc::new(InMemoryBlobStorage::new());
    let fs_ops = MemoryFileSystem::new();
    let observer = RecordingObserver::new();

    let report = workflow(&storage, &fs_ops)
        .run(&settings(), &NoPause, &observer)
        .await
        .unwrap();

    assert_eq!(report.completed, WorkflowStep::ALL.to_vec());

    let events = observer.events();
    let mut expected_steps = WorkflowStep::ALL.iter();
    let mut current = None;
    for event in &events {
        match event {
            WorkflowEvent::StepStarted(step) => {
                assert!(current.is_none(), "{step} started before previous step completed");
                assert_eq!(Some(step), expected_steps.next());
                current = Some(*step);
            }
            WorkflowEvent::StepCompleted { step, .. } => {
                assert_eq!(current, Some(*step));
                current = None;
            }
            WorkflowEvent::BlobListed(_) => assert_eq!(current, Some(WorkflowStep::ListBlobs)),
        }
    }
    assert!(expected_steps.next().is_none());

    let started = events
        .iter()
        .filter(|e| matches!(e, WorkflowEvent::StepStarted(_)))
        .count();
    let completed = events
        .iter()
        .filter(|e| matches!(e, WorkflowEvent::StepCompleted { .. }))
        .count();
    assert_eq!(started, 4);
    assert_eq!(completed, 4);
    assert_eq!(events.len(), 4 + 4 + report.listed_blobs.len());

    let operations: Vec<StorageOperation> = storage.calls().iter().map(StorageCall::operation).collect();
    assert_eq!(
        operations,
        vec![
            StorageOperation::CreateContainer,
            StorageOperation::UploadBlob,
            StorageOperation::ListBlobs,
            StorageOperation::DownloadBlob,
        ]
    );
}

#[tokio::test]
async fn test_end_to_end_files_match() {
    let storage = Arc::new(InMemoryBlobStorage::new());
    let fs_ops = MemoryFileSystem::new();

    let report = workflow(&storage, &fs_ops)
        .run(&settings(), &NoPause, &RecordingObserver::new())
        .await
        .unwrap();

    assert_eq!(report.last_step(), Some(WorkflowStep::DownloadFile));

    let artifacts = &report.artifacts;
    let source = artifacts.source_path.as_ref().unwrap();
    let downloaded = artifacts.downloaded_path.as_ref().unwrap();
    assert_ne!(source, downloaded);

    let original = fs_ops.contents(source).unwrap();
    let copy = fs_ops.contents(downloaded).unwrap();
    assert_eq!(original, b"Hello, World!");
    assert_eq!(original, copy);

    let blob_name = artifacts.blob_name.as_ref().unwrap();
    let container = artifacts.container.as_ref().unwrap();
    assert_eq!(Some(blob_name), artifacts.local_file_name.as_ref());
    assert_eq!(report.listed_blobs, vec![blob_name.clone()]);
    assert_eq!(storage.blob(container.name(), blob_name), Some(b"Hello, World!".to_vec()));

    let downloaded_name = downloaded.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(downloaded_name, blob_name.replace(".txt", "DOWNLOADED.txt"));
}

#[tokio::test]
async fn test_listed_names_use_uploaded_blob_name() {
    let storage = Arc::new(InMemoryBlobStorage::new());
    let fs_ops = MemoryFileSystem::new();
    let observer = RecordingObserver::new();

    let report = workflow(&storage, &fs_ops)
        .run(&settings(), &NoPause, &observer)
        .await
        .unwrap();

    let blob_name = report.artifacts.blob_name.clone().unwrap();
    assert_eq!(observer.listed_blobs(), vec![blob_name.clone()]);

    let downloads: Vec<StorageCall> = storage
        .calls()
        .into_iter()
        .filter(|c| c.operation() == StorageOperation::DownloadBlob)
        .collect();
    assert_eq!(
        downloads,
        vec![StorageCall::DownloadBlob {
            container: report.artifacts.container.unwrap().name().to_string(),
            blob: blob_name,
        }]
    );
}

#[tokio::test]
async fn test_upload_failure_stops_the_run() {
    let storage = Arc::new(InMemoryBlobStorage::new());
    storage.fail_on(StorageOperation::UploadBlob);
    let fs_ops = MemoryFileSystem::new();
    let observer = RecordingObserver::new();

    let err = workflow(&storage, &fs_ops)
        .run(&settings(), &NoPause, &observer)
        .await
        .unwrap_err();

    assert_eq!(err.step, WorkflowStep::UploadFile);
    assert!(matches!(
        err.cause,
        StepFailure::Storage(StorageError::Service {
            operation: StorageOperation::UploadBlob,
            ..
        })
    ));
    assert!(!storage.was_called(StorageOperation::ListBlobs));
    assert!(!storage.was_called(StorageOperation::DownloadBlob));

    // No rollback: the container and the local file stay behind.
    assert_eq!(storage.container_names().len(), 1);
    assert_eq!(fs_ops.file_paths().len(), 1);

    assert!(!observer
        .events()
        .iter()
        .any(|e| matches!(e, WorkflowEvent::StepStarted(WorkflowStep::ListBlobs))));
}

#[tokio::test]
async fn test_create_failure_never_touches_files() {
    let storage = Arc::new(InMemoryBlobStorage::new());
    storage.fail_on(StorageOperation::CreateContainer);
    let fs_ops = MemoryFileSystem::new();

    let err = workflow(&storage, &fs_ops)
        .run(&settings(), &NoPause, &RecordingObserver::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, WorkflowStep::CreateContainer);
    assert!(fs_ops.file_paths().is_empty());
    assert_eq!(storage.calls().len(), 1);
}

#[tokio::test]
async fn test_list_and_download_failures_name_their_step() {
    for (operation, step) in [
        (StorageOperation::ListBlobs, WorkflowStep::ListBlobs),
        (StorageOperation::DownloadBlob, WorkflowStep::DownloadFile),
    ] {
        let storage = Arc::new(InMemoryBlobStorage::new());
        storage.fail_on(operation);

        let err = workflow(&storage, &MemoryFileSystem::new())
            .run(&settings(), &NoPause, &RecordingObserver::new())
            .await
            .unwrap_err();

        assert_eq!(err.step, step);
    }
}

#[tokio::test]
async fn test_names_are_unique_across_runs() {
    let storage = Arc::new(InMemoryBlobStorage::new());
    let fs_ops = MemoryFileSystem::new();
    let workflow = workflow(&storage, &fs_ops);

    let first = workflow
        .run(&settings(), &NoPause, &RecordingObserver::new())
        .await
        .unwrap();
    let second = workflow
        .run(&settings(), &NoPause, &RecordingObserver::new())
        .await
        .unwrap();

    assert_ne!(first.artifacts.container, second.artifacts.container);
    assert_ne!(first.artifacts.blob_name, second.artifacts.blob_name);
    assert_ne!(first.artifacts.source_path, second.artifacts.source_path);
    assert_eq!(storage.container_names().len(), 2);

    // Each run only sees its own blob.
    assert_eq!(second.listed_blobs, vec![second.artifacts.blob_name.clone().unwrap()]);
}

#[tokio::test]
async fn test_pauses_between_steps_only() {
    let storage = Arc::new(InMemoryBlobStorage::new());
    let pauses = AtomicUsize::new(0);
    let pause = || {
        pauses.fetch_add(1, Ordering::SeqCst);
    };

    workflow(&storage, &MemoryFileSystem::new())
        .run(&settings(), &pause, &RecordingObserver::new())
        .await
        .unwrap();

    assert_eq!(pauses.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_checkpoint_runs_stop_at_terminal_step() {
    for (index, through) in WorkflowStep::ALL.iter().copied().enumerate() {
        let storage = Arc::new(InMemoryBlobStorage::new());
        let pauses = AtomicUsize::new(0);
        let pause = || {
            pauses.fetch_add(1, Ordering::SeqCst);
        };

        let report = workflow(&storage, &MemoryFileSystem::new())
            .run_until(&settings(), &pause, &RecordingObserver::new(), through)
            .await
            .unwrap();

        assert_eq!(report.completed, WorkflowStep::ALL[..=index].to_vec());
        assert_eq!(report.last_step(), Some(through));
        assert_eq!(storage.calls().len(), index + 1);
        assert_eq!(pauses.load(Ordering::SeqCst), index);
    }
}

#[tokio::test]
async fn test_run_against_real_file_system() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(InMemoryBlobStorage::new());
    let mut settings = settings();
    settings.workflow.data_dir = dir.path().join("data");

    let report = Workflow::new(storage, Arc::new(StandardFileSystem))
        .run(&settings, &NoPause, &RecordingObserver::new())
        .await
        .unwrap();

    let source = report.artifacts.source_path.unwrap();
    let downloaded = report.artifacts.downloaded_path.unwrap();
    assert_eq!(source.parent(), Some(Path::new(&settings.workflow.data_dir)));
    assert_eq!(std::fs::read_to_string(&source).unwrap(), "Hello, World!");
    assert_eq!(std::fs::read(&source).unwrap(), std::fs::read(&downloaded).unwrap());
}
