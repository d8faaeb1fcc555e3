use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{Settings, SettingsResolver};
use crate::fs::StandardFileSystem;
use crate::storage::{BlobStorage, InMemoryBlobStorage};
use crate::workflows::{ConsoleObserver, ConsolePause, NoPause, Pause, Workflow, WorkflowStep};

#[derive(Parser, Debug)]
#[command(name = "blob-walkthrough")]
#[command(about = "Step-by-step blob storage walkthrough")]
#[command(long_about = "Creates a container, uploads a file, lists the container's blobs and \
                       downloads the blob again, pausing between steps so each result can be \
                       inspected in the storage account.")]
pub struct Cli {
    #[arg(long, value_enum, default_value = "download-file", help = "Last step to run")]
    pub through: WorkflowStep,
    #[arg(short = 'y', long, help = "Skip the pauses between steps")]
    pub yes: bool,
    #[arg(long, help = "Use an in-memory blob service; no credentials required")]
    pub in_memory: bool,
    #[arg(long, default_value = ".", help = "Directory holding appsettings.json and profile overlays")]
    pub config_dir: PathBuf,
    #[arg(long, help = "Profile overlay to apply, e.g. Development")]
    pub profile: Option<String>,
    #[arg(long, help = "Write structured JSON logs to stderr")]
    pub log_json: bool,
}

impl Cli {
    pub fn resolver(&self) -> SettingsResolver {
        match &self.profile {
            Some(profile) => SettingsResolver::standard(&self.config_dir, Some(profile)),
            None => SettingsResolver::from_process_env(&self.config_dir),
        }
    }

    fn settings(&self) -> Result<Settings> {
        match self.resolver().resolve() {
            Ok(settings) => Ok(settings),
            // The in-memory service never looks at the credential.
            Err(e) if self.in_memory => {
                tracing::debug!("Using placeholder settings for in-memory run: {}", e);
                Ok(Settings::new("in-memory"))
            }
            Err(e) => Err(e).context("Failed to resolve storage settings"),
        }
    }
}

/// Build the storage collaborator for a run
pub fn connect_storage(settings: &Settings, in_memory: bool) -> Result<Arc<dyn BlobStorage>> {
    if in_memory {
        return Ok(Arc::new(InMemoryBlobStorage::new()));
    }

    #[cfg(feature = "azure")]
    {
        let storage = crate::storage::AzureBlobStorage::from_connection_string(settings.connection_string())
            .context("Failed to create blob service client")?;
        Ok(Arc::new(storage))
    }

    #[cfg(not(feature = "azure"))]
    {
        let _ = settings;
        anyhow::bail!("Built without the `azure` feature; rerun with --in-memory")
    }
}

/// Run the walkthrough described by the command line
pub async fn execute(cli: Cli) -> Result<()> {
    println!("Azure Blob Storage exercise\n");

    let settings = cli.settings()?;
    let storage = connect_storage(&settings, cli.in_memory)?;

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling walkthrough");
            ctrl_c_token.cancel();
        }
    });

    let workflow = Workflow::new(storage, Arc::new(StandardFileSystem)).with_cancellation(token.clone());
    let console;
    let pause: &dyn Pause = if cli.yes {
        &NoPause
    } else {
        console = ConsolePause::new();
        &console
    };

    let report = workflow.run_until(&settings, pause, &ConsoleObserver, cli.through).await?;
    if let Some(path) = &report.artifacts.downloaded_path {
        println!("\nLocate the local file in {} to verify it was downloaded.", path.display());
    }
    if !cli.yes {
        let console = ConsolePause::new();
        tokio::select! {
            _ = token.cancelled() => {}
            _ = console.wait_for_exit() => {}
        }
    }
    Ok(())
}
