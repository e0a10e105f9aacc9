use std::{process::ExitStatus, time::Duration};

use crate::{
    bundle::{extract, has_plugins, network::fetch_with_retries, verify_layout},
    config::{ARCHIVE_NAME, BootstrapConfig},
    error::{BootstrapError, Result},
    log::{lost_child, plugins_found, plugins_missing},
    overlay::{OverlayOutcome, apply_if_present},
    run::{ChildOutcome, Spawner, SupervisedChild, launch},
    staging::StagingStore,
};

/// Pause between writing local settings and starting the bundle.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Stages a fresh bundle and launches it, returning as soon as the child
/// has been started. The caller decides whether to wait on it.
///
/// # Errors
///
/// - Staging directory cannot be reset
/// - Download failed
/// - Archive is invalid or missing the expected directory
/// - Extraction directory or entry point missing at launch
pub async fn start(config: &BootstrapConfig, spawner: &impl Spawner) -> Result<SupervisedChild> {
    let store = StagingStore::new(&config.staging_root);
    store.prepare()?;

    fetch_and_extract(config, &store).await?;

    match apply_if_present(&config.local_settings, &config.extracted_settings()) {
        OverlayOutcome::Defaults => {}
        OverlayOutcome::Applied | OverlayOutcome::Failed(_) => {
            tokio::time::sleep(SETTLE_DELAY).await;
        }
    }

    launch(config, spawner)
}

/// Runs the whole pipeline and waits for the bundle to terminate.
///
/// Returns the bundle's exit status, or `None` if it ran but its exit
/// could not be observed.
///
/// # Errors
///
/// - Anything [`start`] fails with
/// - The bundle process could not be created
pub async fn run(config: &BootstrapConfig, spawner: &impl Spawner) -> Result<Option<ExitStatus>> {
    let child = start(config, spawner).await?;

    match child.wait().await {
        ChildOutcome::Exited(status) => Ok(Some(status)),
        ChildOutcome::SpawnFailed(err) => Err(BootstrapError::Spawn(err)),
        ChildOutcome::Lost(err) => {
            lost_child(&err);
            Ok(None)
        }
    }
}

/// The archive only lives for the length of this function.
async fn fetch_and_extract(config: &BootstrapConfig, store: &StagingStore) -> Result<()> {
    let archive = store.artifact(ARCHIVE_NAME);

    fetch_with_retries(&config.url, archive.path(), config.fetch_retries).await?;
    extract(archive.path(), store.root())?;

    let extract_dir = config.extract_dir();
    verify_layout(&extract_dir)?;

    if has_plugins(&extract_dir) {
        plugins_found();
    } else {
        plugins_missing();
    }

    Ok(())
}
