use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};
use tokio::{
    process::{Child, Command},
    task::JoinHandle,
};

use crate::{
    config::{BootstrapConfig, is_single_component},
    error::{BootstrapError, Result},
    log::{starting, terminated},
};

/// The exact process the launcher is about to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
    /// Added on top of the launcher's own environment
    pub env: Vec<(String, String)>,
}

impl LaunchPlan {
    #[must_use]
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            program: config.runner.clone(),
            args: vec![config.entry.clone()],
            current_dir: config.extract_dir(),
            env: vec![(config.mode_var.clone(), config.mode_value.clone())],
        }
    }
}

/// Creates OS processes. Swappable so the launch path can be observed in tests.
pub trait Spawner {
    /// # Errors
    ///
    /// - The OS could not create the process
    fn spawn(&self, plan: &LaunchPlan) -> io::Result<Child>;
}

/// Spawns real processes sharing the launcher's stdin, stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSpawner;

impl Spawner for ProcessSpawner {
    fn spawn(&self, plan: &LaunchPlan) -> io::Result<Child> {
        Command::new(&plan.program)
            .args(&plan.args)
            .current_dir(&plan.current_dir)
            .envs(plan.env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
    }
}

/// How a supervised bundle ended.
#[derive(Debug)]
pub enum ChildOutcome {
    Exited(ExitStatus),
    /// The process was never created
    SpawnFailed(io::Error),
    /// The process was created but its exit could not be observed
    Lost(io::Error),
}

/// Owned handle on a launched bundle.
///
/// The child runs on its own as soon as [`launch`] returns; dropping the
/// handle detaches it, [`SupervisedChild::wait`] observes its end.
#[derive(Debug)]
pub struct SupervisedChild {
    pid: Option<u32>,
    watcher: JoinHandle<ChildOutcome>,
}

impl SupervisedChild {
    #[must_use]
    pub const fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Resolves once the bundle exits, or immediately if it never started.
    pub async fn wait(self) -> ChildOutcome {
        match self.watcher.await {
            Ok(outcome) => outcome,
            Err(err) => ChildOutcome::Lost(io::Error::other(err)),
        }
    }
}

/// Starts the bundle's entry point and returns without waiting for it.
///
/// Spawn failures are not returned here, they surface through
/// [`SupervisedChild::wait`]. Must be called inside a tokio runtime.
///
/// # Errors
///
/// - The extraction directory does not exist
/// - The entry point is missing from the extraction directory, or is
///   not directly inside it
pub fn launch(config: &BootstrapConfig, spawner: &impl Spawner) -> Result<SupervisedChild> {
    starting(&config.runner, &config.entry);

    let extract_dir = config.extract_dir();
    if !extract_dir.is_dir() {
        return Err(BootstrapError::Precondition(format!(
            "extracted directory {} not found",
            extract_dir.display()
        )));
    }

    if !is_single_component(Path::new(&config.entry)) {
        return Err(BootstrapError::Precondition(format!(
            "entry point {} is not directly inside the extracted directory",
            config.entry
        )));
    }

    if !config.entry_point().is_file() {
        return Err(BootstrapError::Precondition(format!(
            "{} not found in extracted directory",
            config.entry
        )));
    }

    let plan = LaunchPlan::from_config(config);

    let (pid, watcher) = match spawner.spawn(&plan) {
        Ok(child) => (child.id(), tokio::spawn(observe(child))),
        Err(err) => (None, tokio::spawn(async move { ChildOutcome::SpawnFailed(err) })),
    };

    Ok(SupervisedChild { pid, watcher })
}

async fn observe(mut child: Child) -> ChildOutcome {
    match child.wait().await {
        Ok(status) => {
            terminated(status);
            ChildOutcome::Exited(status)
        }
        Err(err) => ChildOutcome::Lost(err),
    }
}
