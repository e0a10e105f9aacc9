use anyhow::Result;
use clap::Parser;
use std::{
    path::PathBuf,
    process::{ExitCode, ExitStatus},
};

use bundle_launcher::{
    config::{BootstrapConfig, default_local_settings, default_staging_dir, nested_staging_root},
    log::fatal,
    pipeline::run,
    run::ProcessSpawner,
};

/// Downloads the latest bundle, unpacks it and runs it
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// URL of the bundle's ZIP archive
    #[arg(long, env = "BUNDLE_URL")]
    url: String,

    /// Directory the archive unpacks into. Derived from the URL by default
    #[arg(long, env = "BUNDLE_DIR")]
    bundle_dir: Option<String>,

    /// Staging directory, wiped on every run. Defaults to the user cache
    #[arg(long, env = "BUNDLE_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Hide the staging directory this many `.xN` levels deep
    #[arg(long, default_value_t = 0)]
    nesting_depth: usize,

    /// Local settings file. Defaults to `settings.js` next to this executable
    #[arg(long, env = "BUNDLE_SETTINGS")]
    settings: Option<PathBuf>,

    /// Where the settings file goes, relative to the bundle
    #[arg(long, default_value = "settings.js")]
    settings_dest: PathBuf,

    /// Program that runs the entry point
    #[arg(long, default_value = "node")]
    runner: String,

    /// Entry point, directly inside the bundle
    #[arg(long, default_value = "index.js")]
    entry: String,

    /// Environment variable marking a production run
    #[arg(long, default_value = "NODE_ENV")]
    mode_var: String,

    #[arg(long, default_value = "production")]
    mode_value: String,

    /// Extra download attempts after a failed one
    #[arg(long, default_value_t = 0)]
    fetch_retries: u32,

    /// Exit with the bundle's exit code instead of 0
    #[arg(long)]
    propagate_exit_code: bool,
}

impl Args {
    fn into_config(self) -> Result<BootstrapConfig> {
        let staging_base = match self.staging_dir {
            Some(staging_dir) => staging_dir,
            None => default_staging_dir()?,
        };

        let mut config = BootstrapConfig::new(
            &self.url,
            nested_staging_root(&staging_base, self.nesting_depth),
        );

        if let Some(bundle_dir) = self.bundle_dir {
            config.bundle_dir = bundle_dir;
        }

        config.local_settings = match self.settings {
            Some(settings) => settings,
            None => default_local_settings()?,
        };
        config.settings_dest = self.settings_dest;
        config.runner = self.runner;
        config.entry = self.entry;
        config.mode_var = self.mode_var;
        config.mode_value = self.mode_value;
        config.fetch_retries = self.fetch_retries;
        config.propagate_exit_code = self.propagate_exit_code;
        config.validate()?;

        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(err) => {
            fatal(&*err);
            return ExitCode::FAILURE;
        }
    };

    match run(&config, &ProcessSpawner).await {
        Ok(Some(status)) if config.propagate_exit_code => exit_code(status),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            fatal(&err);
            ExitCode::FAILURE
        }
    }
}

fn exit_code(status: ExitStatus) -> ExitCode {
    status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from)
}
