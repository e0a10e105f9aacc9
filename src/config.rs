use anyhow::{Context, Result, bail};
use directories::BaseDirs;
use reqwest::Url;
use std::{
    env::current_exe,
    path::{Component, Path, PathBuf},
};

/// Name of the downloaded archive inside the staging directory.
pub const ARCHIVE_NAME: &str = "repo.zip";
/// Conventional capability directory inside a bundle.
pub const PLUGINS_DIR: &str = "plugins";

const DEFAULT_BUNDLE_DIR: &str = "bundle";

/// Everything a single launch needs. Built once, then only borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Remote ZIP archive
    pub url: String,
    /// Staging directory, wiped on every run
    pub staging_root: PathBuf,
    /// Top-level directory the archive is expected to unpack into
    pub bundle_dir: String,
    /// Optional settings file to overlay onto the bundle
    pub local_settings: PathBuf,
    /// Where the settings file lands, relative to the bundle
    pub settings_dest: PathBuf,
    /// Program used to run the entry point, eg: `node`
    pub runner: String,
    /// Entry point file, directly under the bundle
    pub entry: String,
    /// Environment variable that marks a production run
    pub mode_var: String,
    pub mode_value: String,
    /// Extra download attempts after the first one fails
    pub fetch_retries: u32,
    /// Exit with the bundle's own exit code once it terminates
    pub propagate_exit_code: bool,
}

impl BootstrapConfig {
    /// A config with the stock `node index.js` layout.
    /// The bundle directory is derived from `url` where possible.
    #[must_use]
    pub fn new(url: &str, staging_root: PathBuf) -> Self {
        let bundle_dir =
            derive_bundle_dir(url).unwrap_or_else(|| DEFAULT_BUNDLE_DIR.to_owned());

        Self {
            url: url.to_owned(),
            local_settings: PathBuf::from("settings.js"),
            staging_root,
            bundle_dir,
            settings_dest: PathBuf::from("settings.js"),
            runner: "node".to_owned(),
            entry: "index.js".to_owned(),
            mode_var: "NODE_ENV".to_owned(),
            mode_value: "production".to_owned(),
            fetch_retries: 0,
            propagate_exit_code: false,
        }
    }

    /// The extraction root. Always a direct child of the staging root.
    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        self.staging_root.join(&self.bundle_dir)
    }

    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.staging_root.join(ARCHIVE_NAME)
    }

    #[must_use]
    pub fn extracted_settings(&self) -> PathBuf {
        self.extract_dir().join(&self.settings_dest)
    }

    #[must_use]
    pub fn entry_point(&self) -> PathBuf {
        self.extract_dir().join(&self.entry)
    }

    /// Rejects paths that would leave the staging root or the bundle.
    ///
    /// # Errors
    ///
    /// - `bundle_dir` or `entry` is not a single plain path component
    /// - `settings_dest` is empty, absolute, or climbs out of the bundle
    pub fn validate(&self) -> Result<()> {
        if !is_single_component(Path::new(&self.bundle_dir)) {
            bail!("Invalid bundle directory: {}", self.bundle_dir);
        }

        if !is_single_component(Path::new(&self.entry)) {
            bail!("Entry point must sit directly in the bundle: {}", self.entry);
        }

        if !is_contained(&self.settings_dest) {
            bail!(
                "Settings destination must stay inside the bundle: {}",
                self.settings_dest.display()
            );
        }

        Ok(())
    }
}

/// Exactly one normal component, eg: `index.js` but not `a/b`, `..` or `/x`.
#[must_use]
pub fn is_single_component(path: &Path) -> bool {
    let mut components = path.components();

    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn is_contained(path: &Path) -> bool {
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Guesses the directory an archive unpacks into from its URL.
///
/// GitHub archives (`/<owner>/<repo>/archive/<ref>.zip`, including the
/// `refs/heads/<ref>.zip` form) unpack into `<repo>-<ref>`. Anything else
/// falls back to the archive's file stem.
#[must_use]
pub fn derive_bundle_dir(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let file_name = segments.last()?;
    let stem = Path::new(file_name).file_stem()?.to_str()?;

    if segments.len() >= 4 && segments[2] == "archive" {
        return Some(format!("{}-{stem}", segments[1]));
    }

    Some(stem.to_owned())
}

/// Appends `depth` hidden `.xN` segments to `base`.
#[must_use]
pub fn nested_staging_root(base: &Path, depth: usize) -> PathBuf {
    (1..=depth).fold(base.to_path_buf(), |path, level| {
        path.join(format!(".x{level}"))
    })
}

/// Default staging location inside the user's cache directory.
///
/// # Errors
///
/// - No home directory could be determined
pub fn default_staging_dir() -> Result<PathBuf> {
    // Locate XDG cache directory
    let base_dirs = BaseDirs::new().context("Could not find user directories")?;

    Ok(base_dirs.cache_dir().join("bundle-launcher").join("staging"))
}

/// Default settings file, next to the launcher executable.
///
/// # Errors
///
/// - The current executable path cannot be resolved
pub fn default_local_settings() -> Result<PathBuf> {
    let executable_path = current_exe()
        .with_context(|| "Could not get current executable path")?
        .canonicalize()?;
    let executable_dir = executable_path
        .parent()
        .context("Executable has no parent directory")?;

    Ok(executable_dir.join("settings.js"))
}
