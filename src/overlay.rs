use std::{fs, io, path::Path};

use crate::{
    error::BootstrapError,
    log::{no_local_settings, settings_applied, settings_failed},
};

/// What happened to the local settings file.
#[derive(Debug)]
pub enum OverlayOutcome {
    /// No local file, the bundle keeps its own defaults
    Defaults,
    Applied,
    /// Logged and otherwise ignored. The bundle still launches.
    Failed(BootstrapError),
}

/// Copies `local_path` over `dest_path` if it exists.
/// Never fails the run, see [`OverlayOutcome::Failed`].
pub fn apply_if_present(local_path: &Path, dest_path: &Path) -> OverlayOutcome {
    if !local_path.exists() {
        no_local_settings(local_path);
        return OverlayOutcome::Defaults;
    }

    match copy_settings(local_path, dest_path) {
        Ok(()) => {
            settings_applied();
            OverlayOutcome::Applied
        }
        Err(source) => {
            let err = BootstrapError::Overlay {
                path: dest_path.to_path_buf(),
                source,
            };
            settings_failed(&err);
            OverlayOutcome::Failed(err)
        }
    }
}

fn copy_settings(local_path: &Path, dest_path: &Path) -> io::Result<()> {
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::copy(local_path, dest_path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_dir::TempDir;

    #[test]
    fn missing_local_settings_is_a_noop() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("bundle/settings.js");

        let outcome = apply_if_present(&temp_dir.path().join("settings.js"), &dest);

        assert!(matches!(outcome, OverlayOutcome::Defaults));
        assert!(!dest.exists());
    }

    #[test]
    fn copies_bytes_exactly() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("settings.js");
        let dest = temp_dir.path().join("bundle/config/settings.js");
        let contents: Vec<u8> = (0..=255).cycle().take(4096).collect();
        fs::write(&local, &contents).unwrap();

        let outcome = apply_if_present(&local, &dest);

        assert!(matches!(outcome, OverlayOutcome::Applied));
        assert_eq!(fs::read(&dest).unwrap(), contents);
    }

    #[test]
    fn overwrites_bundled_settings() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("settings.js");
        let dest = temp_dir.path().join("bundle/settings.js");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, "module.exports = { bundled: true, padding: '....' }").unwrap();
        fs::write(&local, "module.exports = {}").unwrap();

        apply_if_present(&local, &dest);

        assert_eq!(fs::read_to_string(&dest).unwrap(), "module.exports = {}");
    }

    #[test]
    fn directory_in_place_of_settings_is_a_failure() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("settings.js");
        fs::create_dir_all(&local).unwrap();

        let outcome = apply_if_present(&local, &temp_dir.path().join("bundle/settings.js"));

        assert!(matches!(
            outcome,
            OverlayOutcome::Failed(BootstrapError::Overlay { .. })
        ));
    }

    #[test]
    fn copy_failure_is_reported_not_raised() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("settings.js");
        let blocker = temp_dir.path().join("bundle");
        fs::write(&local, "module.exports = {}").unwrap();
        fs::write(&blocker, "a file where a directory should be").unwrap();

        let outcome = apply_if_present(&local, &blocker.join("settings.js"));

        assert!(matches!(
            outcome,
            OverlayOutcome::Failed(BootstrapError::Overlay { .. })
        ));
    }
}
