pub mod network;

use std::{
    fs::{self, File},
    io,
    path::Path,
};
use zip::ZipArchive;

use crate::{
    config::PLUGINS_DIR,
    error::{BootstrapError, Result},
};

/// Extract every entry of the ZIP at `archive_path` into `extract_path`,
/// overwriting whatever is already there.
///
/// # Errors
///
/// - Invalid or truncated ZIP
/// - An entry's name escapes `extract_path`
/// - Filesystem errors
pub fn extract(archive_path: &Path, extract_path: &Path) -> Result<()> {
    let file =
        File::open(archive_path).map_err(|e| extraction_failed("Could not open archive", e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| extraction_failed("Could not read archive", e))?;

    for idx in 0..archive.len() {
        let mut entry = archive
            .by_index(idx)
            .map_err(|e| extraction_failed("Could not read archive entry", e))?;

        let Some(relative_path) = entry.enclosed_name() else {
            return Err(BootstrapError::extraction(format!(
                "Entry {} escapes the extraction directory",
                entry.name()
            )));
        };
        let extracted_path = extract_path.join(relative_path);

        if entry.is_dir() {
            fs::create_dir_all(&extracted_path)
                .map_err(|e| extraction_failed("Could not create directory", e))?;
            continue;
        }

        if let Some(parent) = extracted_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| extraction_failed("Could not create directory", e))?;
        }

        let mut extracted_file = File::create(&extracted_path)
            .map_err(|e| extraction_failed("Could not create file", e))?;
        io::copy(&mut entry, &mut extracted_file)
            .map_err(|e| extraction_failed("Could not write file", e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;

            fs::set_permissions(&extracted_path, fs::Permissions::from_mode(mode & 0o777))
                .map_err(|e| extraction_failed("Could not set permissions", e))?;
        }
    }

    Ok(())
}

/// Makes sure the archive unpacked into the directory we expect.
///
/// # Errors
///
/// - `bundle_path` does not exist or is not a directory
pub fn verify_layout(bundle_path: &Path) -> Result<()> {
    if bundle_path.is_dir() {
        Ok(())
    } else {
        Err(BootstrapError::extraction(format!(
            "expected extracted directory not found: {}",
            bundle_path.display()
        )))
    }
}

/// Whether the bundle ships a `plugins` directory. Informational only.
#[must_use]
pub fn has_plugins(bundle_path: &Path) -> bool {
    bundle_path.join(PLUGINS_DIR).is_dir()
}

fn extraction_failed(
    message: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> BootstrapError {
    BootstrapError::Extraction {
        message: message.to_owned(),
        source: Some(Box::new(source)),
    }
}
