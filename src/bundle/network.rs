use futures_util::StreamExt;
use std::path::Path;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::{
    error::{BootstrapError, Result},
    log::{connecting, download_complete, download_retry},
};

/// Streams the archive at `url` into `dest`, one chunk at a time.
///
/// # Errors
///
/// - Network unavailable, or the server answered with a non-2xx status
/// - Filesystem errors while writing (Out of space, Permissions)
pub async fn fetch(url: &str, dest: &Path) -> Result<()> {
    connecting(url);

    let response = reqwest::get(url)
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| BootstrapError::network(url, err))?;

    let mut file = File::create(dest)
        .await
        .map_err(|err| BootstrapError::network(url, err))?;
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| BootstrapError::network(url, err))?;
        file.write_all(&chunk)
            .await
            .map_err(|err| BootstrapError::network(url, err))?;
    }

    file.flush()
        .await
        .map_err(|err| BootstrapError::network(url, err))?;

    download_complete();

    Ok(())
}

/// Like [`fetch`], but tries again up to `retries` more times.
/// The error of the final attempt is returned.
///
/// # Errors
///
/// - Every attempt failed
pub async fn fetch_with_retries(url: &str, dest: &Path, retries: u32) -> Result<()> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        match fetch(url, dest).await {
            Ok(()) => return Ok(()),
            Err(err) if attempt <= retries => download_retry(attempt, retries, &err),
            Err(err) => return Err(err),
        }
    }
}
