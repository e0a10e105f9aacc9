use std::{io, path::PathBuf};

use thiserror::Error;

/// Everything that can stop a launch.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Could not prepare staging directory {}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not download {url}")]
    Network {
        url: String,
        #[source]
        source: NetworkCause,
    },

    #[error("Could not extract bundle: {message}")]
    Extraction {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Only ever logged. The overlay stage never aborts a run.
    #[error("Could not apply local settings to {}", .path.display())]
    Overlay {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot start bundle: {0}")]
    Precondition(String),

    #[error("Bundle failed to start")]
    Spawn(#[source] io::Error),
}

/// The underlying reason a download failed.
#[derive(Error, Debug)]
pub enum NetworkCause {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Could not write archive to disk")]
    Write(#[from] io::Error),
}

impl BootstrapError {
    pub(crate) fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn network(url: &str, source: impl Into<NetworkCause>) -> Self {
        Self::Network {
            url: url.to_owned(),
            source: source.into(),
        }
    }
}

pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;
