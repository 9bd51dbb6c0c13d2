use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds of the resolve → download → verify → place → smoke-test
/// pipeline. Every one of them aborts the whole operation.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("No artifact for platform {platform} in release {version}")]
    UnsupportedPlatform { platform: String, version: String },

    #[error("Unsupported host platform: os={os}, arch={arch}")]
    UnsupportedHost { os: String, arch: String },

    #[error("Release {0} not found")]
    ReleaseNotFound(String),

    #[error(
        "Release {version} is defined {count} times with different artifacts; \
         refusing to guess which one is authoritative"
    )]
    AmbiguousRelease { version: String, count: usize },

    #[error("Failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to install into {path:?}")]
    InstallIo {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Executable '{binary}' not found in the downloaded archive")]
    BinaryNotFound { binary: String },

    #[error("Smoke test failed: {0:?} --help did not exit successfully")]
    SelfTestFailed(PathBuf),

    #[error("Invalid SHA-256 checksum '{0}': expected 64 hexadecimal characters")]
    InvalidChecksum(String),

    #[error("Invalid release manifest: {0}")]
    InvalidManifest(String),

    #[error("Release {0} already exists with different checksums; releases are immutable")]
    ReleaseConflict(String),
}

impl InstallError {
    pub(crate) fn download(url: &str, source: impl Into<anyhow::Error>) -> Self {
        InstallError::Download {
            url: url.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn install_io(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        InstallError::InstallIo {
            path: path.into(),
            source: source.into(),
        }
    }
}
