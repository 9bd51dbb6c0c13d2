//! Download → verify → place pipeline for a single artifact.
//!
//! Everything happens inside a private staging directory within the
//! destination. The destination itself is only touched by the final rename,
//! so a failed run leaves at most the binary that was there before.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::archive::ArchiveExtractor;
use crate::checksum::Sha256Digest;
use crate::cleanup::{CleanupGuard, SharedCleanupContext, new_shared};
use crate::download::download_file;
use crate::error::InstallError;
use crate::http::HttpClient;
use crate::runtime::Runtime;

const EXECUTABLE_MODE: u32 = 0o755;

pub struct Installer<R: Runtime, E: ArchiveExtractor> {
    runtime: R,
    http_client: HttpClient,
    extractor: E,
    binary: String,
    cleanup_ctx: SharedCleanupContext,
}

impl<R: Runtime + 'static, E: ArchiveExtractor> Installer<R, E> {
    /// `binary` is the file name of the executable inside the archive; it
    /// is installed under the same name.
    pub fn new(runtime: R, http_client: HttpClient, extractor: E, binary: &str) -> Self {
        Self {
            runtime,
            http_client,
            extractor,
            binary: binary.to_string(),
            cleanup_ctx: new_shared(),
        }
    }

    /// Share a cleanup context with an interrupt watcher.
    pub fn with_cleanup_context(mut self, ctx: SharedCleanupContext) -> Self {
        self.cleanup_ctx = ctx;
        self
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Where `install` places the executable inside `dest_dir`.
    pub fn target_path(&self, dest_dir: &Path) -> PathBuf {
        dest_dir.join(&self.binary)
    }

    /// Download `url`, check it against `expected`, and place the executable
    /// at `dest_dir/<binary>` with mode 0755. Returns the installed path.
    #[tracing::instrument(skip(self, expected))]
    pub async fn install(
        &self,
        url: &str,
        expected: &Sha256Digest,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        self.runtime
            .create_dir_all(dest_dir)
            .map_err(|e| InstallError::install_io(dest_dir, e))?;

        let staging = dest_dir.join(format!(".{}-staging", self.binary));
        if self.runtime.exists(&staging) {
            debug!("Removing stale staging directory {:?}", staging);
            self.runtime
                .remove_dir_all(&staging)
                .map_err(|e| InstallError::install_io(&staging, e))?;
        }
        self.runtime
            .create_dir_all(&staging)
            .map_err(|e| InstallError::install_io(&staging, e))?;
        let guard = CleanupGuard::new(self.cleanup_ctx.clone(), staging.clone());

        let result = self.install_staged(url, expected, dest_dir, &staging).await;

        if let Err(e) = self.runtime.remove_dir_all(&staging) {
            warn!("Failed to remove staging directory {:?}: {}", staging, e);
        }
        guard.disarm();

        let target = result?;
        info!("Installed {:?}", target);
        Ok(target)
    }

    async fn install_staged(
        &self,
        url: &str,
        expected: &Sha256Digest,
        dest_dir: &Path,
        staging: &Path,
    ) -> Result<PathBuf> {
        let archive_path = staging.join(archive_file_name(url));
        let actual = download_file(&self.runtime, url, &archive_path, &self.http_client).await?;

        if &actual != expected {
            return Err(InstallError::ChecksumMismatch {
                url: url.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }
            .into());
        }
        debug!("Checksum verified: {}", actual);

        let unpacked = staging.join("unpacked");
        self.runtime
            .create_dir_all(&unpacked)
            .map_err(|e| InstallError::install_io(&unpacked, e))?;
        self.extractor
            .extract(&self.runtime, &archive_path, &unpacked)
            .map_err(|e| InstallError::install_io(&archive_path, e))?;

        let source = find_binary(&self.runtime, &unpacked, &self.binary)?.ok_or_else(|| {
            InstallError::BinaryNotFound {
                binary: self.binary.clone(),
            }
        })?;
        debug!("Found executable at {:?}", source);

        self.place(&source, dest_dir)
    }

    /// Copy next to the target, make it executable, then rename over the
    /// target so the swap is atomic.
    fn place(&self, source: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let target = self.target_path(dest_dir);
        let partial = dest_dir.join(format!(".{}.partial", self.binary));

        let guard = CleanupGuard::new(self.cleanup_ctx.clone(), partial.clone());
        let staged = self
            .runtime
            .copy(source, &partial)
            .and_then(|_| self.runtime.set_permissions(&partial, EXECUTABLE_MODE))
            .and_then(|_| self.runtime.rename(&partial, &target));

        if let Err(e) = staged {
            if self.runtime.exists(&partial)
                && let Err(remove_err) = self.runtime.remove_file(&partial)
            {
                warn!("Failed to remove {:?}: {}", partial, remove_err);
            }
            guard.disarm();
            return Err(InstallError::install_io(&target, e).into());
        }
        guard.disarm();

        Ok(target)
    }
}

/// Last path segment of the URL, which keeps the archive extension the
/// extractor dispatches on.
fn archive_file_name(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("artifact")
        .to_string()
}

/// Search `dir` for a regular file named `name`, shallowest match first.
fn find_binary<R: Runtime>(runtime: &R, dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    let entries = runtime
        .read_dir(dir)
        .with_context(|| format!("Failed to read extracted files in {:?}", dir))?;

    let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|p| runtime.is_dir(p));

    if let Some(found) = files
        .into_iter()
        .find(|p| p.file_name().is_some_and(|f| f == name))
    {
        return Ok(Some(found));
    }

    for sub in dirs {
        if let Some(found) = find_binary(runtime, &sub, name)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}
