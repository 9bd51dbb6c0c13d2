use crate::checksum::{HashingWriter, Sha256Digest};
use crate::error::InstallError;
use crate::http::HttpClient;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// Downloads `url` to `dest_path` and returns the SHA-256 of the bytes written.
///
/// Any network, HTTP or write failure is reported as [`InstallError::Download`].
#[tracing::instrument(skip(runtime, dest_path, http_client))]
pub async fn download_file<R: Runtime>(
    runtime: &R,
    url: &str,
    dest_path: &Path,
    http_client: &HttpClient,
) -> Result<Sha256Digest> {
    info!("Downloading {}...", url);

    let fetch = async {
        let (writer, bytes) = http_client
            .download(url, || {
                let file = runtime
                    .create_file(dest_path)
                    .with_context(|| format!("Failed to create download file at {:?}", dest_path))?;
                Ok(HashingWriter::new(file))
            })
            .await?;
        let digest = writer
            .finish()
            .context("Failed to flush downloaded file")?;
        Ok::<_, anyhow::Error>((digest, bytes))
    };

    let (digest, bytes) = fetch
        .await
        .map_err(|e| InstallError::download(url, e))?;

    info!("Download complete ({} bytes, sha256 {}).", bytes, digest);
    Ok(digest)
}
