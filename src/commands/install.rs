use anyhow::Result;
use log::{info, warn};

use crate::archive::ArchiveExtractor;
use crate::cleanup::{new_shared, watch_interrupt};
use crate::config::Config;
use crate::error::InstallError;
use crate::install::Installer;
use crate::platform::PlatformDetector;
use crate::resolver;
use crate::runtime::Runtime;
use crate::selftest::self_test;

/// Resolve the artifact for this host, install it into the configured bin
/// directory and, unless `skip_test` is set, smoke-test the result.
///
/// A binary that fails the smoke test is removed again.
#[tracing::instrument(skip(config, detector, extractor))]
pub async fn install<R: Runtime + 'static, D: PlatformDetector, E: ArchiveExtractor>(
    config: Config<R>,
    detector: &D,
    extractor: E,
    version: Option<&str>,
    skip_test: bool,
) -> Result<()> {
    let platform = detector.detect()?;
    let release = config.manifest.select(version)?;
    let artifact = resolver::resolve(platform, release)?.clone();
    let version = release.version.clone();
    info!(
        "Installing {} {} ({}) into {:?}",
        config.manifest.name, version, platform, config.bin_dir
    );

    let cleanup_ctx = new_shared();
    let interrupt_handle = watch_interrupt(cleanup_ctx.clone());

    let installer = Installer::new(
        config.runtime,
        config.http_client,
        extractor,
        &config.manifest.binary,
    )
    .with_cleanup_context(cleanup_ctx);
    let result = installer
        .install(&artifact.url, &artifact.sha256, &config.bin_dir)
        .await;

    interrupt_handle.abort();
    let installed = result?;

    if skip_test {
        warn!("Skipping smoke test for {:?}", installed);
    } else if !self_test(installer.runtime(), &installed) {
        if let Err(e) = installer.runtime().remove_file(&installed) {
            warn!("Failed to remove {:?}: {}", installed, e);
        }
        return Err(InstallError::SelfTestFailed(installed).into());
    }

    println!(
        "Installed {} {} ({}) to {}",
        config.manifest.name,
        version,
        platform,
        installed.display()
    );
    Ok(())
}
