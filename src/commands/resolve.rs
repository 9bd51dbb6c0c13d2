use anyhow::Result;

use crate::config::Config;
use crate::platform::{Arch, Os, PlatformDetector, PlatformKey};
use crate::resolver;
use crate::runtime::Runtime;

/// The platform to resolve for: explicit `os`/`arch` override the detected
/// host values. Detection is skipped when both are given.
pub fn target_platform<D: PlatformDetector>(
    detector: &D,
    os: Option<Os>,
    arch: Option<Arch>,
) -> Result<PlatformKey> {
    if let (Some(os), Some(arch)) = (os, arch) {
        return Ok(PlatformKey::new(os, arch));
    }
    let host = detector.detect()?;
    Ok(PlatformKey::new(os.unwrap_or(host.os), arch.unwrap_or(host.arch)))
}

/// Print the artifact URL and checksum for a platform.
#[tracing::instrument(skip(config, detector))]
pub fn resolve<R: Runtime, D: PlatformDetector>(
    config: &Config<R>,
    detector: &D,
    version: Option<&str>,
    os: Option<Os>,
    arch: Option<Arch>,
) -> Result<()> {
    let platform = target_platform(detector, os, arch)?;
    let release = config.manifest.select(version)?;
    let artifact = resolver::resolve(platform, release)?;

    println!("{} {} {}", config.manifest.name, release.version, platform);
    println!("url:    {}", artifact.url);
    println!("sha256: {}", artifact.sha256);
    Ok(())
}
