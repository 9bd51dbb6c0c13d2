use log::debug;

use crate::error::InstallError;
use crate::manifest::{Artifact, Release};
use crate::platform::PlatformKey;

/// Pick the artifact of `release` built for `platform`.
///
/// Pure table lookup; nothing is fetched.
pub fn resolve(platform: PlatformKey, release: &Release) -> Result<&Artifact, InstallError> {
    let artifact =
        release
            .artifact(platform)
            .ok_or_else(|| InstallError::UnsupportedPlatform {
                platform: platform.to_string(),
                version: release.version.clone(),
            })?;

    debug!(
        "Resolved {} {} to {}",
        release.version, platform, artifact.url
    );
    Ok(artifact)
}
