//! The pinned release table.
//!
//! A [`ReleaseManifest`] lists every packaged upstream version together with
//! the download URL and SHA-256 checksum of each platform artifact. Releases
//! are only ever appended; an existing entry is never rewritten.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::checksum::Sha256Digest;
use crate::error::InstallError;
use crate::platform::PlatformKey;
use crate::runtime::Runtime;

/// The release table compiled into the installer.
const EMBEDDED_MANIFEST: &str = include_str!("releases.json");

/// One downloadable build of a release.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Artifact {
    #[serde(flatten)]
    pub platform: PlatformKey,
    pub url: String,
    pub sha256: Sha256Digest,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Release {
    pub version: String,
    pub artifacts: Vec<Artifact>,
}

impl Release {
    pub fn artifact(&self, platform: PlatformKey) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.platform == platform)
    }

    pub fn platforms(&self) -> impl Iterator<Item = PlatformKey> + '_ {
        self.artifacts.iter().map(|a| a.platform)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReleaseManifest {
    pub name: String,
    pub homepage: String,
    /// Name of the executable inside each artifact archive.
    pub binary: String,
    #[serde(default)]
    pub releases: Vec<Release>,
}

impl ReleaseManifest {
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_MANIFEST).context("Embedded release table is invalid")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: ReleaseManifest = serde_json::from_str(json)
            .map_err(|e| InstallError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        manifest.warn_duplicate_versions();
        Ok(manifest)
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        debug!("Loading release manifest from {:?}", path);
        let content = runtime.read_to_string(path)?;
        Self::from_json(&content).with_context(|| format!("Failed to load manifest {:?}", path))
    }

    /// Writes the manifest through a temporary file so a crash never leaves
    /// a truncated table behind.
    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        let tmp_path = path.with_extension("json.tmp");
        runtime.write(&tmp_path, json.as_bytes())?;
        runtime.rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), InstallError> {
        if self.binary.trim().is_empty() {
            return Err(InstallError::InvalidManifest(
                "binary name must not be empty".to_string(),
            ));
        }
        for release in &self.releases {
            validate_release(release)?;
        }
        Ok(())
    }

    /// Select a release by exact version, or the latest one when `version` is `None`.
    pub fn select(&self, version: Option<&str>) -> Result<&Release, InstallError> {
        match version {
            Some(v) => self.find(v),
            None => self.latest(),
        }
    }

    /// Find a release by version. A leading `v` is ignored on either side.
    ///
    /// Fails with [`InstallError::AmbiguousRelease`] when the table holds
    /// several different entries for the same version.
    pub fn find(&self, version: &str) -> Result<&Release, InstallError> {
        let matches: Vec<&Release> = self
            .releases
            .iter()
            .filter(|r| versions_match(&r.version, version))
            .collect();

        match matches.as_slice() {
            [] => Err(InstallError::ReleaseNotFound(version.to_string())),
            [first, rest @ ..] if rest.iter().all(|r| same_artifacts(r, first)) => Ok(*first),
            _ => Err(InstallError::AmbiguousRelease {
                version: version.to_string(),
                count: matches.len(),
            }),
        }
    }

    /// The highest version in the table. Non-semver versions rank below any
    /// semver one; among equal versions the later entry wins.
    pub fn latest(&self) -> Result<&Release, InstallError> {
        // max_by_key keeps the last of several equal maxima
        self.releases
            .iter()
            .max_by_key(|r| parse_version(&r.version))
            .ok_or_else(|| InstallError::ReleaseNotFound("latest".to_string()))
    }

    /// Append a release. Returns `Ok(false)` when an identical release is
    /// already present; a different release under the same version is refused.
    pub fn append(&mut self, release: Release) -> Result<bool, InstallError> {
        validate_release(&release)?;

        let existing: Vec<&Release> = self
            .releases
            .iter()
            .filter(|r| versions_match(&r.version, &release.version))
            .collect();

        if !existing.is_empty() {
            if existing.iter().all(|r| same_artifacts(r, &release)) {
                debug!("Release {} is already recorded", release.version);
                return Ok(false);
            }
            return Err(InstallError::ReleaseConflict(release.version));
        }

        self.releases.push(release);
        Ok(true)
    }

    fn warn_duplicate_versions(&self) {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for release in &self.releases {
            let v = release.version.strip_prefix('v').unwrap_or(&release.version);
            *counts.entry(v).or_default() += 1;
        }
        for (version, count) in counts.into_iter().filter(|(_, c)| *c > 1) {
            warn!(
                "Release {} appears {} times in the manifest; selecting it by version will fail if the entries differ",
                version, count
            );
        }
    }
}

fn validate_release(release: &Release) -> Result<(), InstallError> {
    if release.version.trim().is_empty() {
        return Err(InstallError::InvalidManifest(
            "release version must not be empty".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for artifact in &release.artifacts {
        if artifact.url.trim().is_empty() {
            return Err(InstallError::InvalidManifest(format!(
                "release {} has an empty URL for {}",
                release.version, artifact.platform
            )));
        }
        if !seen.insert(artifact.platform) {
            return Err(InstallError::InvalidManifest(format!(
                "release {} lists {} more than once",
                release.version, artifact.platform
            )));
        }
    }
    Ok(())
}

/// Artifact lists are compared irrespective of order.
fn same_artifacts(a: &Release, b: &Release) -> bool {
    a.artifacts.len() == b.artifacts.len()
        && a.artifacts.iter().all(|x| b.artifacts.contains(x))
}

fn versions_match(v1: &str, v2: &str) -> bool {
    let n1 = v1.strip_prefix('v').unwrap_or(v1);
    let n2 = v2.strip_prefix('v').unwrap_or(v2);
    n1 == n2
}

fn parse_version(v: &str) -> Option<semver::Version> {
    semver::Version::parse(v.strip_prefix('v').unwrap_or(v)).ok()
}
