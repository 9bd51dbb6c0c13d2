//! Platform keys and host detection
//!
//! A [`PlatformKey`] is the (OS, architecture) pair used to look up the
//! artifact of a release. This module can detect the key of the running
//! host and classify release asset names into keys.

mod classify;
mod detection;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use classify::classify_asset_name;
pub use detection::{HostPlatformDetector, PlatformDetector};
#[cfg(test)]
pub use detection::MockPlatformDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Macos,
    Linux,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Arm64,
    X64,
}

/// The lookup key of a release artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformKey {
    pub os: Os,
    pub arch: Arch,
}

impl PlatformKey {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Macos => "macos",
            Os::Linux => "linux",
            Os::Windows => "windows",
        }
    }
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Arm64 => "arm64",
            Arch::X64 => "x64",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for Os {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "osx" | "darwin" => Ok(Os::Macos),
            "linux" => Ok(Os::Linux),
            "windows" | "win" => Ok(Os::Windows),
            other => Err(anyhow!(
                "Unknown operating system '{}'. Expected macos, linux or windows.",
                other
            )),
        }
    }
}

impl FromStr for Arch {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "x64" | "x86_64" | "amd64" => Ok(Arch::X64),
            other => Err(anyhow!(
                "Unknown architecture '{}'. Expected arm64 or x64.",
                other
            )),
        }
    }
}

/// Parses `"<os>-<arch>"`, e.g. `linux-x64`.
impl FromStr for PlatformKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .split_once('-')
            .ok_or_else(|| anyhow!("Invalid platform '{}'. Expected '<os>-<arch>'.", s))?;
        Ok(PlatformKey::new(os.parse()?, arch.parse()?))
    }
}
