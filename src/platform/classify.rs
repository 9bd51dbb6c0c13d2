use super::{Arch, Os, PlatformKey};

/// Guess the platform a release asset was built for from its file name.
///
/// Returns `None` when either the OS or the architecture cannot be told
/// from the name (checksum files, source tarballs, 32-bit builds...).
pub fn classify_asset_name(name: &str) -> Option<PlatformKey> {
    let name = name.to_lowercase();

    // darwin contains "win", so the macOS markers must be checked first
    let os = if ["osx", "macos", "darwin"].iter().any(|p| name.contains(p)) {
        Os::Macos
    } else if name.contains("linux") {
        Os::Linux
    } else if name.contains("win") {
        Os::Windows
    } else {
        return None;
    };

    let arch = if name.contains("arm64") || name.contains("aarch64") {
        Arch::Arm64
    } else if ["x64", "x86_64", "amd64"].iter().any(|p| name.contains(p)) {
        Arch::X64
    } else {
        return None;
    };

    Some(PlatformKey::new(os, arch))
}
