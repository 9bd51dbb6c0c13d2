use crate::error::InstallError;

use super::{Arch, Os, PlatformKey};

/// Trait for platform detection (useful for testing)
#[cfg_attr(test, mockall::automock)]
pub trait PlatformDetector: Send + Sync {
    fn detect(&self) -> Result<PlatformKey, InstallError>;
}

/// Detects the platform this binary was compiled for.
pub struct HostPlatformDetector;

impl PlatformDetector for HostPlatformDetector {
    fn detect(&self) -> Result<PlatformKey, InstallError> {
        from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }
}

/// Maps Rust's `std::env::consts` names onto a [`PlatformKey`].
pub(crate) fn from_parts(os: &str, arch: &str) -> Result<PlatformKey, InstallError> {
    let unsupported = || InstallError::UnsupportedHost {
        os: os.to_string(),
        arch: arch.to_string(),
    };

    let os_key = match os {
        "macos" => Os::Macos,
        "linux" => Os::Linux,
        "windows" => Os::Windows,
        _ => return Err(unsupported()),
    };
    let arch_key = match arch {
        "aarch64" => Arch::Arm64,
        "x86_64" => Arch::X64,
        _ => return Err(unsupported()),
    };

    Ok(PlatformKey::new(os_key, arch_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_detect() {
        #[allow(unused_variables)]
        let result = HostPlatformDetector.detect();

        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert_eq!(result.unwrap(), PlatformKey::new(Os::Linux, Arch::X64));

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        assert_eq!(result.unwrap(), PlatformKey::new(Os::Macos, Arch::Arm64));

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        assert!(result.is_err());
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            from_parts("macos", "x86_64").unwrap(),
            PlatformKey::new(Os::Macos, Arch::X64)
        );
        assert_eq!(
            from_parts("windows", "x86_64").unwrap(),
            PlatformKey::new(Os::Windows, Arch::X64)
        );
    }

    #[test]
    fn test_from_parts_unsupported_host() {
        let err = from_parts("freebsd", "x86_64").unwrap_err();
        assert!(matches!(err, InstallError::UnsupportedHost { ref os, .. } if os == "freebsd"));

        let err = from_parts("linux", "riscv64").unwrap_err();
        assert!(matches!(err, InstallError::UnsupportedHost { ref arch, .. } if arch == "riscv64"));
    }
}
