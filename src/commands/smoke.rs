use anyhow::{Result, bail};

use crate::config::Config;
use crate::error::InstallError;
use crate::runtime::Runtime;
use crate::selftest::self_test;

/// Smoke-test the executable already installed in the bin directory.
#[tracing::instrument(skip(config))]
pub fn test<R: Runtime>(config: &Config<R>) -> Result<()> {
    let binary = config.bin_dir.join(&config.manifest.binary);
    if !config.runtime.exists(&binary) {
        bail!(
            "{} is not installed at {}",
            config.manifest.name,
            binary.display()
        );
    }

    if !self_test(&config.runtime, &binary) {
        return Err(InstallError::SelfTestFailed(binary).into());
    }
    println!("{} --help exited successfully", binary.display());
    Ok(())
}
