use log::{debug, warn};
use std::path::Path;

use crate::runtime::Runtime;

/// Argument the installed executable is launched with.
pub const SMOKE_TEST_ARG: &str = "--help";

/// Launch `binary --help` and report whether it exited with status 0.
///
/// Only proves the binary starts on this machine; its behaviour is not
/// checked.
#[tracing::instrument(skip(runtime))]
pub fn self_test<R: Runtime>(runtime: &R, binary: &Path) -> bool {
    match runtime.run_status(binary, &[SMOKE_TEST_ARG.to_string()]) {
        Ok(Some(0)) => {
            debug!("Smoke test passed for {:?}", binary);
            true
        }
        Ok(Some(code)) => {
            warn!("{:?} {} exited with status {}", binary, SMOKE_TEST_ARG, code);
            false
        }
        Ok(None) => {
            warn!("{:?} {} was terminated by a signal", binary, SMOKE_TEST_ARG);
            false
        }
        Err(e) => {
            warn!("Could not run {:?}: {:#}", binary, e);
            false
        }
    }
}
