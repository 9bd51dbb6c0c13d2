//! Handlers behind the CLI subcommands.

mod install;
mod list;
mod resolve;
mod smoke;
mod update_hashes;

pub use install::install;
pub use list::{format_releases, list};
pub use resolve::{resolve, target_platform};
pub use smoke::test;
pub use update_hashes::update_hashes;
