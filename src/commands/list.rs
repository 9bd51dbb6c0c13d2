use anyhow::Result;

use crate::config::Config;
use crate::manifest::ReleaseManifest;
use crate::runtime::Runtime;

/// One line per release: version followed by its platforms.
pub fn format_releases(manifest: &ReleaseManifest) -> Vec<String> {
    let width = manifest
        .releases
        .iter()
        .map(|r| r.version.len())
        .max()
        .unwrap_or(0);

    manifest
        .releases
        .iter()
        .map(|release| {
            let platforms: Vec<String> = release.platforms().map(|p| p.to_string()).collect();
            format!(
                "{:<width$}  {}",
                release.version,
                platforms.join(", "),
                width = width
            )
        })
        .collect()
}

/// List the releases in the table
#[tracing::instrument(skip(config))]
pub fn list<R: Runtime>(config: &Config<R>) -> Result<()> {
    let lines = format_releases(&config.manifest);
    if lines.is_empty() {
        println!("No releases defined.");
        return Ok(());
    }
    for line in lines {
        println!("{} {}", config.manifest.name, line);
    }
    Ok(())
}
