//! Record a published release in a manifest file.
//!
//! Each platform archive attached to the GitHub release is downloaded once
//! and hashed in memory; the resulting entry is appended to the table.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::Path;

use crate::archive::{ArchiveExtractor, ArchiveExtractorImpl};
use crate::checksum::{HashingWriter, Sha256Digest};
use crate::config::Config;
use crate::error::InstallError;
use crate::github::{GetReleases, GitHubRepo, Release as GitHubRelease, ReleaseAsset};
use crate::http::{HttpClient, HttpStatusError};
use crate::manifest::{Artifact, Release};
use crate::platform::{Os, PlatformKey, classify_asset_name};
use crate::runtime::Runtime;

#[tracing::instrument(skip(config, github))]
pub async fn update_hashes<R: Runtime, G: GetReleases>(
    config: Config<R>,
    github: &G,
    version: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let Config {
        runtime,
        http_client,
        mut manifest,
        manifest_path,
        ..
    } = config;
    let manifest_path = manifest_path
        .ok_or_else(|| anyhow!("update-hashes needs a writable table; pass --manifest"))?;

    let repo = GitHubRepo::from_homepage(&manifest.homepage)
        .map_err(|e| InstallError::InvalidManifest(e.to_string()))?;
    // Without a version, re-check the newest release already in the table
    let version = version.or_else(|| manifest.latest().ok().map(|r| r.version.as_str()));
    let gh_release = fetch_release(github, &repo, version).await?;
    info!("Found release {} of {}", gh_release.tag_name, repo);

    let assets = platform_assets(&gh_release.assets);
    if assets.is_empty() {
        let names: Vec<&str> = gh_release.assets.iter().map(|a| a.name.as_str()).collect();
        bail!(
            "No platform archives found in release {}. Available assets: {}",
            gh_release.tag_name,
            names.join(", ")
        );
    }

    println!("Release {}:", gh_release.version());
    for (platform, asset) in &assets {
        println!("  {:<12} {}", platform.to_string(), asset.name);
    }
    if dry_run {
        println!("Dry run: manifest left unchanged.");
        return Ok(());
    }

    let mut artifacts = Vec::with_capacity(assets.len());
    for (platform, asset) in assets {
        match hash_remote(&http_client, &asset.browser_download_url).await {
            Ok(sha256) => {
                debug!("{}: {}", asset.name, sha256);
                artifacts.push(Artifact {
                    platform,
                    url: asset.browser_download_url.clone(),
                    sha256,
                });
            }
            Err(e) => warn!("Skipping {}: {:#}", asset.name, e),
        }
    }
    if artifacts.is_empty() {
        bail!("No assets of release {} could be hashed", gh_release.tag_name);
    }

    let release = Release {
        version: gh_release.version().to_string(),
        artifacts,
    };
    let count = release.artifacts.len();
    if manifest.append(release)? {
        manifest.save(&runtime, &manifest_path)?;
        println!(
            "Recorded {} {} ({} artifacts) in {}",
            manifest.name,
            gh_release.version(),
            count,
            manifest_path.display()
        );
    } else {
        println!(
            "{} {} is already recorded in {}",
            manifest.name,
            gh_release.version(),
            manifest_path.display()
        );
    }
    Ok(())
}

/// Tags are tried as `v<version>` first, then verbatim. Without a version
/// the release GitHub marks as latest is used.
async fn fetch_release<G: GetReleases>(
    github: &G,
    repo: &GitHubRepo,
    version: Option<&str>,
) -> Result<GitHubRelease> {
    let Some(version) = version else {
        return github.get_latest_release(repo).await.map_err(|e| {
            if e.downcast_ref::<HttpStatusError>() == Some(&HttpStatusError::NotFound) {
                InstallError::ReleaseNotFound("latest".to_string()).into()
            } else {
                e
            }
        });
    };

    let bare = version.strip_prefix('v').unwrap_or(version);
    for tag in [format!("v{}", bare), bare.to_string()] {
        if let Some(release) = github.get_release_by_tag(repo, &tag).await? {
            return Ok(release);
        }
        debug!("No release tagged {}", tag);
    }
    Err(InstallError::ReleaseNotFound(version.to_string()).into())
}

/// Archives that name a macOS or Linux platform, one per platform, in
/// asset order. Windows builds are never recorded.
fn platform_assets(assets: &[ReleaseAsset]) -> Vec<(PlatformKey, &ReleaseAsset)> {
    let extractor = ArchiveExtractorImpl::new();
    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for asset in assets {
        if !extractor.can_handle(Path::new(&asset.name)) {
            continue;
        }
        let Some(platform) = classify_asset_name(&asset.name) else {
            continue;
        };
        if platform.os == Os::Windows {
            debug!("Ignoring {}: Windows builds are not installable", asset.name);
            continue;
        }
        if seen.insert(platform) {
            selected.push((platform, asset));
        } else {
            warn!("Ignoring {}: another archive already covers {}", asset.name, platform);
        }
    }
    selected
}

async fn hash_remote(http_client: &HttpClient, url: &str) -> Result<Sha256Digest> {
    let (writer, bytes) = http_client
        .download(url, || Ok(HashingWriter::new(std::io::sink())))
        .await?;
    debug!("Hashed {} bytes from {}", bytes, url);
    writer.finish().context("Failed to hash download")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::MockGetReleases;
    use crate::manifest::ReleaseManifest;
    use crate::platform::Arch;
    use crate::runtime::MockRuntime;
    use mockall::predicate::{always, eq};
    use reqwest::Client;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn asset(name: &str, base_url: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            size: 11,
            browser_download_url: format!("{}/v0.2.9/{}", base_url, name),
        }
    }

    fn gh_release(tag: &str, assets: Vec<ReleaseAsset>) -> GitHubRelease {
        GitHubRelease {
            tag_name: tag.to_string(),
            published_at: None,
            assets,
        }
    }

    fn config(runtime: MockRuntime, manifest_path: Option<&str>) -> Config<MockRuntime> {
        Config {
            runtime,
            http_client: HttpClient::new(Client::new()),
            api_client: HttpClient::new(Client::new()),
            manifest: ReleaseManifest::embedded().unwrap(),
            manifest_path: manifest_path.map(PathBuf::from),
            bin_dir: PathBuf::from("/opt/bin"),
            api_url: None,
        }
    }

    #[test]
    fn test_platform_assets_filters_and_dedups() {
        let assets = vec![
            asset("dbfsharp-linux-x64.tar.gz", "https://x"),
            asset("dbfsharp-linux-x64.zip", "https://x"),
            asset("dbfsharp-osx-arm64.tar.gz", "https://x"),
            asset("dbfsharp-linux-x64.tar.gz.sha256", "https://x"),
            asset("checksums.txt", "https://x"),
            asset("dbfsharp-win-x64.zip", "https://x"),
        ];
        let selected: Vec<_> = platform_assets(&assets)
            .into_iter()
            .map(|(p, a)| (p, a.name.as_str()))
            .collect();
        assert_eq!(
            selected,
            [
                (PlatformKey::new(Os::Linux, Arch::X64), "dbfsharp-linux-x64.tar.gz"),
                (PlatformKey::new(Os::Macos, Arch::Arm64), "dbfsharp-osx-arm64.tar.gz"),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_release_falls_back_to_bare_tag() {
        let mut github = MockGetReleases::new();
        github
            .expect_get_release_by_tag()
            .with(always(), eq("v0.2.9"))
            .times(1)
            .returning(|_, _| Ok(None));
        github
            .expect_get_release_by_tag()
            .with(always(), eq("0.2.9"))
            .times(1)
            .returning(|_, _| Ok(Some(gh_release("0.2.9", vec![]))));

        let repo: GitHubRepo = "emmorts/dbfsharp".parse().unwrap();
        let release = fetch_release(&github, &repo, Some("v0.2.9")).await.unwrap();
        assert_eq!(release.tag_name, "0.2.9");
    }

    #[tokio::test]
    async fn test_fetch_release_not_found() {
        let mut github = MockGetReleases::new();
        github
            .expect_get_release_by_tag()
            .times(2)
            .returning(|_, _| Ok(None));

        let repo: GitHubRepo = "emmorts/dbfsharp".parse().unwrap();
        let err = fetch_release(&github, &repo, Some("9.9.9")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::ReleaseNotFound(v)) if v == "9.9.9"
        ));
    }

    #[tokio::test]
    async fn test_update_hashes_requires_manifest_path() {
        let github = MockGetReleases::new();
        let err = update_hashes(config(MockRuntime::new(), None), &github, None, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--manifest"));
    }

    #[tokio::test]
    async fn test_fetch_release_latest_not_found() {
        let mut github = MockGetReleases::new();
        github
            .expect_get_latest_release()
            .times(1)
            .returning(|_| Err(anyhow::Error::new(HttpStatusError::NotFound)));

        let repo: GitHubRepo = "emmorts/dbfsharp".parse().unwrap();
        let err = fetch_release(&github, &repo, None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::ReleaseNotFound(v)) if v == "latest"
        ));
    }

    #[tokio::test]
    async fn test_fetch_release_latest_other_errors_pass_through() {
        let mut github = MockGetReleases::new();
        github
            .expect_get_latest_release()
            .returning(|_| Err(anyhow::Error::new(HttpStatusError::RateLimitExceeded)));

        let repo: GitHubRepo = "emmorts/dbfsharp".parse().unwrap();
        let err = fetch_release(&github, &repo, None).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<HttpStatusError>(),
            Some(&HttpStatusError::RateLimitExceeded)
        );
    }

    #[tokio::test]
    async fn test_update_hashes_defaults_to_table_version() {
        let mut github = MockGetReleases::new();
        github.expect_get_latest_release().never();
        github
            .expect_get_release_by_tag()
            .with(always(), eq("v0.2.3"))
            .times(1)
            .returning(|_, _| {
                Ok(Some(gh_release(
                    "v0.2.3",
                    vec![asset("dbfsharp-linux-x64.tar.gz", "https://example.invalid")],
                )))
            });

        // Dry run, so nothing is downloaded or written
        let config = config(MockRuntime::new(), Some("/work/releases.json"));
        update_hashes(config, &github, None, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_hashes_empty_table_uses_github_latest() {
        let mut github = MockGetReleases::new();
        github
            .expect_get_latest_release()
            .times(1)
            .returning(|_| {
                Ok(gh_release(
                    "v0.2.9",
                    vec![asset("dbfsharp-linux-x64.tar.gz", "https://example.invalid")],
                ))
            });

        let mut config = config(MockRuntime::new(), Some("/work/releases.json"));
        config.manifest.releases.clear();
        update_hashes(config, &github, None, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_hashes_dry_run_writes_nothing() {
        let mut github = MockGetReleases::new();
        github
            .expect_get_release_by_tag()
            .with(always(), eq("v0.2.9"))
            .times(1)
            .returning(|_, _| {
                Ok(Some(gh_release(
                    "v0.2.9",
                    vec![asset("dbfsharp-linux-x64.tar.gz", "https://example.invalid")],
                )))
            });

        // No runtime expectations: a dry run touches no files
        let config = config(MockRuntime::new(), Some("/work/releases.json"));
        update_hashes(config, &github, Some("0.2.9"), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_hashes_only_windows_assets_is_an_error() {
        let mut github = MockGetReleases::new();
        github.expect_get_release_by_tag().returning(|_, _| {
            Ok(Some(gh_release(
                "v0.2.9",
                vec![asset("dbfsharp-win-x64.zip", "https://example.invalid")],
            )))
        });

        let config = config(MockRuntime::new(), Some("/work/releases.json"));
        let err = update_hashes(config, &github, Some("0.2.9"), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dbfsharp-win-x64.zip"));
    }

    #[tokio::test]
    async fn test_update_hashes_without_platform_assets() {
        let mut github = MockGetReleases::new();
        github.expect_get_release_by_tag().returning(|_, _| {
            Ok(Some(gh_release(
                "v0.2.9",
                vec![asset("checksums.txt", "https://example.invalid")],
            )))
        });

        let config = config(MockRuntime::new(), Some("/work/releases.json"));
        let err = update_hashes(config, &github, Some("0.2.9"), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("checksums.txt"));
    }

    #[test_log::test(tokio::test)]
    async fn test_update_hashes_appends_and_saves() {
        let mut server = mockito::Server::new_async().await;
        let base_url = server.url();
        let linux = server
            .mock("GET", "/v0.2.9/dbfsharp-linux-x64.tar.gz")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;
        let _mac = server
            .mock("GET", "/v0.2.9/dbfsharp-osx-arm64.tar.gz")
            .with_status(500)
            .create_async()
            .await;

        let assets = vec![
            asset("dbfsharp-linux-x64.tar.gz", &base_url),
            asset("dbfsharp-osx-arm64.tar.gz", &base_url),
        ];
        let mut github = MockGetReleases::new();
        github
            .expect_get_release_by_tag()
            .with(always(), eq("v0.2.9"))
            .returning(move |_, _| Ok(Some(gh_release("v0.2.9", assets.clone()))));

        let written = Arc::new(Mutex::new(String::new()));
        let written_clone = Arc::clone(&written);
        let mut runtime = MockRuntime::new();
        runtime
            .expect_write()
            .with(eq(PathBuf::from("/work/releases.json.tmp")), always())
            .times(1)
            .returning(move |_, contents| {
                *written_clone.lock().unwrap() = String::from_utf8(contents.to_vec()).unwrap();
                Ok(())
            });
        runtime
            .expect_rename()
            .with(
                eq(PathBuf::from("/work/releases.json.tmp")),
                eq(PathBuf::from("/work/releases.json")),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let config = config(runtime, Some("/work/releases.json"));
        update_hashes(config, &github, Some("0.2.9"), false)
            .await
            .unwrap();

        linux.assert_async().await;
        let saved = ReleaseManifest::from_json(&written.lock().unwrap()).unwrap();
        let release = saved.find("0.2.9").unwrap();
        // The failing asset is skipped, the rest is recorded
        assert_eq!(release.artifacts.len(), 1);
        let artifact = release
            .artifact(PlatformKey::new(Os::Linux, Arch::X64))
            .unwrap();
        assert_eq!(artifact.sha256.as_str(), HELLO_SHA256);
        // Existing releases are kept
        assert!(saved.find("0.2.3").is_ok());
    }

    #[tokio::test]
    async fn test_update_hashes_existing_release_is_not_rewritten() {
        let embedded = ReleaseManifest::embedded().unwrap();
        let existing = embedded.find("0.2.3").unwrap().clone();

        let mut server = mockito::Server::new_async().await;
        let base_url = server.url();
        // Serve bodies whose hashes differ from the recorded ones
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body("rebuilt")
            .create_async()
            .await;

        let assets: Vec<ReleaseAsset> = existing
            .artifacts
            .iter()
            .map(|a| {
                let name = a.url.rsplit('/').next().unwrap().to_string();
                ReleaseAsset {
                    browser_download_url: format!("{}/{}", base_url, name),
                    name,
                    size: 0,
                }
            })
            .collect();
        let mut github = MockGetReleases::new();
        github
            .expect_get_release_by_tag()
            .returning(move |_, _| Ok(Some(gh_release("v0.2.3", assets.clone()))));

        // No write expectations: the table must not be touched
        let config = config(MockRuntime::new(), Some("/work/releases.json"));
        let err = update_hashes(config, &github, Some("0.2.3"), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::ReleaseConflict(_))
        ));
    }
}
