use anyhow::{Context, Result};
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use std::path::PathBuf;

use crate::http::HttpClient;
use crate::manifest::ReleaseManifest;
use crate::runtime::Runtime;

pub const USER_AGENT: &str = "dbfsharp-installer";

/// Everything a command needs, resolved from flags, environment and defaults.
pub struct Config<R: Runtime> {
    pub runtime: R,
    /// Unauthenticated; used for artifact downloads.
    pub http_client: HttpClient,
    /// Carries `GITHUB_TOKEN`; only for GitHub API requests.
    pub api_client: HttpClient,
    pub manifest: ReleaseManifest,
    pub manifest_path: Option<PathBuf>,
    pub bin_dir: PathBuf,
    pub api_url: Option<String>,
}

impl<R: Runtime> Config<R> {
    pub fn new(
        runtime: R,
        manifest_path: Option<PathBuf>,
        bin_dir: Option<PathBuf>,
        api_url: Option<String>,
    ) -> Result<Self> {
        let http_client = HttpClient::new(build_client(None)?);
        let api_client = HttpClient::new(build_client(github_token(&runtime).as_deref())?);

        let manifest = match &manifest_path {
            Some(path) => ReleaseManifest::load(&runtime, path)?,
            None => ReleaseManifest::embedded()?,
        };

        let bin_dir = match bin_dir {
            Some(dir) => dir,
            None => default_bin_dir(&runtime)?,
        };
        debug!("Installing into {:?}", bin_dir);

        Ok(Self {
            runtime,
            http_client,
            api_client,
            manifest,
            manifest_path,
            bin_dir,
            api_url,
        })
    }
}

/// `$HOME/.local/bin`
pub fn default_bin_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home = runtime
        .home_dir()
        .context("Could not determine the home directory; pass --bin-dir")?;
    Ok(home.join(".local").join("bin"))
}

fn github_token<R: Runtime>(runtime: &R) -> Option<String> {
    runtime
        .env_var("GITHUB_TOKEN")
        .ok()
        .filter(|token| !token.is_empty())
}

fn build_client(token: Option<&str>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("GITHUB_TOKEN is not a valid HTTP header value")?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        debug!("Using GITHUB_TOKEN for authentication: {}", mask_token(token));
    }

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .context("Failed to build HTTP client")
}

fn mask_token(token: &str) -> String {
    const MASK: &str = "*********";
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return MASK.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, MASK, tail)
}
