use anyhow::{Result, anyhow};
use std::str::FromStr;

#[derive(Debug, PartialEq, Clone)]
pub struct GitHubRepo {
    pub owner: String,
    pub repo: String,
}

impl GitHubRepo {
    /// Extract the repository from a homepage such as
    /// `https://github.com/emmorts/dbfsharp` or `git@github.com:owner/repo.git`.
    pub fn from_homepage(homepage: &str) -> Result<Self> {
        let invalid = || anyhow!("Invalid GitHub repository URL: {}", homepage);

        let start = homepage.find("github.com").ok_or_else(invalid)? + "github.com".len();
        let rest = homepage[start..]
            .strip_prefix(['/', ':'])
            .ok_or_else(invalid)?
            .trim_end_matches('/');
        let rest = rest.strip_suffix(".git").unwrap_or(rest);

        rest.parse().map_err(|_| invalid())
    }
}

impl std::fmt::Display for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for GitHubRepo {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            Err(anyhow!("Invalid repository format. Expected 'owner/repo'."))
        } else {
            Ok(GitHubRepo {
                owner: parts[0].to_string(),
                repo: parts[1].to_string(),
            })
        }
    }
}
