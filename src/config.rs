use failure::{Error, ResultExt};
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub github: GitHubConfig,
}

impl Config {
    /// Load a `Config` from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let path = path.as_ref();
        debug!("Loading config from {}", path.display());

        let contents = fs::read_to_string(path)
            .with_context(|_| format!("Unable to read {}", path.display()))?;

        Config::from_toml(&contents)
    }

    pub fn from_toml(src: &str) -> Result<Config, Error> {
        let cfg = toml::from_str(src).context("Invalid config")?;
        Ok(cfg)
    }

    /// An example config, populated with the defaults.
    pub fn example() -> Config {
        Config::default()
    }

    pub fn as_toml(&self) -> String {
        match toml::to_string_pretty(self) {
            Ok(s) => s,
            Err(_) => unreachable!("The config is always serializable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct General {
    /// The top-level directory archives are saved to. Each user gets their
    /// own sub-directory.
    pub dest_dir: PathBuf,
    /// How long to pause between repositories, in milliseconds.
    pub delay_ms: u64,
    /// The size of each chunk read from an archive download.
    pub chunk_size: usize,
}

impl General {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for General {
    fn default() -> General {
        General {
            dest_dir: PathBuf::from("."),
            delay_ms: 500,
            chunk_size: 8 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// Where the REST API lives.
    pub api_root: String,
    /// Where `.../archive/refs/heads/{branch}.zip` downloads are served from.
    pub archive_root: String,
    pub page_size: usize,
    pub metadata_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub agent: String,
}

impl GitHubConfig {
    pub const DEFAULT_AGENT: &'static str = "repo-snapshot";

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Default for GitHubConfig {
    fn default() -> GitHubConfig {
        GitHubConfig {
            api_root: String::from("https://api.github.com"),
            archive_root: String::from("https://github.com"),
            page_size: 100,
            metadata_timeout_secs: 10,
            download_timeout_secs: 30,
            agent: GitHubConfig::DEFAULT_AGENT.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_round_trips() {
        let example = Config::example();

        let got = Config::from_toml(&example.as_toml()).unwrap();

        assert_eq!(got, example);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let src = r#"
            [general]
            dest-dir = "/tmp/archives"

            [github]
            page-size = 50
        "#;

        let got = Config::from_toml(src).unwrap();

        assert_eq!(got.general.dest_dir, PathBuf::from("/tmp/archives"));
        assert_eq!(got.general.delay(), Duration::from_millis(500));
        assert_eq!(got.github.page_size, 50);
        assert_eq!(got.github.api_root, "https://api.github.com");
        assert_eq!(got.github.download_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Config::from_toml("general = 5").is_err());
    }
}
