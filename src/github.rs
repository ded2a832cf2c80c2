use crate::client::Transport;
use crate::config::GitHubConfig;
use crate::errors::{ListError, PageFailure};
use crate::Repo;
use serde_derive::Deserialize;
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};

/// An interface to the repositories stored on github.
#[derive(Clone)]
pub struct GitHub<T> {
    cfg: GitHubConfig,
    transport: T,
}

/// Everything we found out about a user's repositories.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// The number of public repositories GitHub says the user has.
    pub total: u64,
    pub repos: Vec<Repo>,
    /// Set when a page couldn't be fetched and `repos` is incomplete.
    pub truncated: Option<PageFailure>,
}

impl<T: Transport> GitHub<T> {
    /// Create a new `GitHub` with the provided config.
    pub fn with_config(cfg: GitHubConfig, transport: T) -> GitHub<T> {
        GitHub { cfg, transport }
    }

    /// Get all of a user's public repositories.
    ///
    /// If a page fails part way through, whatever was collected up to that
    /// point is returned and `truncated` says why the listing stopped.
    pub fn list(&self, username: &str) -> Result<Listing, ListError> {
        let total = self.public_repo_count(username)?;
        debug!("{} has {} public repos", username, total);

        let mut listing = Listing {
            total,
            repos: Vec::new(),
            truncated: None,
        };

        for page in 1..=page_count(total, self.cfg.page_size) {
            match self.get_page(username, page) {
                Ok(raw) => listing.repos.extend(raw.into_iter().map(RawRepo::into_repo)),
                Err(e) => {
                    warn!("{}", e);
                    listing.truncated = Some(e);
                    break;
                }
            }
        }

        debug!("Found {} repos for {}", listing.repos.len(), username);
        Ok(listing)
    }

    fn public_repo_count(&self, username: &str) -> Result<u64, ListError> {
        let url = format!("{}/users/{}", self.cfg.api_root, username);
        let lookup_failed = |reason: String| ListError::Lookup {
            username: username.to_string(),
            reason,
        };

        let response = self
            .transport
            .get(&url, self.cfg.metadata_timeout())
            .map_err(|e| lookup_failed(e.to_string()))?;

        if response.status.as_u16() == 404 {
            return Err(ListError::UserNotFound {
                username: username.to_string(),
            });
        }
        if !response.status.is_success() {
            return Err(lookup_failed(format!("Request failed with {}", response.status)));
        }

        let user: RawUser = response
            .json(&url)
            .map_err(|e| lookup_failed(e.to_string()))?;

        match user.message.as_ref().map(String::as_str) {
            Some("Not Found") => Err(ListError::UserNotFound {
                username: username.to_string(),
            }),
            _ => Ok(user.public_repos),
        }
    }

    fn get_page(&self, username: &str, page: usize) -> Result<Vec<RawRepo>, PageFailure> {
        let url = format!(
            "{}/users/{}/repos?per_page={}&page={}",
            self.cfg.api_root, username, self.cfg.page_size, page
        );
        let failed = |reason: String| PageFailure { page, reason };

        let response = self
            .transport
            .get(&url, self.cfg.metadata_timeout())
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status;

        let body: Value = response.json(&url).map_err(|e| failed(e.to_string()))?;

        if let Some(msg) = body.get("message").and_then(Value::as_str) {
            return Err(failed(format!("API Error: {}", msg)));
        }
        if !status.is_success() {
            return Err(failed(format!("Request failed with {}", status)));
        }

        serde_json::from_value(body)
            .map_err(|e| failed(format!("Unable to deserialize response, {}", e)))
    }
}

impl<T> Debug for GitHub<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("GitHub")
            .field("api_root", &self.cfg.api_root)
            .finish()
    }
}

/// The number of pages needed to hold `total` items.
pub(crate) fn page_count(total: u64, page_size: usize) -> usize {
    let page_size = page_size.max(1) as u64;
    ((total + page_size - 1) / page_size) as usize
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawUser {
    public_repos: u64,
    message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawRepo {
    name: String,
    clone_url: String,
    html_url: String,
    description: Option<String>,
    size: Option<u64>,
}

impl RawRepo {
    fn into_repo(self) -> Repo {
        Repo {
            name: self.name,
            clone_url: self.clone_url,
            web_url: self.html_url,
            description: self.description.unwrap_or_default(),
            size_kb: self.size.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{FakeTransport, Reply};
    use serde_json::json;
    use std::time::Duration;

    const USER: &str = "https://api.github.com/users/octocat";

    fn page_url(page: usize) -> String {
        format!("{}/repos?per_page=100&page={}", USER, page)
    }

    fn repos(range: std::ops::Range<usize>) -> Reply {
        let items: Vec<Value> = range
            .map(|i| {
                json!({
                    "name": format!("repo-{}", i),
                    "clone_url": format!("https://github.com/octocat/repo-{}.git", i),
                    "html_url": format!("https://github.com/octocat/repo-{}", i),
                    "description": null,
                })
            })
            .collect();
        Reply::json(Value::Array(items))
    }

    #[test]
    fn pages_needed() {
        let inputs = vec![(0, 0), (1, 1), (99, 1), (100, 1), (101, 2), (150, 2), (201, 3)];

        for (total, should_be) in inputs {
            assert_eq!(page_count(total, 100), should_be, "{} repos", total);
        }
    }

    #[test]
    fn list_every_page() {
        let transport = FakeTransport::new()
            .on(USER, Reply::json(json!({ "public_repos": 150 })))
            .on(page_url(1), repos(0..100))
            .on(page_url(2), repos(100..150));
        let gh = GitHub::with_config(GitHubConfig::default(), &transport);

        let got = gh.list("octocat").unwrap();

        assert_eq!(got.total, 150);
        assert_eq!(got.repos.len(), 150);
        assert!(got.truncated.is_none());
        assert_eq!(transport.requests_matching("/repos?").len(), 2);
        assert_eq!(got.repos[149].name, "repo-149");
        assert_eq!(got.repos[0].description, "");
        assert_eq!(got.repos[0].size_kb, 0);
        assert_eq!(got.repos[0].web_url, "https://github.com/octocat/repo-0");
    }

    #[test]
    fn listing_uses_the_metadata_timeout() {
        let transport = FakeTransport::new()
            .on(USER, Reply::json(json!({ "public_repos": 150 })))
            .on(page_url(1), repos(0..100))
            .on(page_url(2), repos(100..150));
        let gh = GitHub::with_config(GitHubConfig::default(), &transport);

        gh.list("octocat").unwrap();

        let timeouts = transport.timeouts_matching("/users/octocat");
        assert_eq!(timeouts.len(), 3);
        assert!(timeouts.iter().all(|t| *t == Duration::from_secs(10)));
    }

    #[test]
    fn a_404_means_the_user_does_not_exist() {
        let transport = FakeTransport::new();
        let gh = GitHub::with_config(GitHubConfig::default(), &transport);

        let got = gh.list("octocat").unwrap_err();

        assert_eq!(
            got,
            ListError::UserNotFound {
                username: String::from("octocat")
            }
        );
        assert_eq!(transport.requests(), vec![USER.to_string()]);
    }

    #[test]
    fn not_found_message_means_the_user_does_not_exist() {
        let transport =
            FakeTransport::new().on(USER, Reply::json(json!({ "message": "Not Found" })));
        let gh = GitHub::with_config(GitHubConfig::default(), &transport);

        let got = gh.list("octocat").unwrap_err();

        assert!(matches!(got, ListError::UserNotFound { .. }));
    }

    #[test]
    fn a_user_with_no_repos_is_an_empty_listing() {
        let transport = FakeTransport::new().on(USER, Reply::json(json!({ "public_repos": 0 })));
        let gh = GitHub::with_config(GitHubConfig::default(), &transport);

        let got = gh.list("octocat").unwrap();

        assert_eq!(got.total, 0);
        assert!(got.repos.is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn lookup_failures_are_fatal() {
        let transport = FakeTransport::new().on(USER, Reply::Unreachable);
        let gh = GitHub::with_config(GitHubConfig::default(), &transport);

        let got = gh.list("octocat").unwrap_err();

        assert!(matches!(got, ListError::Lookup { .. }));
    }

    #[test]
    fn api_error_keeps_what_we_already_have() {
        let transport = FakeTransport::new()
            .on(USER, Reply::json(json!({ "public_repos": 250 })))
            .on(page_url(1), repos(0..100))
            .on(
                page_url(2),
                Reply::Status(
                    reqwest::StatusCode::FORBIDDEN,
                    json!({ "message": "API rate limit exceeded" })
                        .to_string()
                        .into_bytes(),
                ),
            )
            .on(page_url(3), repos(200..250));
        let gh = GitHub::with_config(GitHubConfig::default(), &transport);

        let got = gh.list("octocat").unwrap();

        assert_eq!(got.repos.len(), 100);
        let failure = got.truncated.unwrap();
        assert_eq!(failure.page, 2);
        assert!(failure.reason.contains("API rate limit exceeded"));
        assert!(transport.requests_matching("page=3").is_empty());
    }

    #[test]
    fn network_error_mid_listing_keeps_what_we_already_have() {
        let transport = FakeTransport::new()
            .on(USER, Reply::json(json!({ "public_repos": 150 })))
            .on(page_url(1), repos(0..100))
            .on(page_url(2), Reply::Unreachable);
        let gh = GitHub::with_config(GitHubConfig::default(), &transport);

        let got = gh.list("octocat").unwrap();

        assert_eq!(got.repos.len(), 100);
        assert_eq!(got.truncated.unwrap().page, 2);
    }
}
