use failure::Error;

use crate::client::Transport;
use crate::config::Config;
use crate::driver::{Driver, Reporter, Summary};
use crate::errors::ListError;
use crate::github::{GitHub, Listing};

/// The interactive half of a session.
pub trait Prompt {
    /// Ask for the user whose repositories should be downloaded.
    fn username(&mut self) -> Result<String, Error>;

    /// Show what was found and ask whether to go ahead with the download.
    fn confirm(&mut self, username: &str, listing: &Listing) -> Result<bool, Error>;
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    EmptyUsername,
    UserNotFound(String),
    NoRepositories(String),
    Cancelled,
    Completed(Summary),
}

impl SessionEnd {
    /// The exit code the process should finish with.
    pub fn exit_code(&self) -> i32 {
        match *self {
            SessionEnd::EmptyUsername
            | SessionEnd::UserNotFound(_)
            | SessionEnd::NoRepositories(_) => 1,
            SessionEnd::Cancelled | SessionEnd::Completed(_) => 0,
        }
    }
}

/// Ties together listing a user's repositories, asking for confirmation and
/// downloading them.
#[derive(Debug, Clone)]
pub struct Session<T> {
    config: Config,
    transport: T,
}

impl<T: Transport + Clone> Session<T> {
    pub fn new(config: Config, transport: T) -> Session<T> {
        Session { config, transport }
    }

    pub fn run(
        &self,
        prompt: &mut dyn Prompt,
        reporter: &mut dyn Reporter,
    ) -> Result<SessionEnd, Error> {
        let username = prompt.username()?;
        let username = username.trim();

        if username.is_empty() {
            return Ok(SessionEnd::EmptyUsername);
        }

        info!("Fetching information for {}", username);
        let github = GitHub::with_config(self.config.github.clone(), self.transport.clone());

        let listing = match github.list(username) {
            Ok(listing) => listing,
            Err(ListError::UserNotFound { username }) => {
                return Ok(SessionEnd::UserNotFound(username))
            }
            Err(e) => return Err(e.into()),
        };

        if listing.repos.is_empty() {
            return Ok(SessionEnd::NoRepositories(username.to_string()));
        }

        if !prompt.confirm(username, &listing)? {
            info!("Download cancelled");
            return Ok(SessionEnd::Cancelled);
        }

        let driver = Driver::with_config(self.config.clone(), self.transport.clone());
        let summary = driver.run(&listing.repos, username, reporter);

        Ok(SessionEnd::Completed(summary))
    }
}

/// Does this answer to a yes/no question mean "yes"?
pub fn is_affirmative(answer: &str) -> bool {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        _ => false,
    }
}

/// Shorten a description so it fits on one line of the listing.
pub fn truncate(description: &str, max_chars: usize) -> String {
    let mut truncated: String = description.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
