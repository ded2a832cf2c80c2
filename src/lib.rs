//! Download every public repository belonging to a GitHub user as a zip
//! archive.
//!
//! The pipeline is strictly sequential:
//!
//! 1. [`GitHub::list()`] resolves the user and walks every page of their
//!    repositories,
//! 2. the [`Driver`] goes through the list, skipping anything already on
//!    disk,
//! 3. a [`fetch::Fetcher`] works out which branch to download and
//!    streams the archive to disk, then
//! 4. [`validate::validate()`] makes sure the archive isn't corrupt.

#[macro_use]
extern crate log;

pub mod client;
mod config;
mod driver;
pub mod errors;
pub mod fetch;
mod github;
mod session;
pub mod validate;

pub use crate::client::{HttpClient, Response, Transport};
pub use crate::config::{Config, General, GitHubConfig};
pub use crate::driver::{DownloadOutcome, Driver, NullReporter, Reporter, Summary};
pub use crate::github::{GitHub, Listing};
pub use crate::session::{is_affirmative, truncate, Prompt, Session, SessionEnd};

use serde_derive::{Deserialize, Serialize};

/// The bits of a repository we care about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub name: String,
    pub clone_url: String,
    pub web_url: String,
    /// Empty when the repository has no description.
    pub description: String,
    pub size_kb: u64,
}
