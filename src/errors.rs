//! The errors encountered in this crate.

use failure::Fail;
use reqwest::StatusCode;

/// The server responded with a non-successful status code.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Request to {} failed with {}", url, status)]
pub struct RequestFailed {
    pub url: String,
    pub status: StatusCode,
}

/// The request never produced a response (connection failure, timeout, or a
/// body that couldn't be read).
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Unable to reach {}: {}", url, reason)]
pub struct NetworkError {
    pub url: String,
    pub reason: String,
}

/// Errors which stop us from listing a user's repositories at all.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum ListError {
    #[fail(display = "User '{}' does not exist", username)]
    UserNotFound { username: String },
    #[fail(display = "Unable to look up '{}': {}", username, reason)]
    Lookup { username: String, reason: String },
}

/// A page of repositories couldn't be retrieved, so the listing stopped
/// early.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Error fetching page {}: {}", page, reason)]
pub struct PageFailure {
    pub page: usize,
    pub reason: String,
}
