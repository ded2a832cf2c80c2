//! Working out which branch to download and streaming its archive to disk.

use crate::client::{Response, Transport};
use crate::config::GitHubConfig;
use crate::errors::{NetworkError, RequestFailed};
use failure::Fail;
use reqwest::StatusCode;
use serde_derive::Deserialize;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

/// The branches to try before asking the API for the default branch.
const CONVENTIONAL_BRANCHES: [&str; 2] = ["main", "master"];

/// Why an archive couldn't be downloaded.
#[derive(Debug, Fail)]
pub enum FetchError {
    #[fail(display = "Repository not found or empty")]
    NotFound,
    #[fail(display = "{}", _0)]
    Http(#[fail(cause)] RequestFailed),
    #[fail(display = "{}", _0)]
    Network(#[fail(cause)] NetworkError),
    #[fail(display = "Unable to write {}, {}", path, reason)]
    Io { path: String, reason: String },
}

impl From<NetworkError> for FetchError {
    fn from(other: NetworkError) -> FetchError {
        FetchError::Network(other)
    }
}

/// An archive which has been written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub branch: String,
    pub bytes: u64,
}

/// Downloads repository archives.
#[derive(Debug, Clone)]
pub struct Fetcher<T> {
    cfg: GitHubConfig,
    chunk_size: usize,
    transport: T,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(cfg: GitHubConfig, chunk_size: usize, transport: T) -> Fetcher<T> {
        Fetcher {
            cfg,
            chunk_size: chunk_size.max(1),
            transport,
        }
    }

    /// Download `username/repo` to `dest`, calling `progress` with the
    /// number of bytes written so far and the expected total.
    pub fn fetch(
        &self,
        username: &str,
        repo: &str,
        dest: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<Fetched, FetchError> {
        let (branch, response) = self.resolve(username, repo)?;
        debug!("Downloading {}/{} from the {} branch", username, repo, branch);

        let url = self.archive_url(username, repo, &branch);
        let bytes = self.save(response, &url, dest, progress)?;

        Ok(Fetched { branch, bytes })
    }

    /// Find a branch whose archive exists, stopping at the first response
    /// that isn't a 404.
    ///
    /// We try `main`, then `master`, then whatever the API says the default
    /// branch is.
    pub fn resolve(&self, username: &str, repo: &str) -> Result<(String, Response), FetchError> {
        for branch in &CONVENTIONAL_BRANCHES {
            let response = self.request_archive(username, repo, branch)?;

            if response.status != StatusCode::NOT_FOUND {
                return check_status(branch, response, &self.archive_url(username, repo, branch));
            }
            trace!("No {} branch for {}/{}", branch, username, repo);
        }

        let branch = self
            .default_branch(username, repo)
            .unwrap_or_else(|| String::from("main"));

        // Unlike a blind retry of `main`, a branch we've already seen 404
        // isn't requested a second time
        if CONVENTIONAL_BRANCHES.contains(&branch.as_str()) {
            return Err(FetchError::NotFound);
        }

        let response = self.request_archive(username, repo, &branch)?;

        if response.status == StatusCode::NOT_FOUND {
            Err(FetchError::NotFound)
        } else {
            let url = self.archive_url(username, repo, &branch);
            check_status(&branch, response, &url)
        }
    }

    pub fn archive_url(&self, username: &str, repo: &str, branch: &str) -> String {
        format!(
            "{}/{}/{}/archive/refs/heads/{}.zip",
            self.cfg.archive_root, username, repo, branch
        )
    }

    fn request_archive(
        &self,
        username: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Response, NetworkError> {
        let url = self.archive_url(username, repo, branch);
        self.transport.get(&url, self.cfg.download_timeout())
    }

    /// Ask the API for the repository's default branch. Any failure just
    /// means we don't know.
    fn default_branch(&self, username: &str, repo: &str) -> Option<String> {
        let url = format!("{}/repos/{}/{}", self.cfg.api_root, username, repo);

        let response = match self.transport.get(&url, self.cfg.metadata_timeout()) {
            Ok(r) => r,
            Err(e) => {
                warn!("{}", e);
                return None;
            }
        };

        if !response.status.is_success() {
            debug!("Looking up {}/{} failed with {}", username, repo, response.status);
            return None;
        }

        match response.json::<RawRepoInfo>(&url) {
            Ok(info) => info.default_branch,
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn save(
        &self,
        response: Response,
        url: &str,
        dest: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64, FetchError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
        }

        let mut file = File::create(dest).map_err(|e| io_error(dest, &e))?;

        let result = match response.content_length {
            Some(total) if total > 0 => {
                copy_chunked(response.body, &mut file, self.chunk_size, total, progress)
            }
            _ => copy_buffered(response.body, &mut file, progress),
        };
        drop(file);

        result.map_err(|e| {
            // a partially written archive would look like a finished one
            // on the next run
            let _ = fs::remove_file(dest);

            match e {
                CopyError::Read(e) => FetchError::Network(NetworkError {
                    url: url.to_string(),
                    reason: e.to_string(),
                }),
                CopyError::Write(e) => io_error(dest, &e),
            }
        })
    }
}

fn check_status(
    branch: &str,
    response: Response,
    url: &str,
) -> Result<(String, Response), FetchError> {
    if response.status.is_success() {
        Ok((branch.to_string(), response))
    } else {
        warn!("Request failed with {}", response.status);
        Err(FetchError::Http(RequestFailed {
            url: url.to_string(),
            status: response.status,
        }))
    }
}

fn io_error(path: &Path, e: &io::Error) -> FetchError {
    FetchError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

fn copy_chunked<R: Read, W: Write>(
    mut reader: R,
    writer: &mut W,
    chunk_size: usize,
    total: u64,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<u64, CopyError> {
    let mut buffer = vec![0; chunk_size];
    let mut downloaded = 0;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };

        writer.write_all(&buffer[..n]).map_err(CopyError::Write)?;
        downloaded += n as u64;
        progress(downloaded, Some(total));
    }

    writer.flush().map_err(CopyError::Write)?;
    Ok(downloaded)
}

/// Without a content length there's nothing to measure progress against, so
/// read the whole body and write it in one go.
fn copy_buffered<R: Read, W: Write>(
    mut reader: R,
    writer: &mut W,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<u64, CopyError> {
    let mut body = Vec::new();
    reader.read_to_end(&mut body).map_err(CopyError::Read)?;

    writer.write_all(&body).map_err(CopyError::Write)?;
    writer.flush().map_err(CopyError::Write)?;

    let len = body.len() as u64;
    progress(len, None);
    Ok(len)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawRepoInfo {
    default_branch: Option<String>,
}
