use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;

use crate::client::Transport;
use crate::config::Config;
use crate::fetch::{FetchError, Fetcher};
use crate::validate::{self, Validity};
use crate::Repo;

/// What happened when we tried to download a single repository.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    /// Downloaded and validated, the archive has this many entries.
    Success { files: usize },
    AlreadyExists,
    NotFound,
    InvalidArchive(String),
    HttpError(String),
    NetworkError(String),
    /// The archive couldn't be written to disk.
    LocalIo(String),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        match *self {
            DownloadOutcome::Success { .. } => true,
            _ => false,
        }
    }

    pub fn is_skipped(&self) -> bool {
        *self == DownloadOutcome::AlreadyExists
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success() && !self.is_skipped()
    }
}

impl From<FetchError> for DownloadOutcome {
    fn from(other: FetchError) -> DownloadOutcome {
        match other {
            FetchError::NotFound => DownloadOutcome::NotFound,
            FetchError::Http(e) => DownloadOutcome::HttpError(e.to_string()),
            FetchError::Network(e) => DownloadOutcome::NetworkError(e.to_string()),
            FetchError::Io { path, reason } => {
                DownloadOutcome::LocalIo(format!("Unable to write {}, {}", path, reason))
            }
        }
    }
}

impl Display for DownloadOutcome {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            DownloadOutcome::Success { files } => write!(f, "Success ({} files)", files),
            DownloadOutcome::AlreadyExists => write!(f, "Already exists"),
            DownloadOutcome::NotFound => write!(f, "Repository not found or empty"),
            DownloadOutcome::InvalidArchive(ref msg) => write!(f, "Invalid ZIP, {}", msg),
            DownloadOutcome::HttpError(ref msg) => write!(f, "HTTP Error: {}", msg),
            DownloadOutcome::NetworkError(ref msg) => write!(f, "Network Error: {}", msg),
            DownloadOutcome::LocalIo(ref msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Gets told what the [`Driver`] is up to.
pub trait Reporter {
    fn started(&mut self, _index: usize, _total: usize, _repo: &Repo) {}
    fn progress(&mut self, _downloaded: u64, _total: Option<u64>) {}
    fn finished(&mut self, _repo: &Repo, _outcome: &DownloadOutcome) {}
}

/// A [`Reporter`] which ignores everything.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct NullReporter;

impl Reporter for NullReporter {}

/// The tally at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub successful: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
    /// Where the archives were saved.
    pub dest_dir: PathBuf,
    pub outcomes: Vec<(String, DownloadOutcome)>,
}

impl Summary {
    fn record(&mut self, repo: &Repo, outcome: DownloadOutcome) {
        if outcome.is_success() {
            self.successful += 1;
        } else if outcome.is_skipped() {
            self.skipped += 1;
        } else {
            self.failed += 1;
        }

        self.total += 1;
        self.outcomes.push((repo.name.clone(), outcome));
    }

    pub fn failures(&self) -> impl Iterator<Item = &(String, DownloadOutcome)> {
        self.outcomes.iter().filter(|(_, outcome)| outcome.is_failure())
    }

    pub fn display<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let rule = "=".repeat(50);

        writeln!(writer)?;
        writeln!(writer, "{}", rule)?;
        writeln!(writer, "DOWNLOAD COMPLETED:")?;
        writeln!(writer, "Successful downloads: {}", self.successful)?;
        writeln!(writer, "Already existed (skipped): {}", self.skipped)?;
        writeln!(writer, "Failed downloads: {}", self.failed)?;
        writeln!(writer, "Total repositories: {}", self.total)?;
        writeln!(writer, "Files saved to: {}", self.dest_dir.display())?;
        writeln!(writer, "{}", rule)?;

        for (name, outcome) in self.failures() {
            writeln!(writer, "Error: {} failed with {}", name, outcome)?;
        }

        Ok(())
    }
}

/// Downloads a list of repositories one at a time.
#[derive(Debug, Clone)]
pub struct Driver<T> {
    config: Config,
    fetcher: Fetcher<T>,
}

impl<T: Transport> Driver<T> {
    pub fn with_config(config: Config, transport: T) -> Driver<T> {
        let fetcher = Fetcher::new(
            config.github.clone(),
            config.general.chunk_size,
            transport,
        );

        Driver { config, fetcher }
    }

    /// Where a user's archives get saved.
    pub fn user_dir(&self, username: &str) -> PathBuf {
        self.config.general.dest_dir.join(username)
    }

    pub fn archive_path(&self, username: &str, repo: &Repo) -> PathBuf {
        self.user_dir(username).join(format!("{}.zip", repo.name))
    }

    /// Download every repository in turn.
    ///
    /// A failed download is recorded and we move on to the next one, nothing
    /// here will abort the batch.
    pub fn run(&self, repos: &[Repo], username: &str, reporter: &mut dyn Reporter) -> Summary {
        info!("Downloading {} repositories", repos.len());

        let mut summary = Summary {
            dest_dir: self.user_dir(username),
            ..Default::default()
        };
        let delay = self.config.general.delay();

        for (i, repo) in repos.iter().enumerate() {
            reporter.started(i + 1, repos.len(), repo);

            let outcome = self.download(repo, username, reporter);

            if outcome.is_failure() {
                warn!("Downloading {} failed, {}", repo.name, outcome);
            }
            reporter.finished(repo, &outcome);
            summary.record(repo, outcome);

            if delay.as_nanos() > 0 {
                thread::sleep(delay);
            }
        }

        summary
    }

    /// Download and validate a single repository, unless its archive is
    /// already on disk.
    pub fn download(
        &self,
        repo: &Repo,
        username: &str,
        reporter: &mut dyn Reporter,
    ) -> DownloadOutcome {
        let dest = self.archive_path(username, repo);

        if dest.exists() {
            debug!("Skipping {}, {} already exists", repo.name, dest.display());
            return DownloadOutcome::AlreadyExists;
        }

        let mut progress =
            |downloaded: u64, total: Option<u64>| reporter.progress(downloaded, total);

        match self.fetcher.fetch(username, &repo.name, &dest, &mut progress) {
            Ok(fetched) => {
                debug!(
                    "Saved {} bytes from the {} branch of {}",
                    fetched.bytes, fetched.branch, repo.name
                );
            }
            Err(e) => return e.into(),
        }

        match validate::validate(&dest) {
            Validity::Valid { entries } => DownloadOutcome::Success { files: entries },
            Validity::Corrupt(reason) => DownloadOutcome::InvalidArchive(reason),
        }
    }
}
