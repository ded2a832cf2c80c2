#[macro_use]
extern crate log;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use chrono::Local;
use env_logger::Builder;
use failure::{Error, ResultExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use repo_snapshot::{
    is_affirmative, truncate, Config, DownloadOutcome, HttpClient, Listing, Prompt, Repo,
    Reporter, Session, SessionEnd,
};
use structopt::StructOpt;

const DEFAULT_CONFIG: &str = "~/.repo-snapshot.toml";

fn main() {
    let args = Args::from_args();

    if args.example_config {
        generate_example();
        return;
    }

    match run(&args) {
        Ok(end) => {
            report_end(&end);
            process::exit(end.exit_code());
        }
        Err(e) => {
            eprintln!();
            eprintln!("Unexpected error: {}", e);

            for cause in e.iter_causes() {
                eprintln!("\tCaused By: {}", cause);
            }

            process::exit(1);
        }
    }
}

fn generate_example() {
    let example = Config::example();

    println!("{}", example.as_toml());
}

fn run(args: &Args) -> Result<SessionEnd, Error> {
    initialize_logging(args)?;
    let cfg = args.config()?;

    if log_enabled!(log::Level::Debug) {
        for line in format!("{:#?}", cfg).lines() {
            debug!("{}", line);
        }
    }

    println!("{}", "=".repeat(50));
    println!("GitHub Repository Downloader (ZIP Format)");
    println!("{}", "=".repeat(50));

    let client = HttpClient::new(cfg.github.agent.clone());
    let session = Session::new(cfg, client);

    let mut prompt = Console {
        username: args.user.clone(),
        assume_yes: args.yes,
    };
    let mut reporter = ConsoleReporter::default();

    session.run(&mut prompt, &mut reporter)
}

fn report_end(end: &SessionEnd) {
    match *end {
        SessionEnd::EmptyUsername => println!("Username cannot be empty."),
        SessionEnd::UserNotFound(ref name) => {
            println!("\nUser '{}' does not exist on GitHub.", name)
        }
        SessionEnd::NoRepositories(ref name) => {
            println!("\n{} has no public repositories.", name)
        }
        SessionEnd::Cancelled => println!("Download cancelled by user."),
        SessionEnd::Completed(ref summary) => {
            let stdout = io::stdout();
            if let Err(e) = summary.display(&mut stdout.lock()) {
                eprintln!("Unable to print the summary: {}", e);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, StructOpt)]
struct Args {
    #[structopt(short = "c", long = "config", default_value = "~/.repo-snapshot.toml",
                help = "The configuration file to use.")]
    config_file: String,
    #[structopt(short = "d", long = "dest-dir", parse(from_os_str),
                help = "Save archives here instead of the configured directory.")]
    dest_dir: Option<PathBuf>,
    #[structopt(short = "u", long = "user",
                help = "The GitHub user to download (prompted for if not given).")]
    user: Option<String>,
    #[structopt(short = "y", long = "yes", help = "Don't ask for confirmation.")]
    yes: bool,
    #[structopt(short = "v", long = "verbose", parse(from_occurrences),
                help = "Verbose output (repeat for more verbosity)")]
    verbosity: u64,
    #[structopt(long = "example-config",
                help = "Generate an example config and immediately exit.")]
    example_config: bool,
}

impl Args {
    pub fn config(&self) -> Result<Config, Error> {
        let config_file =
            shellexpand::full(&self.config_file).context("Unable to expand wildcards")?;
        let path = PathBuf::from(&*config_file);

        let mut cfg = if path.exists() || self.config_file != DEFAULT_CONFIG {
            Config::from_file(&path).context("Couldn't load the config")?
        } else {
            debug!("{} doesn't exist, using the defaults", path.display());
            Config::default()
        };

        if let Some(ref dest_dir) = self.dest_dir {
            cfg.general.dest_dir = dest_dir.clone();
        }

        Ok(cfg)
    }
}

fn initialize_logging(args: &Args) -> Result<(), Error> {
    let mut builder = Builder::new();

    let level = match args.verbosity {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };

    if let Some(lvl) = level {
        builder.filter(Some("repo_snapshot"), lvl);
    }

    if let Ok(filter) = env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }

    builder.format(|out, record| match record.line() {
        Some(line) => writeln!(
            out,
            "{} [{:5}] ({}#{}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            line,
            record.args()
        ),
        None => writeln!(
            out,
            "{} [{:5}] ({}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        ),
    });

    builder.try_init()?;

    Ok(())
}

/// Asks questions on stdin, unless they were already answered on the
/// command line.
struct Console {
    username: Option<String>,
    assume_yes: bool,
}

impl Prompt for Console {
    fn username(&mut self) -> Result<String, Error> {
        if let Some(name) = self.username.take() {
            return Ok(name);
        }

        ask("Enter GitHub username: ")
    }

    fn confirm(&mut self, username: &str, listing: &Listing) -> Result<bool, Error> {
        println!("\nFound total {} repositories for {}.\n", listing.total, username);

        for (i, repo) in listing.repos.iter().enumerate() {
            print_repo(i + 1, repo);
        }

        if let Some(ref failure) = listing.truncated {
            println!("\n{}", failure);
        }

        if self.assume_yes {
            return Ok(true);
        }

        let answer = ask("\nDo you want to continue? (y/n): ")?;
        Ok(is_affirmative(&answer))
    }
}

fn print_repo(index: usize, repo: &Repo) {
    println!("  {:3}. {}", index, repo.name);

    if !repo.description.is_empty() {
        println!("       {}", truncate(&repo.description, 80));
    }
}

fn ask(question: &str) -> Result<String, Error> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    let stdin = io::stdin();
    stdin
        .lock()
        .read_line(&mut answer)
        .context("Unable to read from stdin")?;

    Ok(answer.trim().to_string())
}

/// Shows a progress bar for each download.
#[derive(Default)]
struct ConsoleReporter {
    bar: Option<ProgressBar>,
}

impl ConsoleReporter {
    fn bar(&mut self, total: u64) -> &ProgressBar {
        self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(total);
            let style = ProgressStyle::default_bar()
                .template("   Progress: {percent:>3}% ({bytes}/{total_bytes}) [{bar:30}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        })
    }
}

impl Reporter for ConsoleReporter {
    fn started(&mut self, index: usize, total: usize, repo: &Repo) {
        if index == 1 {
            println!("\nStarting download of {} repositories", total);
        }
        println!("\n[{}/{}] {}", index, total, repo.name);
    }

    fn progress(&mut self, downloaded: u64, total: Option<u64>) {
        if let Some(total) = total {
            self.bar(total).set_position(downloaded);
        }
    }

    fn finished(&mut self, repo: &Repo, outcome: &DownloadOutcome) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        match *outcome {
            DownloadOutcome::Success { files } => {
                println!("Downloaded: {}.zip ({} files)", repo.name, files)
            }
            DownloadOutcome::AlreadyExists => {
                println!("Skipping already downloaded: {}", repo.name)
            }
            ref failure => println!(" {}: {}", repo.name, failure),
        }
    }
}
