use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use gitkv::{Frontend, RepoOptions, Request, RetryPolicy, SyncedRepository};

/// Read or update a key in the git-based key-value store.
#[derive(Parser, Debug)]
#[command(name = "gitkv", version)]
struct Args {
    /// Path to the git working copy
    repo_path: PathBuf,

    /// The key to read or update
    key: String,

    /// The value to set for the key
    #[arg(short = 'v', long)]
    value: Option<String>,

    /// Delete the key
    #[arg(short = 'd', long)]
    delete: bool,

    /// Max attempts for set/delete
    #[arg(
        short = 'r',
        long = "retry_attempts",
        visible_alias = "retry-attempts",
        default_value_t = 3
    )]
    retry_attempts: usize,

    /// Pause between attempts, in milliseconds
    #[arg(long, env = "GITKV_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Remote to synchronize with
    #[arg(long, env = "GITKV_REMOTE", default_value = "origin")]
    remote: String,

    /// Branch holding the store
    #[arg(long, env = "GITKV_BRANCH", default_value = "main")]
    branch: String,

    /// Commit author name when git config has none
    #[arg(long, env = "GITKV_AUTHOR")]
    author: Option<String>,

    /// Commit author email when git config has none
    #[arg(long, env = "GITKV_EMAIL")]
    email: Option<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let request = match Request::from_flags(args.value, args.delete) {
        Ok(request) => request,
        Err(e) => {
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = RepoOptions {
        remote: args.remote,
        branch: args.branch,
        author: args.author,
        email: args.email,
    };
    let repo = match SyncedRepository::open(&args.repo_path, options) {
        Ok(repo) => repo,
        Err(e) => {
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let policy = RetryPolicy {
        attempts: args.retry_attempts,
        delay: Duration::from_millis(args.retry_delay_ms),
    };
    let stdout = std::io::stdout();
    let mut frontend = Frontend::new(repo, policy, stdout.lock());
    match frontend.run(&args.key, &request) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
