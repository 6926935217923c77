//! Per-run log file plus stdout, with pruning of old run logs.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const PREFIX: &str = "auctionscout_";
const SUFFIX: &str = ".log";
const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Install the stdout and file layers. Returns the new log file's path.
pub fn init(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating log dir {}", dir.display()))?;
    let pruned = prune(dir, SystemTime::now())?;

    let name = format!(
        "{}{}{}",
        PREFIX,
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        SUFFIX
    );
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("auctionscout=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("installing tracing subscriber")?;

    if pruned > 0 {
        tracing::info!("removed {} log files older than 7 days", pruned);
    }
    Ok(path)
}

fn is_run_log(name: &str) -> bool {
    name.starts_with(PREFIX) && name.ends_with(SUFFIX)
}

fn is_expired(modified: SystemTime, now: SystemTime) -> bool {
    now.duration_since(modified)
        .map(|age| age > RETENTION)
        .unwrap_or(false)
}

/// Delete run logs in `dir` last modified more than 7 days before `now`.
fn prune(dir: &Path, now: SystemTime) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !is_run_log(&name.to_string_lossy()) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if is_expired(modified, now) {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}
