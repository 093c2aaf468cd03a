//! Pushing the regenerated files to the remote repository.

use std::path::PathBuf;
use std::process::{Command, Output};

use tracing::{debug, info};

use crate::config::PublishSettings;
use crate::error::{Result, TrackerError};

pub trait Publisher {
    /// Commit and push `files` if any of them changed. Returns whether a
    /// commit was made.
    fn publish(&self, files: &[PathBuf]) -> Result<bool>;
}

/// Drives the `git` binary in an existing working tree.
pub struct GitPublisher {
    repo_dir: PathBuf,
    remote: String,
    message: String,
}

impl GitPublisher {
    pub fn new(settings: &PublishSettings) -> Self {
        Self {
            repo_dir: settings.repo_dir.clone(),
            remote: settings.remote.clone(),
            message: settings.commit_message.clone(),
        }
    }

    fn git(&self, args: &[&str], files: &[PathBuf]) -> Result<Output> {
        debug!(?args, "Running git");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(args)
            .args(files)
            .output()
            .map_err(|e| TrackerError::Publish(format!("cannot run git: {e}")))?;
        if !output.status.success() {
            return Err(TrackerError::Publish(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }

    /// Paths relative to the working tree, as git expects after `-C`.
    fn relative(&self, files: &[PathBuf]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|f| f.strip_prefix(&self.repo_dir).unwrap_or(f).to_path_buf())
            .collect()
    }
}

impl Publisher for GitPublisher {
    fn publish(&self, files: &[PathBuf]) -> Result<bool> {
        let files = self.relative(files);
        let status = self.git(&["status", "--porcelain", "--"], &files)?;
        if status.stdout.iter().all(u8::is_ascii_whitespace) {
            info!("No changes to commit");
            return Ok(false);
        }

        self.git(&["add", "--"], &files)?;
        self.git(&["commit", "-m", self.message.as_str(), "--"], &files)?;
        self.git(&["push", self.remote.as_str()], &[])?;
        info!(remote = %self.remote, "Committed and pushed changes");
        Ok(true)
    }
}

/// Stand-in used when publishing is turned off.
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(&self, files: &[PathBuf]) -> Result<bool> {
        debug!(count = files.len(), "Publishing disabled, leaving files uncommitted");
        Ok(false)
    }
}

pub fn from_settings(settings: &PublishSettings) -> Box<dyn Publisher> {
    if settings.enabled {
        Box::new(GitPublisher::new(settings))
    } else {
        Box::new(NoopPublisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn files_are_made_relative_to_the_repo() {
        let publisher = GitPublisher::new(&PublishSettings {
            repo_dir: PathBuf::from("/srv/history"),
            ..PublishSettings::default()
        });
        let rel = publisher.relative(&[
            PathBuf::from("/srv/history/README.md"),
            PathBuf::from("data/plays.json"),
        ]);
        assert_eq!(rel, [Path::new("README.md"), Path::new("data/plays.json")]);
    }

    #[test]
    fn disabled_publishing_never_commits() {
        let publisher = from_settings(&PublishSettings {
            enabled: false,
            ..PublishSettings::default()
        });
        assert!(!publisher.publish(&[PathBuf::from("README.md")]).unwrap());
    }
}
