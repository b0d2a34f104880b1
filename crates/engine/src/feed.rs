use saga_common::excerpt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Characters of feed output kept in a status report.
const OUTPUT_EXCERPT_CHARS: usize = 200;

/// Outcome of asking the intelligence feed for its status.
///
/// Failures are data here, never errors: a broken feed must not abort a
/// global sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStatus {
    /// Exit code of the feed process, when one ran to completion.
    pub exit_code: Option<i32>,
    /// Leading excerpt of the feed's standard output.
    pub output: String,
    /// Why the feed could not be queried, if it could not.
    pub error: Option<String>,
}

impl FeedStatus {
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.exit_code.is_none_or(|code| code == 0)
    }
}

/// Synchronous boundary to the intelligence-feed subsystem.
pub trait IntelligenceFeed {
    /// Query the feed once. Blocks until it answers.
    fn status(&self) -> FeedStatus;
}

/// Used when no feed is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeed;

impl IntelligenceFeed for NoFeed {
    fn status(&self) -> FeedStatus {
        FeedStatus::skipped()
    }
}

/// Feed backed by an external program.
///
/// Runs with no timeout; callers that need responsiveness must bound it.
#[derive(Debug, Clone)]
pub struct CommandFeed {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandFeed {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
        }
    }

    /// Split `[program, args...]`. An empty command line runs nothing.
    pub fn from_command_line(command: &[String], cwd: &Path) -> Self {
        let (program, args) = command.split_first().map_or_else(
            || (String::new(), Vec::new()),
            |(p, rest)| (p.clone(), rest.to_vec()),
        );
        Self::new(program, args, cwd)
    }
}

impl IntelligenceFeed for CommandFeed {
    fn status(&self) -> FeedStatus {
        if self.program.is_empty() {
            return FeedStatus::skipped();
        }
        tracing::debug!(program = %self.program, args = ?self.args, "querying intelligence feed");
        match Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .output()
        {
            Ok(out) => {
                let stdout = String::from_utf8_lossy(&out.stdout);
                let status = FeedStatus {
                    exit_code: out.status.code(),
                    output: excerpt(stdout.trim(), OUTPUT_EXCERPT_CHARS).to_owned(),
                    error: None,
                };
                if !out.status.success() {
                    tracing::warn!(code = ?status.exit_code, "intelligence feed exited unsuccessfully");
                }
                status
            }
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "intelligence feed failed to start");
                FeedStatus {
                    error: Some(e.to_string()),
                    ..FeedStatus::default()
                }
            }
        }
    }
}
