// ABOUTME: Scratch mount lifecycle for filesystem extraction.
// ABOUTME: Parses snapshot mount specs and guarantees unmount plus directory removal exactly once.

use super::process::{CommandLine, CommandRunner, run_checked};
use super::tools::ToolPaths;
use super::traits::AdapterError;
use std::path::{Path, PathBuf};

/// A single mount as printed by `ctr snapshots mounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub fs_type: String,
    pub source: String,
    pub options: Vec<String>,
}

impl MountSpec {
    /// Parse the first `mount -t <type> <source> <target> [-o <opts>]` line of `output`.
    pub fn parse(output: &str) -> Result<Self, AdapterError> {
        let unexpected = || AdapterError::UnexpectedOutput {
            operation: "ctr snapshots mounts".to_string(),
            output: output.trim().to_string(),
        };

        let line = output
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("mount "))
            .ok_or_else(unexpected)?;

        let mut fs_type = None;
        let mut options = Vec::new();
        let mut positional = Vec::new();
        let mut tokens = line.split_whitespace().skip(1);
        while let Some(token) = tokens.next() {
            match token {
                "-t" => fs_type = tokens.next(),
                "-o" => {
                    if let Some(opts) = tokens.next() {
                        options.extend(opts.split(',').filter(|o| !o.is_empty()).map(String::from));
                    }
                }
                other => positional.push(other),
            }
        }

        match (fs_type, positional.first()) {
            (Some(fs_type), Some(source)) => Ok(Self {
                fs_type: fs_type.to_string(),
                source: source.to_string(),
                options,
            }),
            _ => Err(unexpected()),
        }
    }

    fn command(&self, tools: &ToolPaths, target: &Path) -> CommandLine {
        let cmd = CommandLine::new(&tools.mount)
            .args(["-t", self.fs_type.as_str(), self.source.as_str()])
            .arg(target);
        if self.options.is_empty() {
            cmd
        } else {
            cmd.arg("-o").arg(self.options.join(","))
        }
    }
}

/// A mounted scratch directory.
///
/// Obtained through [`ScratchMount::acquire`] and ended by [`ScratchMount::release`],
/// which consumes the value so teardown happens once.
#[must_use = "a scratch mount must be released"]
pub struct ScratchMount<'a> {
    runner: &'a dyn CommandRunner,
    tools: &'a ToolPaths,
    target: PathBuf,
}

impl<'a> ScratchMount<'a> {
    /// Create `target` and mount `spec` on it.
    ///
    /// If mounting fails the freshly created directory is removed before returning.
    pub async fn acquire(
        runner: &'a dyn CommandRunner,
        tools: &'a ToolPaths,
        spec: &MountSpec,
        target: PathBuf,
    ) -> Result<Self, AdapterError> {
        tokio::fs::create_dir_all(&target).await?;

        if let Err(e) = run_checked(runner, "mount", &spec.command(tools, &target)).await {
            remove_target(&target).await;
            return Err(e);
        }

        tracing::debug!("mounted {} on {}", spec.source, target.display());
        Ok(Self {
            runner,
            tools,
            target,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Unmount and remove the directory. Failures are logged, never returned.
    pub async fn release(self) {
        let umount = CommandLine::new(&self.tools.umount).arg(&self.target);
        if let Err(e) = run_checked(self.runner, "umount", &umount).await {
            tracing::warn!("failed to unmount {}: {}", self.target.display(), e);
        }
        remove_target(&self.target).await;
    }
}

// Non-recursive: if the unmount failed the directory still holds the mounted tree.
async fn remove_target(target: &Path) {
    if let Err(e) = tokio::fs::remove_dir(target).await {
        tracing::warn!("failed to remove {}: {}", target.display(), e);
    }
}
