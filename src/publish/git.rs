/// Thin wrapper around the `git` executable
use std::path::{Path, PathBuf};
use std::process::Command;

use super::PublishError;

/// Captured result of one version-control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs version-control commands inside a working directory.
///
/// `Err` means the tool couldn't be started at all; a command that ran and
/// failed comes back as `Ok` with `success == false`.
pub trait VersionControl: Send + Sync + 'static {
    fn run(&self, workdir: &Path, args: &[String]) -> Result<CommandOutput, PublishError>;
}

/// The real `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl VersionControl for GitCli {
    fn run(&self, workdir: &Path, args: &[String]) -> Result<CommandOutput, PublishError> {
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(workdir)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PublishError::ToolNotFound(self.program.clone())
                } else {
                    PublishError::Launch(e.to_string())
                }
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_tool_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new("definitely-not-a-real-vcs-binary");

        let err = git.run(dir.path(), &["status".to_string()]).unwrap_err();
        assert!(matches!(err, PublishError::ToolNotFound(_)));
    }
}
