//! Base command execution abstraction
//!
//! Hardware shims shell out to platform tools; going through this trait keeps
//! them testable without the tools installed.

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}

#[derive(Debug, Error, Clone)]
pub enum CommandError {
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("IO error: {message}")]
    Io { message: String },
}

/// Trait for executing external commands
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError>;

    /// Runs the command and returns trimmed stdout, or `None` on any failure
    fn output_of(&self, program: &str, args: &[&str]) -> Option<String> {
        match self.run(program, args) {
            Ok(output) if output.success() => Some(output.stdout.trim().to_string()),
            Ok(output) => {
                tracing::warn!(
                    program = %program,
                    args = ?args,
                    status = %output.status_code,
                    stderr = %output.stderr.trim(),
                    "Command exited with failure"
                );
                None
            }
            Err(e) => {
                tracing::warn!(program = %program, error = %e, "Command could not be run");
                None
            }
        }
    }

    /// Runs the command and reports whether it exited successfully
    fn succeeds(&self, program: &str, args: &[&str]) -> bool {
        self.output_of(program, args).is_some()
    }
}

/// Real implementation using std::process::Command
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        use std::process::Command;

        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::CommandNotFound {
                    command: program.to_string(),
                }
            } else {
                CommandError::Io {
                    message: e.to_string(),
                }
            }
        })?;

        Ok(CommandOutput {
            status_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_command_runner_success() {
        let runner = ProcessCommandRunner;
        let output = runner.run("echo", &["hello"]).unwrap();

        assert!(output.success());
        assert!(output.stdout.contains("hello"));
        assert_eq!(runner.output_of("echo", &["hello"]), Some("hello".to_string()));
    }

    #[test]
    fn test_process_command_runner_command_not_found() {
        let runner = ProcessCommandRunner;
        let result = runner.run("nonexistent_command_xyz", &[]);

        assert!(matches!(result.unwrap_err(), CommandError::CommandNotFound { .. }));
        assert!(!runner.succeeds("nonexistent_command_xyz", &[]));
    }
}
