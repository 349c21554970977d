// ABOUTME: Process invocation port used by probes and runtime adapters.
// ABOUTME: Argument vector in; exit code, stdout and stderr out. HostRunner uses tokio::process.

use super::traits::AdapterError;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Whether any argument equals `needle`.
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Non-empty, trimmed stdout lines.
    pub fn lines(&self) -> Vec<String> {
        self.stdout_str()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Runs external processes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, capturing its output.
    ///
    /// Only a failure to spawn is an error; a non-zero exit is reported in the output.
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput, AdapterError>;

    /// Run `producer | consumer`. The returned output is the consumer's, with the
    /// producer's stderr prepended. A producer failure is reported as the exit code.
    async fn pipe(
        &self,
        producer: &CommandLine,
        consumer: &CommandLine,
    ) -> Result<CommandOutput, AdapterError>;
}

/// Run `command` and turn a non-zero exit into [`AdapterError::CommandFailed`].
pub async fn run_checked(
    runner: &dyn CommandRunner,
    operation: &str,
    command: &CommandLine,
) -> Result<CommandOutput, AdapterError> {
    tracing::debug!("{}: {}", operation, command);
    let output = runner.run(command).await?;
    check(operation, command, output)
}

/// Like [`run_checked`] for a two-stage pipeline.
pub async fn pipe_checked(
    runner: &dyn CommandRunner,
    operation: &str,
    producer: &CommandLine,
    consumer: &CommandLine,
) -> Result<CommandOutput, AdapterError> {
    tracing::debug!("{}: {} | {}", operation, producer, consumer);
    let output = runner.pipe(producer, consumer).await?;
    check(operation, consumer, output)
}

fn check(
    operation: &str,
    command: &CommandLine,
    output: CommandOutput,
) -> Result<CommandOutput, AdapterError> {
    if output.success() {
        return Ok(output);
    }
    tracing::error!("command failed: {}", command);
    Err(AdapterError::CommandFailed {
        operation: operation.to_string(),
        code: output.code,
        stderr: output.stderr.trim().to_string(),
    })
}

/// [`CommandRunner`] that spawns real processes on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostRunner;

#[async_trait]
impl CommandRunner for HostRunner {
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput, AdapterError> {
        let output = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| AdapterError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn pipe(
        &self,
        producer: &CommandLine,
        consumer: &CommandLine,
    ) -> Result<CommandOutput, AdapterError> {
        let mut upstream = producer
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AdapterError::Spawn {
                program: producer.program.clone(),
                source,
            })?;

        let upstream_stdout: Stdio = upstream
            .stdout
            .take()
            .ok_or_else(|| AdapterError::UnexpectedOutput {
                operation: producer.to_string(),
                output: "stdout was not captured".to_string(),
            })?
            .try_into()
            .map_err(AdapterError::Io)?;

        let downstream = consumer
            .to_command()
            .stdin(upstream_stdout)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AdapterError::Spawn {
                program: consumer.program.clone(),
                source,
            })?;

        let (upstream, downstream) =
            tokio::join!(upstream.wait_with_output(), downstream.wait_with_output());
        let upstream = upstream.map_err(AdapterError::Io)?;
        let downstream = downstream.map_err(AdapterError::Io)?;

        let mut stderr = String::from_utf8_lossy(&upstream.stderr).into_owned();
        stderr.push_str(&String::from_utf8_lossy(&downstream.stderr));

        let code = if upstream.status.success() {
            downstream.status.code()
        } else {
            upstream.status.code()
        };

        Ok(CommandOutput {
            code,
            stdout: downstream.stdout,
            stderr,
        })
    }
}
