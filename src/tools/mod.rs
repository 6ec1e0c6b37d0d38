// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! External tool invocation
//!
//! Every stage body is a sequence of external commands. This module defines
//! the command description, the runner trait the pipeline talks to, the
//! real process-backed runner, and thin builders for the three external
//! collaborators (git, the container engine, the registry probe).

mod engine;
mod git;
mod probe;

pub use engine::ContainerEngine;
pub use git::{is_checkout, GitClient, FETCH_HEAD};
pub use probe::RegistryProbe;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::errors::{TagflowError, TagflowResult};
use crate::secrets::Secret;

/// A single external invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments (never contain secrets)
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// Secret fed to the child's stdin
    pub stdin: Option<Secret>,
    /// Capture stdout/stderr instead of inheriting the terminal
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            stdin: None,
            capture: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn stdin_secret(mut self, secret: Secret) -> Self {
        self.stdin = Some(secret);
        self
    }

    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }
}

/// Renders as a copy-pasteable command line. Stdin is never shown.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_arg(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote_arg(arg))?;
        }
        Ok(())
    }
}

/// Quote a single argument for display
fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// Outcome of a command that was spawned successfully
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Standard output (empty unless captured)
    pub stdout: String,
    /// Standard error (empty unless captured)
    pub stderr: String,
    /// Wall time
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// First non-empty stdout line, trimmed
    pub fn first_line(&self) -> Option<&str> {
        self.stdout.lines().map(str::trim).find(|l| !l.is_empty())
    }
}

/// Runs external commands
///
/// A spawn failure is an `Err`; a command that ran and exited non-zero is an
/// `Ok` output with a non-zero exit code.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> TagflowResult<CommandOutput>;
}

/// Runner backed by real child processes
///
/// Children are killed when the future awaiting them is dropped, which is
/// how host cancellation reaches the running tool.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> TagflowResult<CommandOutput> {
        debug!(command = %spec, "spawning");
        let start = Instant::now();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.envs(&spec.env);
        cmd.kill_on_drop(true);

        if let Some(ref dir) = spec.cwd {
            cmd.current_dir(dir);
        }

        cmd.stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        if spec.capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let spawn_error = |e: std::io::Error| TagflowError::ToolExecutionFailed {
            tool: spec.program.clone(),
            error: e.to_string(),
            help: Some(format!("'{}' may not be installed or on PATH", spec.program)),
        };

        let mut child = cmd.spawn().map_err(spawn_error)?;

        if let Some(ref secret) = spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(secret.expose().as_bytes()).await?;
                stdin.shutdown().await?;
            }
        }

        let output = child.wait_with_output().await?;
        let exit_code = status_code(output.status);

        debug!(command = %spec, exit_code, "finished");

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        })
    }
}

/// Exit code of a finished process; a signal death reads as `128 + signal`
fn status_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Check whether a program can be found on PATH
pub fn check_available(program: &str) -> TagflowResult<PathBuf> {
    which::which(program).map_err(|_| TagflowError::tool_not_found(program))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory runner with scripted outcomes

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted result for a matching command
    #[derive(Debug, Clone)]
    pub enum Outcome {
        Exit(i32, String),
        SpawnError,
    }

    struct Rule {
        prefix: String,
        outcomes: VecDeque<Outcome>,
    }

    /// Records every command and answers from per-prefix queues.
    /// The last outcome of a queue repeats; unmatched commands exit 0.
    #[derive(Default)]
    pub struct ScriptedRunner {
        rules: Mutex<Vec<Rule>>,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, prefix: &str, outcomes: Vec<Outcome>) -> Self {
            self.rules.lock().unwrap().push(Rule {
                prefix: prefix.to_string(),
                outcomes: outcomes.into(),
            });
            self
        }

        /// Rendered command lines in invocation order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|s| s.to_string()).collect()
        }

        pub fn specs(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> TagflowResult<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            let line = spec.to_string();

            let outcome = {
                let mut rules = self.rules.lock().unwrap();
                rules
                    .iter_mut()
                    .find(|r| line.starts_with(&r.prefix))
                    .and_then(|r| {
                        if r.outcomes.len() > 1 {
                            r.outcomes.pop_front()
                        } else {
                            r.outcomes.front().cloned()
                        }
                    })
            };

            match outcome.unwrap_or(Outcome::Exit(0, String::new())) {
                Outcome::Exit(exit_code, stdout) => Ok(CommandOutput {
                    exit_code,
                    stdout,
                    stderr: String::new(),
                    duration: Duration::ZERO,
                }),
                Outcome::SpawnError => Err(TagflowError::ToolExecutionFailed {
                    tool: spec.program.clone(),
                    error: "No such file or directory".into(),
                    help: None,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_only_when_needed() {
        let spec = CommandSpec::new("docker")
            .args(["build", "-t", "reg:5000/svc:42"])
            .arg("my context");

        assert_eq!(spec.to_string(), "docker build -t reg:5000/svc:42 'my context'");
    }

    #[test]
    fn test_display_never_includes_stdin() {
        let spec = CommandSpec::new("docker")
            .args(["login", "reg:5000", "--password-stdin"])
            .stdin_secret(Secret::new("hunter2"));

        assert!(!spec.to_string().contains("hunter2"));
        assert!(!format!("{:?}", spec).contains("hunter2"));
    }

    #[test]
    fn test_first_line() {
        let output = CommandOutput {
            exit_code: 0,
            stdout: "\n  abc1234  \nmore\n".into(),
            stderr: String::new(),
            duration: Duration::ZERO,
        };
        assert_eq!(output.first_line(), Some("abc1234"));
    }

    #[tokio::test]
    async fn test_process_runner_captures_output() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh").args(["-c", "echo hello"]).captured();

        let output = runner.run(&spec).await.unwrap();
        assert!(output.success());
        assert_eq!(output.first_line(), Some("hello"));
    }

    #[tokio::test]
    async fn test_process_runner_feeds_stdin() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh")
            .args(["-c", "read line; [ \"$line\" = hunter2 ]"])
            .stdin_secret(Secret::new("hunter2\n"))
            .captured();

        let output = runner.run(&spec).await.unwrap();
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_process_runner_reports_exit_code() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh").args(["-c", "exit 3"]).captured();

        let output = runner.run(&spec).await.unwrap();
        assert_eq!(output.exit_code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_death_reads_as_shell_status() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh").args(["-c", "kill -TERM $$"]).captured();

        let output = runner.run(&spec).await.unwrap();
        assert_eq!(output.exit_code, 128 + 15);
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("tagflow-definitely-not-a-program").captured();

        assert!(matches!(
            runner.run(&spec).await,
            Err(TagflowError::ToolExecutionFailed { .. })
        ));
    }
}
