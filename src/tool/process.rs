//! Running external commands.
//!
//! Both output pipes are drained by their own task while the parent waits
//! for the child to exit. A child that fills an undrained pipe would block
//! forever, so neither stream is ever left unread.

use std::fmt;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::ToolError;

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a flag followed by its value.
    pub fn opt(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What a finished child process left behind.
#[allow(dead_code)]
#[derive(Debug)]
pub struct ProcessOutcome {
    pub status: ExitStatus,
    pub stdout_lines: u64,
    pub stderr_lines: u64,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// Run `spec` to completion, logging its output line by line.
///
/// A non-zero exit status is returned as [`ToolError::ExitStatus`].
pub async fn run_command(spec: &CommandSpec) -> Result<ProcessOutcome, ToolError> {
    info!(command = %spec, "Running external command");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| ToolError::Spawn {
        program: spec.program.clone(),
        source: e,
    })?;

    let stdout = child
        .stdout
        .take()
        .map(|out| tokio::spawn(drain(out, spec.program.clone(), Stream::Stdout)));
    let stderr = child
        .stderr
        .take()
        .map(|err| tokio::spawn(drain(err, spec.program.clone(), Stream::Stderr)));

    let status = child.wait().await.map_err(|e| ToolError::Wait {
        program: spec.program.clone(),
        source: e,
    })?;

    let stdout_lines = join_drain(stdout, &spec.program).await;
    let stderr_lines = join_drain(stderr, &spec.program).await;

    info!(
        program = %spec.program,
        code = ?status.code(),
        "External command exited"
    );

    if !status.success() {
        return Err(ToolError::ExitStatus {
            program: spec.program.clone(),
            code: status.code(),
        });
    }

    Ok(ProcessOutcome {
        status,
        stdout_lines,
        stderr_lines,
    })
}

/// Forward every line of `reader` to the log until EOF. Returns the line count.
///
/// Lines are read as raw bytes so that non UTF-8 output cannot stop the drain.
async fn drain<R>(reader: R, program: String, stream: Stream) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut lines = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                lines += 1;
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                match stream {
                    Stream::Stdout => debug!(program = %program, stream = stream.as_str(), "{line}"),
                    Stream::Stderr => info!(program = %program, stream = stream.as_str(), "{line}"),
                }
            }
            Err(e) => {
                warn!(program = %program, stream = stream.as_str(), error = %e, "Failed to read child output");
                break;
            }
        }
    }

    lines
}

async fn join_drain(handle: Option<tokio::task::JoinHandle<u64>>, program: &str) -> u64 {
    match handle {
        Some(handle) => handle.await.unwrap_or_else(|e| {
            warn!(program, error = %e, "Output reader task failed");
            0
        }),
        None => 0,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_success_counts_both_streams() {
        let outcome = run_command(&sh("echo one; echo two; echo oops 1>&2"))
            .await
            .unwrap();

        assert!(outcome.status.success());
        assert_eq!(outcome.stdout_lines, 2);
        assert_eq!(outcome.stderr_lines, 1);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let err = run_command(&sh("echo failing 1>&2; exit 3"))
            .await
            .unwrap_err();

        match err {
            ToolError::ExitStatus { program, code } => {
                assert_eq!(program, "sh");
                assert_eq!(code, Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let err = run_command(&CommandSpec::new("regionflow-no-such-program"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_large_output_on_both_streams_does_not_block() {
        // Well past a typical 64 KiB pipe buffer on each stream
        let script = "i=0; while [ $i -lt 20000 ]; do echo \"line $i padding padding\"; \
                      echo \"err $i padding padding\" 1>&2; i=$((i+1)); done";
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(60),
            run_command(&sh(script)),
        )
        .await
        .expect("command should not deadlock")
        .unwrap();

        assert_eq!(outcome.stdout_lines, 20_000);
        assert_eq!(outcome.stderr_lines, 20_000);
    }

    #[test]
    fn test_display() {
        let spec = CommandSpec::new("hadoop").opt("--zone", "AS_").arg("jar");
        assert_eq!(spec.to_string(), "hadoop --zone AS_ jar");
    }
}
