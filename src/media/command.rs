//! Blocking subprocess execution with a wall-clock bound.
//!
//! stdout and stderr are drained on helper threads so a chatty child can
//! never fill a pipe and stall while we poll for its exit.

use super::tools::ToolError;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Maximum number of stderr bytes carried in a [`ToolError::Failed`].
const STDERR_TAIL: usize = 2048;

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Turn a non-zero exit into [`ToolError::Failed`].
    pub fn check(self, tool: &str) -> Result<Self, ToolError> {
        if self.status.success() {
            return Ok(self);
        }
        Err(ToolError::Failed {
            tool: tool.to_string(),
            code: self.status.code(),
            stderr: stderr_tail(&self.stderr),
        })
    }
}

/// Run `command` to completion, killing it once `timeout` has elapsed.
pub fn run(mut command: Command, tool: &str, timeout: Duration) -> Result<CommandOutput, ToolError> {
    tracing::debug!("Running {:?}", command);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ToolError::NotFound(tool.to_string()),
            _ => ToolError::Io(e),
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::Timeout {
                tool: tool.to_string(),
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(CommandOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().rev().nth(STDERR_TAIL) {
        Some((cut, _)) => format!("...{}", &text[cut..]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_tail_keeps_short_text() {
        assert_eq!(stderr_tail(b"  boom \n"), "boom");
    }

    #[test]
    fn stderr_tail_truncates_long_text() {
        let long = "x".repeat(STDERR_TAIL * 2);
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.starts_with("..."));
        assert!(tail.len() <= STDERR_TAIL + 4);
    }

    #[test]
    fn missing_binary_is_not_found() {
        let command = Command::new("/nonexistent/definitely-not-a-tool");
        let result = run(command, "nothing", Duration::from_secs(5));
        assert!(matches!(result, Err(ToolError::NotFound(t)) if t == "nothing"));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_status() {
        let mut command = Command::new("sh");
        command.args(["-c", "printf hello; exit 3"]);
        let output = run(command, "sh", Duration::from_secs(10)).unwrap();

        assert_eq!(output.stdout, b"hello");
        assert_eq!(output.status.code(), Some(3));
        assert!(matches!(
            output.check("sh"),
            Err(ToolError::Failed { code: Some(3), .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn kills_child_after_timeout() {
        let mut command = Command::new("sh");
        command.args(["-c", "sleep 5"]);
        let started = Instant::now();
        let result = run(command, "sh", Duration::from_millis(200));

        assert!(matches!(result, Err(ToolError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
