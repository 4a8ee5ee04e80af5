//! Bash command execution tool

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tinycode_agent::Tool;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::process::{self, ProcessTracker};

/// Default time a command may run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long output is drained after the shell has exited
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

/// Asks the user whether a command may run
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}

/// Runs every command without asking
pub struct AutoApprove;

#[async_trait]
impl Confirm for AutoApprove {
    async fn confirm(&self, _question: &str) -> bool {
        true
    }
}

/// Tool for executing shell commands in the workspace root
pub struct BashTool {
    tracker: ProcessTracker,
    confirm: Arc<dyn Confirm>,
    timeout: Duration,
}

impl BashTool {
    pub fn new(tracker: ProcessTracker, confirm: Arc<dyn Confirm>) -> Self {
        Self {
            tracker,
            confirm,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, command: &str, workspace_root: &Path) -> std::io::Result<String> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(workspace_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd.spawn()?;

        let pid = child.id();
        if let Some(pid) = pid {
            self.tracker.track(pid);
        }

        let (stdout, mut stdout_reader) = spawn_reader(child.stdout.take());
        let (stderr, mut stderr_reader) = spawn_reader(child.stderr.take());

        let (status, timed_out) = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => (status, false),
            Err(_) => {
                tracing::debug!(command, "command timed out");
                (stop(&mut child, pid).await, true)
            }
        };

        // Background jobs may hold the pipes open after the shell exits
        let drain = futures::future::join(&mut stdout_reader, &mut stderr_reader);
        if tokio::time::timeout(OUTPUT_GRACE, drain).await.is_err() {
            tracing::debug!(command, "output still open after exit, killing process group");
            if let Some(pid) = pid {
                process::kill_group(pid);
            }
            stdout_reader.abort();
            stderr_reader.abort();
        }

        if let Some(pid) = pid {
            self.tracker.untrack(pid);
        }
        let status = status?;

        let note = if timed_out {
            Some("\nCommand terminated likely to timeout, you can continue;".to_string())
        } else if status.success() {
            None
        } else {
            Some(match status.code() {
                Some(code) => format!("\nCommand failed with code {}", code),
                None => "\nCommand terminated by a signal".to_string(),
            })
        };

        Ok(format_output(collected(&stdout), collected(&stderr), note.as_deref()))
    }
}

/// SIGTERM the process group, then SIGKILL it when the shell outlives the grace period
async fn stop(child: &mut Child, pid: Option<u32>) -> std::io::Result<ExitStatus> {
    if let Some(pid) = pid {
        process::terminate_group(pid);
    }
    match tokio::time::timeout(process::KILL_GRACE, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::debug!("command ignored SIGTERM, killing");
            if !pid.is_some_and(process::kill_group) {
                child.start_kill()?;
            }
            child.wait().await
        }
    }
}

/// Output read so far; stays readable after the reader is aborted
type OutputBuffer = Arc<Mutex<Vec<u8>>>;

fn spawn_reader<R>(reader: Option<R>) -> (OutputBuffer, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = OutputBuffer::default();
    let sink = buffer.clone();
    let handle = tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                Err(e) => {
                    tracing::debug!("failed to read command output: {}", e);
                    break;
                }
            }
        }
    });
    (buffer, handle)
}

fn collected(buffer: &OutputBuffer) -> String {
    String::from_utf8_lossy(&buffer.lock()).into_owned()
}

/// `stdout:` and `stderr:` sections; the note is appended to each non-empty stream.
fn format_output(mut stdout: String, mut stderr: String, note: Option<&str>) -> String {
    if let Some(note) = note {
        for stream in [&mut stdout, &mut stderr] {
            if !stream.is_empty() {
                stream.push_str(note);
            }
        }
    }

    let mut output = String::new();
    if !stdout.is_empty() {
        output.push_str("stdout:\n");
        output.push_str(&stdout);
    }
    if !stderr.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str("stderr:\n");
        output.push_str(&stderr);
    }

    if output.is_empty() {
        output = format!("(no output){}", note.unwrap_or_default());
    }
    output
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a command in the terminal"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to run in the terminal. Must not contain newlines."
                },
                "restart": {
                    "type": "boolean",
                    "description": "Stop every command still running from earlier calls before running this one."
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn native_type(&self) -> Option<&str> {
        Some("bash_20250124")
    }

    async fn execute(&self, input: Value, workspace_root: &Path) -> String {
        let command = input.get("command").and_then(Value::as_str).unwrap_or_default();
        if command.trim().is_empty() {
            return "Error: Command cannot be empty".to_string();
        }
        if command.contains('\n') {
            return "Error: Command cannot contain newlines".to_string();
        }

        if input.get("restart").and_then(Value::as_bool).unwrap_or(false) {
            tracing::info!("restarting terminal session");
            self.tracker.terminate_all().await;
        }

        if !self
            .confirm
            .confirm(&format!("Run command \"{}\" (YES/no) > ", command))
            .await
        {
            return "User canceled the operation, stop tool execution.".to_string();
        }

        match self.run(command, workspace_root).await {
            Ok(output) => output,
            Err(e) => format!("Error executing command \"{}\": {}", command, e),
        }
    }
}
