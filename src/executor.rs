//! Runs generated source with an external interpreter.
//!
//! Nothing here validates the code. Every run gets a fresh scratch directory
//! as its working directory and the interpreter's output, or a one-line
//! `❌ ErrorClass: message` summary of what went wrong, comes back as a string.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Name the code is saved under inside the scratch directory.
pub const SCRIPT_FILE_NAME: &str = "diagram.py";

/// How long output is still collected after the interpreter exits.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Output of one interpreter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Captured output on success, a formatted error line otherwise.
    pub output: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// Execute `code` with `workdir` as the current directory.
    async fn run(&self, code: &str, workdir: &Path) -> RunOutput;
}

/// Runs code as `<interpreter> diagram.py` in the scratch directory.
#[derive(Debug, Clone)]
pub struct InterpreterRunner {
    interpreter: PathBuf,
    timeout: Duration,
}

impl InterpreterRunner {
    pub fn new(interpreter: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }
}

#[async_trait]
impl CodeRunner for InterpreterRunner {
    async fn run(&self, code: &str, workdir: &Path) -> RunOutput {
        let script = workdir.join(SCRIPT_FILE_NAME);
        if let Err(e) = tokio::fs::write(&script, code).await {
            return failure(format_error("OSError", &e.to_string()), None, false);
        }

        debug!(
            interpreter = %self.interpreter.display(),
            workdir = %workdir.display(),
            "Spawning interpreter"
        );

        let mut child = match Command::new(&self.interpreter)
            .arg(SCRIPT_FILE_NAME)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(interpreter = %self.interpreter.display(), error = %e, "Interpreter failed to start");
                let message = format!("could not start {}: {}", self.interpreter.display(), e);
                return failure(format_error("FileNotFoundError", &message), None, false);
            }
        };

        let (out_buf, mut out_task) = capture(child.stdout.take());
        let (err_buf, mut err_task) = capture(child.stderr.take());

        let result = tokio::time::timeout(self.timeout, child.wait()).await;
        if let Ok(Ok(_)) = &result {
            // The interpreter is gone but anything it spawned may still hold the pipes
            let _ = tokio::time::timeout(DRAIN_GRACE, async {
                let _ = tokio::join!(&mut out_task, &mut err_task);
            })
            .await;
        }
        out_task.abort();
        err_task.abort();

        match result {
            Ok(Ok(status)) => {
                let stdout = drain(&out_buf);
                let stderr = drain(&err_buf);
                let exit_code = status.code();
                debug!(exit_code = ?exit_code, "Interpreter exited");

                if status.success() {
                    RunOutput {
                        output: join_streams(&stdout, &stderr),
                        exit_code,
                        timed_out: false,
                    }
                } else {
                    failure(summarize_failure(&stderr, exit_code), exit_code, false)
                }
            }
            Ok(Err(e)) => failure(format_error("OSError", &e.to_string()), None, false),
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Interpreter timed out");
                let _ = child.kill().await;
                let message = format!("execution exceeded {}s", self.timeout.as_secs());
                failure(format_error("TimeoutError", &message), None, true)
            }
        }
    }
}

type Captured = Arc<Mutex<Vec<u8>>>;

/// Copy a child pipe into a shared buffer until EOF or abort.
fn capture<R>(pipe: Option<R>) -> (Captured, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = Captured::default();
    let sink = Arc::clone(&buffer);
    let task = tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
            }
        }
    });
    (buffer, task)
}

fn drain(buffer: &Captured) -> String {
    let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&bytes).into_owned()
}

fn failure(output: String, exit_code: Option<i32>, timed_out: bool) -> RunOutput {
    RunOutput {
        output,
        exit_code,
        timed_out,
    }
}

pub fn format_error(class: &str, message: &str) -> String {
    format!("❌ {}: {}", class, message)
}

fn join_streams(stdout: &str, stderr: &str) -> String {
    match (stdout.trim_end(), stderr.trim_end()) {
        (out, "") => out.to_string(),
        ("", err) => err.to_string(),
        (out, err) => format!("{}\n{}", out, err),
    }
}

/// Turn interpreter stderr into `❌ Class: message`.
///
/// Python prints the exception as the last line of the traceback, e.g.
/// `ModuleNotFoundError: No module named 'diagrams'`.
fn summarize_failure(stderr: &str, exit_code: Option<i32>) -> String {
    let last = stderr.lines().rev().map(str::trim).find(|l| !l.is_empty());

    if let Some(line) = last {
        if let Some((class, message)) = line.split_once(": ") {
            let class = class.rsplit('.').next().unwrap_or(class);
            if is_exception_name(class) {
                return format_error(class, message);
            }
        }
        if is_exception_name(line) {
            return format_error(line, "");
        }
        return format_error("Error", line);
    }

    match exit_code {
        Some(code) => format_error("Error", &format!("interpreter exited with status {}", code)),
        None => format_error("Error", "interpreter terminated by signal"),
    }
}

fn is_exception_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_python_traceback() {
        let stderr = "Traceback (most recent call last):\n  File \"diagram.py\", line 1, in <module>\n    from diagrams import Diagram\nModuleNotFoundError: No module named 'diagrams'\n";
        assert_eq!(
            summarize_failure(stderr, Some(1)),
            "❌ ModuleNotFoundError: No module named 'diagrams'"
        );
    }

    #[test]
    fn test_summarize_qualified_and_bare_exceptions() {
        assert_eq!(
            summarize_failure("graphviz.backend.ExecutableNotFound: failed to execute dot\n", Some(1)),
            "❌ ExecutableNotFound: failed to execute dot"
        );
        assert_eq!(summarize_failure("KeyboardInterrupt\n", Some(1)), "❌ KeyboardInterrupt: ");
        assert_eq!(summarize_failure("", Some(2)), "❌ Error: interpreter exited with status 2");
        assert_eq!(summarize_failure("sh: 1: boom: not found", Some(127)), "❌ Error: sh: 1: boom: not found");
    }

    #[test]
    fn test_join_streams() {
        assert_eq!(join_streams("a\n", ""), "a");
        assert_eq!(join_streams("", "warn\n"), "warn");
        assert_eq!(join_streams("a", "b"), "a\nb");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_workdir_and_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = InterpreterRunner::new("sh", Duration::from_secs(10));

        let result = runner.run("echo hello\necho made > out.txt", dir.path()).await;

        assert!(result.success(), "{:?}", result);
        assert_eq!(result.output, "hello");
        assert!(dir.path().join("out.txt").exists());
        assert!(dir.path().join(SCRIPT_FILE_NAME).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_is_formatted_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let runner = InterpreterRunner::new("sh", Duration::from_secs(10));

        let result = runner
            .run("echo 'ValueError: bad edge' >&2\nexit 3", dir.path())
            .await;

        assert!(!result.success());
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.output, "❌ ValueError: bad edge");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = InterpreterRunner::new("sh", Duration::from_millis(200));

        let result = runner.run("sleep 5", dir.path()).await;

        assert!(result.timed_out);
        assert!(result.output.starts_with("❌ TimeoutError"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_background_child_does_not_hold_the_run_open() {
        let dir = tempfile::tempdir().unwrap();
        let runner = InterpreterRunner::new("sh", Duration::from_secs(3));
        let started = std::time::Instant::now();

        let result = runner.run("sleep 5 &\necho drawn", dir.path()).await;

        assert!(result.success(), "{:?}", result);
        assert!(!result.timed_out);
        assert_eq!(result.output, "drawn");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = InterpreterRunner::new("definitely-not-an-interpreter-xyz", Duration::from_secs(1));

        let result = runner.run("print(1)", dir.path()).await;

        assert!(!result.success());
        assert!(result.output.starts_with("❌ FileNotFoundError"));
    }
}
