//! External tool execution
//!
//! [`ProcessRunner`] is the seam between the pipeline and the operating
//! system. [`ProcessSupervisor`] is the real implementation: it locates the
//! yt-dlp executable, captures both output streams in memory and kills the
//! child when the timeout elapses.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::strategy::InvocationPlan;
use crate::config::ToolsConfig;
use crate::error::SupervisorError;

const TOOL_NAME: &str = "yt-dlp";

#[cfg(windows)]
const BINARY_NAME: &str = "yt-dlp.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "yt-dlp";

/// Captured result of a process that ran to completion
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    /// Everything written to stdout
    pub stdout: String,
    /// Everything written to stderr
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an invocation plan
///
/// A non-zero exit is reported through [`ProcessOutput::exit_code`], not as
/// an error. Errors mean the process could not be run or was killed.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Execute `plan`, killing the process after `timeout` if one is given
    async fn run(
        &self,
        plan: &InvocationPlan,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, SupervisorError>;

    /// Get the name of this runner implementation
    fn name(&self) -> &'static str;
}

/// Supervises the yt-dlp executable
#[derive(Clone, Debug)]
pub struct ProcessSupervisor {
    /// Binary resolved at construction, if any
    binary: Option<PathBuf>,
    /// Locations probed when `binary` is unset
    candidates: Vec<PathBuf>,
    /// Whether PATH is searched after the candidates
    search_path: bool,
}

impl ProcessSupervisor {
    /// Create a supervisor for an explicit binary path
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary: Some(binary),
            candidates: Vec::new(),
            search_path: false,
        }
    }

    /// Resolve the binary from configuration
    ///
    /// A missing binary is not an error here: the supervisor probes again on
    /// every run, and runs fail with [`SupervisorError::BinaryNotFound`] until
    /// the tool is installed.
    pub fn discover(tools: &ToolsConfig) -> Self {
        let candidates = candidate_paths(tools);
        let binary = resolve_binary(&candidates, tools.search_path);

        match &binary {
            Some(path) => {
                tracing::info!(binary = %path.display(), "Resolved {} executable", TOOL_NAME)
            }
            None => tracing::warn!(
                searched = candidates.len(),
                search_path = tools.search_path,
                "{} executable not found; jobs will fail until it is installed",
                TOOL_NAME
            ),
        }

        Self {
            binary,
            candidates,
            search_path: tools.search_path,
        }
    }

    /// The binary that the next run would use
    pub fn binary(&self) -> Option<PathBuf> {
        self.binary
            .clone()
            .or_else(|| resolve_binary(&self.candidates, self.search_path))
    }
}

/// Ordered candidate locations: the configured path, then common install dirs
pub fn candidate_paths(tools: &ToolsConfig) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = &tools.ytdlp_path {
        candidates.push(path.clone());
    }
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join(".local/bin").join(BINARY_NAME));
    }
    for dir in ["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin"] {
        candidates.push(PathBuf::from(dir).join(BINARY_NAME));
    }
    candidates
}

/// First candidate that is a file, else a PATH lookup when enabled
pub fn resolve_binary(candidates: &[PathBuf], search_path: bool) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .or_else(|| {
            if search_path {
                which::which(BINARY_NAME).ok()
            } else {
                None
            }
        })
}

async fn read_stream<R>(stream: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn join_error(e: tokio::task::JoinError) -> SupervisorError {
    SupervisorError::Io(std::io::Error::other(format!(
        "output reader task failed: {}",
        e
    )))
}

#[async_trait]
impl ProcessRunner for ProcessSupervisor {
    async fn run(
        &self,
        plan: &InvocationPlan,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, SupervisorError> {
        let binary = self.binary().ok_or_else(|| SupervisorError::BinaryNotFound {
            tool: TOOL_NAME.to_string(),
            searched: self.candidates.len(),
        })?;

        tracing::debug!(
            binary = %binary.display(),
            token = %plan.token,
            platform = %plan.platform,
            "Spawning external tool"
        );

        let mut child = Command::new(&binary)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        // Drain both pipes concurrently so a chatty child never blocks on a full pipe
        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let status = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    tracing::warn!(
                        token = %plan.token,
                        timeout_secs = limit.as_secs(),
                        "External tool exceeded timeout, killing it"
                    );
                    if let Err(e) = child.kill().await {
                        tracing::warn!(error = %e, "Failed to kill timed out process");
                    }
                    // Grandchildren may still hold the pipes open
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(SupervisorError::TimedOut { timeout: limit });
                }
            },
            None => child.wait().await?,
        };

        let stdout = stdout_task.await.map_err(join_error)??;
        let stderr = stderr_task.await.map_err(join_error)??;

        let output = ProcessOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };

        tracing::debug!(
            token = %plan.token,
            exit_code = ?output.exit_code,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "External tool exited"
        );

        Ok(output)
    }

    fn name(&self) -> &'static str {
        "yt-dlp-cli"
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use tempfile::TempDir;

    fn plan(args: &[&str]) -> InvocationPlan {
        InvocationPlan {
            args: args.iter().map(|s| s.to_string()).collect(),
            output_template: String::new(),
            token: "job1-test".to_string(),
            platform: Platform::Generic,
        }
    }

    #[test]
    fn explicit_path_is_probed_first() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("my-yt-dlp");
        std::fs::write(&explicit, "").unwrap();

        let tools = ToolsConfig {
            ytdlp_path: Some(explicit.clone()),
            search_path: false,
            ..Default::default()
        };
        let candidates = candidate_paths(&tools);
        assert_eq!(candidates[0], explicit);
        assert_eq!(resolve_binary(&candidates, false), Some(explicit));
    }

    #[test]
    fn missing_candidates_without_path_search_resolve_to_none() {
        let dir = TempDir::new().unwrap();
        let candidates = vec![dir.path().join("nope"), dir.path().join("also-nope")];
        assert_eq!(resolve_binary(&candidates, false), None);
    }

    #[test]
    fn directories_are_not_binaries() {
        let dir = TempDir::new().unwrap();
        let candidates = vec![dir.path().to_path_buf()];
        assert_eq!(resolve_binary(&candidates, false), None);
    }

    #[tokio::test]
    async fn missing_binary_is_distinct_error() {
        let dir = TempDir::new().unwrap();
        let supervisor = ProcessSupervisor {
            binary: None,
            candidates: vec![dir.path().join("yt-dlp")],
            search_path: false,
        };

        match supervisor.run(&plan(&[]), None).await {
            Err(SupervisorError::BinaryNotFound { tool, searched }) => {
                assert_eq!(tool, "yt-dlp");
                assert_eq!(searched, 1);
            }
            other => panic!("expected BinaryNotFound, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_executable_file_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("yt-dlp");
        std::fs::write(&path, "#!/bin/sh\necho hi\n").unwrap();

        let supervisor = ProcessSupervisor::new(path.clone());
        match supervisor.run(&plan(&[]), None).await {
            Err(SupervisorError::Spawn { binary, source }) => {
                assert_eq!(binary, path);
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected Spawn error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let supervisor = ProcessSupervisor::new(PathBuf::from("/bin/sh"));
        let output = supervisor
            .run(
                &plan(&["-c", "echo to-stdout; echo to-stderr >&2; exit 3"]),
                Some(Duration::from_secs(10)),
            )
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "to-stdout");
        assert_eq!(output.stderr.trim(), "to-stderr");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_output_does_not_deadlock() {
        let supervisor = ProcessSupervisor::new(PathBuf::from("/bin/sh"));
        let output = supervisor
            .run(
                &plan(&[
                    "-c",
                    "i=0; while [ $i -lt 5000 ]; do echo line-$i; echo err-$i >&2; i=$((i+1)); done",
                ]),
                Some(Duration::from_secs(30)),
            )
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.lines().count(), 5000);
        assert_eq!(output.stderr.lines().count(), 5000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_the_process() {
        let supervisor = ProcessSupervisor::new(PathBuf::from("/bin/sh"));
        let started = std::time::Instant::now();
        let result = supervisor
            .run(&plan(&["-c", "sleep 30"]), Some(Duration::from_millis(200)))
            .await;

        match result {
            Err(SupervisorError::TimedOut { timeout }) => {
                assert_eq!(timeout, Duration::from_millis(200));
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
