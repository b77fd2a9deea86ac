//! Archiver subprocess abstraction.
//!
//! The streaming loop only ever sees an [`ArchiverProcess`]: a readable
//! output stream plus kill/wait controls. [`ZipArchiver`] is the real
//! implementation, running `zip - . -r` inside the source directory.
//! Tests substitute in-memory fakes.

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::debug;

/// Default archiving executable.
pub const DEFAULT_PROGRAM: &str = "zip";

/// Compress the working directory recursively, archive to stdout.
pub const DEFAULT_ARGS: [&str; 3] = ["-", ".", "-r"];

/// How much of the archiver's stderr is kept for diagnostics.
pub const STDERR_TAIL_LIMIT: usize = 16 * 1024;

/// Outcome of a reaped archiver process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Tail of everything the process wrote to stderr.
    pub stderr: String,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Starts archiver processes.
pub trait Archiver: Send + Sync + 'static {
    type Process: ArchiverProcess;

    /// Spawn the archiver with `working_dir` as its current directory.
    fn start(&self, working_dir: &Path) -> io::Result<Self::Process>;
}

/// A running archiver, exclusively owned by one streaming run.
pub trait ArchiverProcess: Send {
    type Output: AsyncRead + Unpin + Send;

    /// The archive byte stream.
    fn output(&mut self) -> &mut Self::Output;

    /// Whether the process has already exited. Never blocks.
    fn has_exited(&mut self) -> io::Result<bool>;

    /// Send a kill signal. Does not wait.
    fn kill(&mut self) -> io::Result<()>;

    /// Drain and discard remaining output, then wait for the process.
    fn wait(&mut self) -> impl Future<Output = io::Result<ExitReport>> + Send;
}

// ── zip subprocess ─────────────────────────────────────────────

/// Runs an external recursive archiver (by default `zip - . -r`).
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ZipArchiver {
    /// Use `program` with the default `- . -r` arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: DEFAULT_ARGS.iter().map(OsString::from).collect(),
        }
    }

    /// Replace the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Archiver for ZipArchiver {
    type Process = ZipProcess;

    fn start(&self, working_dir: &Path) -> io::Result<ZipProcess> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("archiver stdout was not captured"))?;
        let stderr_tail = child.stderr.take().map(|s| tokio::spawn(drain_stderr(s)));

        debug!(
            program = %self.program.display(),
            pid = child.id(),
            cwd = %working_dir.display(),
            "archiver spawned"
        );

        Ok(ZipProcess {
            child,
            stdout,
            stderr_tail,
        })
    }
}

/// A spawned `zip` child with its stdout pipe and stderr drain task.
pub struct ZipProcess {
    child: Child,
    stdout: ChildStdout,
    stderr_tail: Option<JoinHandle<Vec<u8>>>,
}

impl ArchiverProcess for ZipProcess {
    type Output = ChildStdout;

    fn output(&mut self) -> &mut ChildStdout {
        &mut self.stdout
    }

    fn has_exited(&mut self) -> io::Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<ExitReport> {
        if let Err(e) = tokio::io::copy(&mut self.stdout, &mut tokio::io::sink()).await {
            debug!(error = %e, "discarding remaining archiver output failed");
        }
        let status = self.child.wait().await?;

        let stderr = match self.stderr_tail.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };

        Ok(ExitReport {
            code: status.code(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

/// Read stderr to the end so the child never blocks on a full pipe,
/// keeping only the last [`STDERR_TAIL_LIMIT`] bytes.
async fn drain_stderr(mut stderr: ChildStderr) -> Vec<u8> {
    let mut tail = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_LIMIT {
                    let excess = tail.len() - STDERR_TAIL_LIMIT;
                    tail.drain(..excess);
                }
            }
        }
    }
    tail
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> ZipArchiver {
        ZipArchiver::new("sh").with_args(["-c", script])
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = shell("printf archive-bytes").start(dir.path()).unwrap();

        let mut out = Vec::new();
        process.output().read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"archive-bytes");

        let report = process.wait().await.unwrap();
        assert!(report.success());
        assert!(process.has_exited().unwrap());
    }

    #[tokio::test]
    async fn runs_inside_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), b"x").unwrap();
        let mut process = shell("ls").start(dir.path()).unwrap();

        let mut out = String::new();
        process.output().read_to_string(&mut out).await.unwrap();
        assert!(out.contains("marker.txt"));
        process.wait().await.unwrap();
    }

    #[tokio::test]
    async fn stderr_is_kept_separate() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = shell("printf out; printf oops >&2; exit 3")
            .start(dir.path())
            .unwrap();

        let mut out = Vec::new();
        process.output().read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"out");

        let report = process.wait().await.unwrap();
        assert_eq!(report.code, Some(3));
        assert_eq!(report.stderr, "oops");
        assert!(!report.success());
    }

    #[tokio::test]
    async fn kill_terminates_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = shell("exec sleep 30").start(dir.path()).unwrap();
        assert!(!process.has_exited().unwrap());

        process.kill().unwrap();
        let report = process.wait().await.unwrap();
        assert_eq!(report.code, None);
        assert!(process.has_exited().unwrap());
    }

    #[tokio::test]
    async fn stderr_tail_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let script = "i=0; while [ $i -lt 5000 ]; do echo 0123456789 >&2; i=$((i+1)); done";
        let mut process = shell(script).start(dir.path()).unwrap();

        let report = process.wait().await.unwrap();
        assert!(report.success());
        assert_eq!(report.stderr.len(), STDERR_TAIL_LIMIT);
    }

    #[tokio::test]
    async fn missing_executable_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let result = ZipArchiver::new("/nonexistent/zipstream-archiver").start(dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn default_invocation() {
        let archiver = ZipArchiver::default();
        assert_eq!(archiver.program(), Path::new("zip"));
        assert_eq!(archiver.args, vec!["-", ".", "-r"]);
    }
}
