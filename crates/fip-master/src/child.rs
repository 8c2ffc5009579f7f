use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::error::MasterError;

/// A spawned interop module, or (in tests) a duplex-pipe stand-in for one:
/// anything the dialogue engine can read a response from, write a request
/// to, and eventually tear down.
///
/// Splitting this out as a trait — rather than hard-coding
/// `tokio::process::Child` into [`crate::engine::MasterState`] — is what
/// lets the round logic in `engine.rs` be unit-tested against
/// `tokio::io::duplex` pipes the same way `fip-slave`'s tests drive the
/// slave loop, without spawning a real process per test.
pub(crate) trait ChildHandle: Send {
    fn module_name(&self) -> &str;
    fn reader(&mut self) -> &mut (dyn AsyncRead + Unpin + Send);
    fn writer(&mut self) -> &mut (dyn AsyncWrite + Unpin + Send);
    fn wrong_count(&self) -> u32;
    fn set_wrong_count(&mut self, n: u32);
    /// `Some` for a real child process, so [`crate::engine::MasterState::shutdown`]
    /// can wait on and, if needed, kill it. Test doubles return `None`.
    fn take_process(&mut self) -> Option<&mut Child>;
    fn stop_stderr_forward(&mut self);
}

/// One spawned interop module: its process handle, its stdio pipes, and a
/// background task continuously draining its stderr.
///
/// Grounded on the conformance harness's `spawn_harness`/`ChildIo`
/// (`conformance/tests-runner/src/main.rs` in the pack): a child is spawned
/// with all three stdio streams piped, stdin/stdout handed to the
/// transport layer, stderr handled separately.
pub struct ManagedChild {
    module_name: String,
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr_task: JoinHandle<()>,
    wrong_count: u32,
}

impl ManagedChild {
    /// Spawns `program` (with `args`) as an interop module, piping all
    /// three stdio streams, and starts a background task forwarding its
    /// stderr to the master process's own stderr.
    pub fn spawn(module_name: &str, program: &str, args: &[String]) -> Result<Self, MasterError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MasterError::SpawnFailed {
                module: module_name.to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| MasterError::MissingPipe {
            module: module_name.to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| MasterError::MissingPipe {
            module: module_name.to_string(),
        })?;
        let stderr: ChildStderr = child.stderr.take().ok_or_else(|| MasterError::MissingPipe {
            module: module_name.to_string(),
        })?;

        let stderr_task = tokio::spawn(fip_transport::forward_stderr(stderr, tokio::io::stderr()));

        Ok(ManagedChild {
            module_name: module_name.to_string(),
            child,
            stdin,
            stdout,
            stderr_task,
            wrong_count: 0,
        })
    }
}

impl ChildHandle for ManagedChild {
    fn module_name(&self) -> &str {
        &self.module_name
    }

    fn reader(&mut self) -> &mut (dyn AsyncRead + Unpin + Send) {
        &mut self.stdout
    }

    fn writer(&mut self) -> &mut (dyn AsyncWrite + Unpin + Send) {
        &mut self.stdin
    }

    fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    fn set_wrong_count(&mut self, n: u32) {
        self.wrong_count = n;
    }

    fn take_process(&mut self) -> Option<&mut Child> {
        Some(&mut self.child)
    }

    fn stop_stderr_forward(&mut self) {
        self.stderr_task.abort();
    }
}

/// Waits up to `grace` for `child` to exit on its own, force-killing it if
/// it hasn't (`spec.md` §4.5.7, shutdown).
pub(crate) async fn wait_or_kill(child: &mut Child, grace: Duration) {
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

/// A module reached over an arbitrary duplex byte stream instead of a
/// spawned process's stdio pipes — used both by [`crate::engine::MasterState::connect_stream`]
/// (for tests and non-process transports) and, internally, by `engine.rs`'s
/// own unit tests against `tokio::io::duplex` pipes.
pub(crate) struct StreamChild<S> {
    module_name: String,
    stream: S,
    wrong_count: u32,
}

impl<S> StreamChild<S> {
    pub(crate) fn new(module_name: &str, stream: S) -> Self {
        StreamChild {
            module_name: module_name.to_string(),
            stream,
            wrong_count: 0,
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> ChildHandle for StreamChild<S> {
    fn module_name(&self) -> &str {
        &self.module_name
    }

    fn reader(&mut self) -> &mut (dyn AsyncRead + Unpin + Send) {
        &mut self.stream
    }

    fn writer(&mut self) -> &mut (dyn AsyncWrite + Unpin + Send) {
        &mut self.stream
    }

    fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    fn set_wrong_count(&mut self, n: u32) {
        self.wrong_count = n;
    }

    fn take_process(&mut self) -> Option<&mut Child> {
        None
    }

    fn stop_stderr_forward(&mut self) {}
}
