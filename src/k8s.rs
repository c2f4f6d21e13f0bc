use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::catalog::KubectlCommand;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Exited(i32),
    /// Terminated by a signal before producing an exit code.
    Signalled,
    /// Killed after running past the hard execution timeout.
    TimedOut,
}

impl Completion {
    pub fn success(&self) -> bool {
        matches!(self, Completion::Exited(0))
    }

    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Completion::Exited(code),
            None => Completion::Signalled,
        }
    }
}

/// Completion plus the captured streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub completion: Completion,
    pub stdout: String,
    pub stderr: String,
}

/// Executes external commands for snapshot collection.
pub trait Runner {
    /// Runs `cmd` with stdout and stderr both written to `sink`.
    /// Parameters: `cmd` (&KubectlCommand) program and argument list.
    /// Parameters: `sink` (&File) destination for combined output.
    /// Parameters: `timeout` (Duration) hard wall-clock limit.
    /// Returns: Result<Completion>; Err only when the process could not be started.
    fn run_to_file(
        &self,
        cmd: &KubectlCommand,
        sink: &File,
        timeout: Duration,
    ) -> Result<Completion>;

    /// Runs `cmd` and captures its output.
    /// Parameters: `cmd` (&KubectlCommand) program and argument list.
    /// Parameters: `timeout` (Duration) hard wall-clock limit.
    /// Returns: Result<Captured>; Err only when the process could not be started.
    fn run_capture(&self, cmd: &KubectlCommand, timeout: Duration) -> Result<Captured>;
}

/// Runner implementation that invokes system binaries.
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run_to_file(
        &self,
        cmd: &KubectlCommand,
        sink: &File,
        timeout: Duration,
    ) -> Result<Completion> {
        // Clones share the file offset, so retries append after earlier output.
        let stdout = sink.try_clone().context("failed to clone output handle")?;
        let stderr = sink.try_clone().context("failed to clone output handle")?;

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .with_context(|| format!("failed to run {}", cmd.program))?;

        wait_with_timeout(&mut child, timeout)
    }

    fn run_capture(&self, cmd: &KubectlCommand, timeout: Duration) -> Result<Captured> {
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run {}", cmd.program))?;

        // Drain both pipes off-thread so a large listing cannot stall the child.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let completion = wait_with_timeout(&mut child, timeout)?;
        if completion == Completion::TimedOut {
            // Grandchildren may still hold the pipes open; leave the readers detached.
            return Ok(Captured {
                completion,
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        Ok(Captured {
            completion,
            stdout: join_drain(stdout),
            stderr: join_drain(stderr),
        })
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Completion> {
    let deadline = Instant::now() + timeout;
    loop {
        let polled = match child.try_wait() {
            Ok(polled) => polled,
            Err(err) => {
                stop(child);
                return Err(err).context("failed to wait for child");
            }
        };
        if let Some(status) = polled {
            return Ok(Completion::from_status(status));
        }
        if Instant::now() >= deadline {
            stop(child);
            return Ok(Completion::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills and reaps `child` so no kubectl outlives its attempt.
fn stop(child: &mut Child) {
    // The child may exit between the check and the kill; either way reap it.
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

/// Scripted reply used by [`FakeRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub completion: Completion,
    pub stdout: String,
    pub stderr: String,
    /// When set, the runner reports that the process could not be started.
    pub spawn_error: Option<String>,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Self {
            completion: Completion::Exited(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
            spawn_error: None,
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Self {
            completion: Completion::Exited(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
            spawn_error: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            completion: Completion::TimedOut,
            stdout: String::new(),
            stderr: String::new(),
            spawn_error: None,
        }
    }

    pub fn spawn_error(message: &str) -> Self {
        Self {
            completion: Completion::Exited(127),
            stdout: String::new(),
            stderr: String::new(),
            spawn_error: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Default)]
/// Test runner that answers from a script and records calls.
///
/// Replies are keyed by the command's display form. Each key holds a queue;
/// the last reply repeats once the queue is drained. Unscripted commands
/// succeed with empty output.
pub struct FakeRunner {
    pub script: Mutex<HashMap<String, Vec<Reply>>>,
    pub calls: Mutex<Vec<KubectlCommand>>,
}

impl FakeRunner {
    /// Scripts `replies` for the command whose display form is `cmd`.
    pub fn on(self, cmd: &str, replies: Vec<Reply>) -> Self {
        self.script.lock().unwrap().insert(cmd.to_string(), replies);
        self
    }

    /// Display forms of every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(ToString::to_string).collect()
    }

    fn next_reply(&self, cmd: &KubectlCommand) -> Result<Reply> {
        self.calls.lock().unwrap().push(cmd.clone());
        let mut script = self.script.lock().unwrap();
        let reply = match script.get_mut(&cmd.to_string()) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Reply::ok(""),
        };
        if let Some(message) = &reply.spawn_error {
            bail!("failed to run {}: {message}", cmd.program);
        }
        Ok(reply)
    }
}

impl Runner for FakeRunner {
    fn run_to_file(
        &self,
        cmd: &KubectlCommand,
        sink: &File,
        _timeout: Duration,
    ) -> Result<Completion> {
        let reply = self.next_reply(cmd)?;
        let mut sink = sink;
        sink.write_all(reply.stdout.as_bytes())?;
        sink.write_all(reply.stderr.as_bytes())?;
        Ok(reply.completion)
    }

    fn run_capture(&self, cmd: &KubectlCommand, _timeout: Duration) -> Result<Captured> {
        let reply = self.next_reply(cmd)?;
        Ok(Captured {
            completion: reply.completion,
            stdout: reply.stdout,
            stderr: reply.stderr,
        })
    }
}
