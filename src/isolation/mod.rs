//! Process-based isolation.
//!
//! Module inspection runs in a child process started from this crate's own
//! binary (`worker` subcommand). The caller talks to it over piped
//! stdin/stdout using [`protocol`] messages; the child's stderr is inherited so
//! its log output reaches the same terminal. A crash or abort in the child
//! shows up here as a closed pipe and an exit status, never as a fault in the
//! calling process.
//!
//! A worker announces itself with a [`Response::Ready`] line before reading any
//! request. A program that exits or prints anything else first is not a
//! worker, and opening the context fails.

pub mod protocol;
pub mod worker;

use crate::error::{Error, Result};
use log::{debug, info, warn};
use protocol::{decode_line, encode_line, Request, Response, PROTOCOL_VERSION};
use std::env;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

/// Environment variable naming the program to start as worker.
pub const WORKER_ENV: &str = "OPENAPI_FROM_MODULE_WORKER";

/// Set in every worker's environment; launchers refuse to start from inside one.
pub const NESTED_ENV: &str = "OPENAPI_FROM_MODULE_NESTED";

/// File name of the binary that serves the `worker` subcommand.
pub const WORKER_BINARY: &str = "openapi-from-module";

/// Describes how to start a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLauncher {
    program: PathBuf,
    /// Arguments placed before `worker`
    args: Vec<OsString>,
}

impl WorkerLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Locates the worker binary.
    ///
    /// Looks at `OPENAPI_FROM_MODULE_WORKER` first, then for an
    /// `openapi-from-module` executable next to the running one, then on
    /// `PATH`. The running executable is never used unless it is that binary,
    /// and nothing is launched from inside a worker process.
    pub fn from_env() -> Result<Self> {
        Self::locate(
            env::var_os(NESTED_ENV).is_some(),
            env::var_os(WORKER_ENV),
            env::current_exe().ok(),
            env::var_os("PATH"),
        )
    }

    fn locate(
        nested: bool,
        program: Option<OsString>,
        current_exe: Option<PathBuf>,
        search_path: Option<OsString>,
    ) -> Result<Self> {
        if nested {
            return Err(Error::isolation(
                "refusing to launch a worker from inside a worker process",
            ));
        }

        if let Some(program) = program.filter(|p| !p.is_empty()) {
            debug!("Using worker from {}: {:?}", WORKER_ENV, program);
            return Ok(Self::new(program));
        }

        let file_name = format!("{}{}", WORKER_BINARY, env::consts::EXE_SUFFIX);
        let sibling = current_exe
            .as_deref()
            .and_then(Path::parent)
            .map(|dir| dir.join(&file_name));
        let on_path = search_path
            .iter()
            .flat_map(env::split_paths)
            .map(|dir| dir.join(&file_name));

        match sibling.into_iter().chain(on_path).find(|p| p.is_file()) {
            Some(found) => {
                debug!("Using worker binary {}", found.display());
                Ok(Self::new(found))
            }
            None => Err(Error::isolation(format!(
                "worker binary '{}' not found next to the running executable or on PATH; \
                 set {} or pass a launcher explicitly",
                file_name, WORKER_ENV
            ))),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, base_dir: &Path, runtime_config: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("worker")
            .arg("--base-dir")
            .arg(base_dir);
        if let Some(config) = runtime_config {
            cmd.arg("--runtime-config").arg(config);
        }
        cmd.current_dir(base_dir)
            .env(NESTED_ENV, "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

/// A running worker process scoped to one base directory.
///
/// Dropping an unclosed context kills and reaps the worker, so it is released
/// on every exit path, including unwinding.
pub struct IsolationContext {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    closed: bool,
}

impl IsolationContext {
    /// Starts a worker anchored at `base_dir`.
    ///
    /// # Errors
    ///
    /// [`Error::IsolationFailure`] if the process cannot be started or does
    /// not announce itself as a worker. No process is left running in that
    /// case.
    pub fn open(
        launcher: &WorkerLauncher,
        base_dir: &Path,
        runtime_config: Option<&Path>,
    ) -> Result<Self> {
        info!("Opening isolation context in {}", base_dir.display());

        let mut child = launcher
            .command(base_dir, runtime_config)
            .spawn()
            .map_err(|e| {
                Error::isolation(format!(
                    "failed to start worker {}: {}",
                    launcher.program().display(),
                    e
                ))
            })?;
        debug!("Worker started with pid {}", child.id());

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::isolation("worker pipes were not created"));
            }
        };

        let mut context = Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            closed: false,
        };
        context.handshake()?;
        Ok(context)
    }

    fn handshake(&mut self) -> Result<()> {
        match self.read_response("worker exited before announcing itself")? {
            Response::Ready { version } if version == PROTOCOL_VERSION => {
                debug!("Worker ready (version {})", version);
                Ok(())
            }
            Response::Ready { version } => Err(self.worker_died(&format!(
                "worker speaks version {}, expected {}",
                version, PROTOCOL_VERSION
            ))),
            other => Err(self.worker_died(&format!(
                "program is not a worker, it answered {:?} first",
                other
            ))),
        }
    }

    /// Reads one response line, tearing the worker down if there is none.
    fn read_response(&mut self, eof_reason: &str) -> Result<Response> {
        let mut answer = String::new();
        match self.stdout.read_line(&mut answer) {
            Ok(0) => Err(self.worker_died(eof_reason)),
            Ok(_) => decode_line(&answer).map_err(|e| self.worker_died(&e.to_string())),
            Err(e) => Err(self.worker_died(&format!("failed to read response: {}", e))),
        }
    }

    /// Sends one request and waits for its response.
    ///
    /// A worker that exits, closes its output or answers with something that is
    /// not a response yields [`Error::IsolationFailure`] with its exit status.
    pub fn call(&mut self, request: &Request) -> Result<Response> {
        let line = encode_line(request)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::isolation("isolation context already closed"))?;

        if let Err(e) = stdin.write_all(line.as_bytes()).and_then(|()| stdin.flush()) {
            return Err(self.worker_died(&format!("failed to send request: {}", e)));
        }

        self.read_response("worker closed its output before answering")
    }

    /// Closes the request stream and waits for the worker to exit.
    pub fn close(mut self) -> Result<()> {
        debug!("Closing isolation context");
        drop(self.stdin.take());
        self.closed = true;

        let status = self
            .child
            .wait()
            .map_err(|e| Error::isolation(format!("failed to wait for worker: {}", e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::isolation(format!("worker exited with {}", status)))
        }
    }

    /// Tears the worker down and describes how it ended.
    fn worker_died(&mut self, reason: &str) -> Error {
        drop(self.stdin.take());
        let status = self.terminate();
        self.closed = true;
        let status = status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown status".to_string());
        warn!("Worker failed: {} ({})", reason, status);
        Error::isolation(format!("{} (worker {})", reason, status))
    }

    fn terminate(&mut self) -> Option<ExitStatus> {
        if let Ok(Some(status)) = self.child.try_wait() {
            return Some(status);
        }
        let _ = self.child.kill();
        self.child.wait().ok()
    }
}

impl Drop for IsolationContext {
    fn drop(&mut self) {
        if !self.closed {
            debug!("Isolation context dropped without close, killing worker");
            drop(self.stdin.take());
            self.terminate();
        }
    }
}
