use std::io::{self, ErrorKind};
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::error::{process as ProcessError, Error};

// "No such process", returned when signaling a pid that was already reaped.
const ESRCH: i32 = 3;

/// Something able to stream a directory as a zip archive.
pub trait Compressor: Send + Sync {
    fn start(&self, dir: &Path) -> io::Result<Box<dyn CompressionProcess>>;
}

/// A running compressor owned by a single transfer.
#[async_trait]
pub trait CompressionProcess: Send {
    /// Archive bytes, in order, until EOF.
    fn output(&mut self) -> &mut (dyn AsyncRead + Unpin + Send);

    /// Whether the exit status is already known.
    fn has_exited(&mut self) -> bool;

    /// Request termination without waiting for it.
    fn terminate(&mut self) -> Result<(), Error>;

    /// Reap the process, returning its exit code (`None` if killed by a signal).
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// Runs `<program> -r - <dir>`, the command line of Info-ZIP's `zip`.
pub struct ZipCompressor {
    program: String,
}

impl ZipCompressor {
    pub fn new(program: String) -> Self {
        Self { program }
    }
}

impl ZipCompressor {
    fn spawn(&self, dir: &Path) -> io::Result<ZipProcess> {
        let mut child = Command::new(&self.program)
            .arg("-r")
            .arg("-")
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(ErrorKind::BrokenPipe, "missing stdout pipe"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_diagnostics(stderr, child.id()));
        }
        Ok(ZipProcess { child, stdout })
    }
}

impl Compressor for ZipCompressor {
    fn start(&self, dir: &Path) -> io::Result<Box<dyn CompressionProcess>> {
        Ok(Box::new(self.spawn(dir)?))
    }
}

async fn log_diagnostics(stderr: ChildStderr, pid: Option<u32>) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => log::debug!("[{}] {}", pid.unwrap_or_default(), line),
            Ok(None) => break,
            Err(err) => {
                log::debug!("Cannot read compression process diagnostics: {}", err);
                break;
            }
        }
    }
}

struct ZipProcess {
    child: Child,
    stdout: ChildStdout,
}

#[async_trait]
impl CompressionProcess for ZipProcess {
    fn output(&mut self) -> &mut (dyn AsyncRead + Unpin + Send) {
        &mut self.stdout
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    fn terminate(&mut self) -> Result<(), Error> {
        // tokio silently accepts killing a child it has already reaped.
        if self.child.id().is_none() {
            return Err(ProcessError::ProcessAlreadyGone);
        }
        self.child.start_kill().map_err(|err| {
            if err.kind() == ErrorKind::InvalidInput || err.raw_os_error() == Some(ESRCH) {
                ProcessError::ProcessAlreadyGone
            } else {
                ProcessError::Terminate(err)
            }
        })
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait().await?.code())
    }
}
