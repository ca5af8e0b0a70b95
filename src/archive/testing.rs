use std::io::{self, Cursor};
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{duplex, AsyncRead, AsyncReadExt, DuplexStream, ReadBuf};

use crate::archive::compressor::{CompressionProcess, Compressor};
use crate::error::{process as ProcessError, Error};

#[derive(Clone)]
pub enum FakeOutput {
    /// Emits the bytes then reaches EOF.
    Complete(Vec<u8>),
    /// Emits the bytes then stalls forever.
    Endless(Vec<u8>),
    /// Every read fails.
    Failing,
}

#[derive(Default)]
pub struct FakeState {
    spawns: AtomicUsize,
    terminated: AtomicBool,
    reaped: AtomicBool,
}

impl FakeState {
    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn reaped(&self) -> bool {
        self.reaped.load(Ordering::SeqCst)
    }
}

/// In-memory compressor recording what happened to its processes.
#[derive(Clone)]
pub struct FakeCompressor {
    output: FakeOutput,
    already_gone: bool,
    state: Arc<FakeState>,
}

impl FakeCompressor {
    pub fn new(output: FakeOutput) -> Self {
        Self {
            output,
            already_gone: false,
            state: Arc::default(),
        }
    }

    /// Processes report being reaped by someone else when terminated.
    pub fn already_gone(mut self) -> Self {
        self.already_gone = true;
        self
    }

    pub fn state(&self) -> &FakeState {
        &self.state
    }
}

impl Compressor for FakeCompressor {
    fn start(&self, _dir: &Path) -> io::Result<Box<dyn CompressionProcess>> {
        self.state.spawns.fetch_add(1, Ordering::SeqCst);
        let (output, pipe): (Box<dyn AsyncRead + Unpin + Send>, _) = match &self.output {
            FakeOutput::Complete(bytes) => (Box::new(Cursor::new(bytes.clone())), None),
            FakeOutput::Endless(bytes) => {
                let (writer, reader) = duplex(64);
                (
                    Box::new(Cursor::new(bytes.clone()).chain(reader)),
                    Some(writer),
                )
            }
            FakeOutput::Failing => (Box::new(FailingReader), None),
        };
        Ok(Box::new(FakeProcess {
            output,
            _pipe: pipe,
            already_gone: self.already_gone,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeProcess {
    output: Box<dyn AsyncRead + Unpin + Send>,
    _pipe: Option<DuplexStream>,
    already_gone: bool,
    state: Arc<FakeState>,
}

#[async_trait]
impl CompressionProcess for FakeProcess {
    fn output(&mut self) -> &mut (dyn AsyncRead + Unpin + Send) {
        &mut *self.output
    }

    fn has_exited(&mut self) -> bool {
        self.state.reaped()
    }

    fn terminate(&mut self) -> Result<(), Error> {
        if self.already_gone {
            return Err(ProcessError::ProcessAlreadyGone);
        }
        self.state.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        self.state.reaped.store(true, Ordering::SeqCst);
        Ok(if self.state.terminated() { None } else { Some(0) })
    }
}

struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")))
    }
}
