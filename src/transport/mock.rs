//! Scriptable transport for connection tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};

use crate::error::{Error, Result};
use crate::signal::CloseSignal;

use super::{MessageKind, Transport};

/// How the mock reacts to writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Record and succeed.
    Accept,
    /// Fail immediately.
    Fail,
    /// Block until closed or released, then fail.
    Stall,
}

struct State {
    reads_tx: mpsc::UnboundedSender<Result<Vec<u8>>>,
    reads_rx: AsyncMutex<mpsc::UnboundedReceiver<Result<Vec<u8>>>>,
    written: Mutex<Vec<(MessageKind, Vec<u8>)>>,
    written_count: watch::Sender<usize>,
    write_mode: Mutex<WriteMode>,
    release: CloseSignal,
    close_calls: AtomicUsize,
    shutdown: CloseSignal,
}

/// Transport half handed to the connection.
pub(crate) struct MockTransport {
    state: Arc<State>,
}

/// Test-side control of a [`MockTransport`].
#[derive(Clone)]
pub(crate) struct MockHandle {
    state: Arc<State>,
}

impl MockTransport {
    pub(crate) fn new() -> (Self, MockHandle) {
        let (reads_tx, reads_rx) = mpsc::unbounded_channel();
        let (written_count, _) = watch::channel(0);
        let state = Arc::new(State {
            reads_tx,
            reads_rx: AsyncMutex::new(reads_rx),
            written: Mutex::new(Vec::new()),
            written_count,
            write_mode: Mutex::new(WriteMode::Accept),
            release: CloseSignal::new(),
            close_calls: AtomicUsize::new(0),
            shutdown: CloseSignal::new(),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            MockHandle { state },
        )
    }
}

impl MockHandle {
    /// Queues a message for the next transport read.
    pub(crate) fn push(&self, data: &[u8]) {
        let _ = self.state.reads_tx.send(Ok(data.to_vec()));
    }

    /// Makes the next transport read fail.
    pub(crate) fn push_read_error(&self) {
        let _ = self
            .state
            .reads_tx
            .send(Err(Error::transport("connection reset by peer")));
    }

    pub(crate) fn set_write_mode(&self, mode: WriteMode) {
        *self.state.write_mode.lock() = mode;
    }

    /// Fails every write currently stalled.
    pub(crate) fn release_stalled_writes(&self) {
        self.state.release.fire();
    }

    /// Payloads written so far, in order.
    pub(crate) fn written(&self) -> Vec<Vec<u8>> {
        self.state
            .written
            .lock()
            .iter()
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub(crate) fn written_kinds(&self) -> Vec<MessageKind> {
        self.state.written.lock().iter().map(|(kind, _)| *kind).collect()
    }

    /// Waits until at least `count` messages have been written.
    pub(crate) async fn wait_for_writes(&self, count: usize) {
        let mut rx = self.state.written_count.subscribe();
        let _ = rx.wait_for(|written| *written >= count).await;
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.shutdown.is_fired()
    }

    pub(crate) async fn wait_closed(&self) {
        self.state.shutdown.wait().await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read_message(&self) -> Result<Vec<u8>> {
        let mut reads = self.state.reads_rx.lock().await;

        tokio::select! {
            biased;
            () = self.state.shutdown.wait() => Err(Error::transport("use of closed transport")),
            next = reads.recv() => next.unwrap_or_else(|| Err(Error::transport("eof"))),
        }
    }

    async fn write_message(&self, kind: MessageKind, data: Vec<u8>) -> Result<()> {
        if self.state.shutdown.is_fired() {
            return Err(Error::transport("use of closed transport"));
        }

        let mode = *self.state.write_mode.lock();
        match mode {
            WriteMode::Accept => {
                let count = {
                    let mut written = self.state.written.lock();
                    written.push((kind, data));
                    written.len()
                };
                self.state.written_count.send_replace(count);
                Ok(())
            }
            WriteMode::Fail => Err(Error::transport("broken pipe")),
            WriteMode::Stall => {
                tokio::select! {
                    () = self.state.shutdown.wait() => {}
                    () = self.state.release.wait() => {}
                }
                Err(Error::transport("write aborted"))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.state.shutdown.fire();
        Ok(())
    }
}
