//! The dedicated worker thread that owns a rig library handle.
//!
//! Requests arrive over a std `mpsc` channel (the thread blocks on it
//! between polls); replies return over tokio `oneshot` senders, which are
//! safe to complete from a plain thread. The thread exits when asked to
//! shut down or when every request sender is gone.

use std::sync::mpsc;
use std::thread::JoinHandle;

use tokio::sync::oneshot;

use rigbridge_core::Result;

use crate::backend::{RigBackend, RigSnapshot};

/// A request executed on the worker thread.
pub(crate) enum WorkerRequest {
    /// Open the library handle.
    Open(oneshot::Sender<Result<()>>),
    /// Close the library handle, keeping the thread alive for a reopen.
    Close(oneshot::Sender<()>),
    /// Read a full state snapshot.
    Poll(oneshot::Sender<Result<RigSnapshot>>),
    /// Run one mutating call against the library.
    Apply(
        Box<dyn FnOnce(&mut dyn RigBackend) -> Result<()> + Send>,
        oneshot::Sender<Result<()>>,
    ),
    /// Close the handle and exit the thread.
    Shutdown,
}

/// Handle to a spawned worker thread.
pub(crate) struct Worker {
    pub tx: mpsc::Sender<WorkerRequest>,
    /// Kept so the thread is not silently detached.
    #[allow(dead_code)]
    pub join: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the thread; it takes exclusive ownership of the library.
    pub fn spawn(mut library: Box<dyn RigBackend>, label: String) -> Worker {
        let (tx, rx) = mpsc::channel::<WorkerRequest>();

        let join = std::thread::Builder::new()
            .name(format!("rig-{label}"))
            .spawn(move || {
                let mut opened = false;
                while let Ok(request) = rx.recv() {
                    match request {
                        WorkerRequest::Open(reply) => {
                            let result = library.open();
                            opened = result.is_ok();
                            let _ = reply.send(result);
                        }
                        WorkerRequest::Close(reply) => {
                            if opened {
                                library.close();
                                opened = false;
                            }
                            let _ = reply.send(());
                        }
                        WorkerRequest::Poll(reply) => {
                            let _ = reply.send(library.snapshot());
                        }
                        WorkerRequest::Apply(call, reply) => {
                            let _ = reply.send(call(&mut *library));
                        }
                        WorkerRequest::Shutdown => break,
                    }
                }
                if opened {
                    library.close();
                }
                tracing::debug!(worker = %label, "rig library worker exited");
            })
            .expect("spawning rig worker thread");

        Worker {
            tx,
            join: Some(join),
        }
    }

    /// Ask the thread to close the library and exit. Does not join; the
    /// caller must not block an async runtime on a thread join.
    pub fn shutdown(&self) {
        let _ = self.tx.send(WorkerRequest::Shutdown);
    }
}
