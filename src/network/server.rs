//! TCP Server
//!
//! Accepts connections and dispatches them to a fixed pool of worker threads.

use std::io::{BufWriter, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::protocol::{write_response, Response};
use crate::store::LedgerStore;

use super::Connection;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// TCP gateway in front of a [`LedgerStore`]
pub struct Server {
    config: Config,
    store: Arc<LedgerStore>,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Create a new server with the given config and store
    pub fn new(config: Config, store: Arc<LedgerStore>) -> Self {
        Self {
            config,
            store,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bind the listen address without serving yet
    ///
    /// Returns the bound address, which resolves port 0 to the real port.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            LedgerError::Network(format!("bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        if self.config.worker_threads == 0 {
            return Err(LedgerError::Config("worker_threads must be at least 1".to_string()));
        }

        let addr = self.bind()?;
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => return Err(LedgerError::Network("listener not bound".to_string())),
        };
        tracing::info!(
            "Listening on {} with {} workers",
            addr,
            self.config.worker_threads
        );

        let (tx, rx) = channel::bounded::<TcpStream>(self.config.max_pending_connections);
        let workers: Vec<JoinHandle<()>> = (0..self.config.worker_threads)
            .map(|id| self.spawn_worker(id, rx.clone()))
            .collect::<Result<_>>()?;
        drop(rx);

        while !self.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if admit(stream, peer, &tx) == Admission::WorkersGone {
                        tracing::error!("All workers exited, stopping acceptor");
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                }
            }
        }

        tracing::info!("Shutting down, waiting for {} workers", workers.len());
        drop(tx);
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }

        self.store.sync()?;
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Flag that stops the server when set, for use from other threads
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn spawn_worker(&self, id: usize, rx: Receiver<TcpStream>) -> Result<JoinHandle<()>> {
        let store = Arc::clone(&self.store);
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        let handle = thread::Builder::new()
            .name(format!("ledgerkv-worker-{}", id))
            .spawn(move || {
                for stream in rx.iter() {
                    let result = Connection::new(stream, Arc::clone(&store)).and_then(|mut conn| {
                        conn.set_timeouts(read_ms, write_ms)?;
                        conn.handle()
                    });
                    if let Err(e) = result {
                        tracing::warn!("Connection ended with error: {}", e);
                    }
                }
            })?;
        Ok(handle)
    }
}

/// What became of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Queued,
    /// The socket could not be prepared; only this connection is lost
    Dropped,
    /// Pool saturated, the client was told so
    Rejected,
    WorkersGone,
}

/// Hand an accepted connection to the worker pool
fn admit(stream: TcpStream, peer: SocketAddr, tx: &Sender<TcpStream>) -> Admission {
    if let Err(e) = stream.set_nonblocking(false) {
        tracing::warn!("Dropping {}: cannot make socket blocking: {}", peer, e);
        return Admission::Dropped;
    }
    match tx.try_send(stream) {
        Ok(()) => Admission::Queued,
        Err(TrySendError::Full(stream)) => {
            tracing::warn!("Rejecting {}: all workers busy", peer);
            reject(stream);
            Admission::Rejected
        }
        Err(TrySendError::Disconnected(_)) => Admission::WorkersGone,
    }
}

/// Tell a client there is no capacity, then close
fn reject(stream: TcpStream) {
    let mut writer = BufWriter::new(stream);
    let _ = write_response(&mut writer, &Response::error("server busy"));
}
