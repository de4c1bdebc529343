//! One dedicated thread per connection.

use std::io;
use std::net::{Shutdown, TcpStream};
use std::thread::{self, JoinHandle};

use hull_core::ConnectionId;
use tracing::{debug, warn};

/// A connection's worker thread.
///
/// The thread owns the socket for its whole lifetime and closes it when the
/// worker function returns. [`stop`](Self::stop) shuts the socket down from
/// outside, which turns the worker's blocking read into end-of-stream so it
/// runs its normal teardown before the thread is joined.
#[derive(Debug)]
pub struct Proactor {
    id: ConnectionId,
    control: TcpStream,
    thread: JoinHandle<()>,
}

impl Proactor {
    /// Spawns a thread running `func` on `stream`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the socket cannot be duplicated or the thread
    /// cannot be spawned.
    pub fn start<F>(id: ConnectionId, stream: TcpStream, func: F) -> io::Result<Self>
    where
        F: FnOnce(ConnectionId, &mut TcpStream) + Send + 'static,
    {
        let control = stream.try_clone()?;
        let thread = thread::Builder::new()
            .name(format!("proactor-{}", id.get()))
            .spawn(move || {
                let mut stream = stream;
                func(id, &mut stream);
                if let Err(err) = stream.shutdown(Shutdown::Both) {
                    if err.kind() != io::ErrorKind::NotConnected {
                        debug!("{} shutdown after session: {}", id, err);
                    }
                }
            })?;
        Ok(Self {
            id,
            control,
            thread,
        })
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the worker function has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the worker to finish on its own.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    /// Forces the connection closed and joins the worker.
    pub fn stop(self) -> thread::Result<()> {
        if let Err(err) = self.control.shutdown(Shutdown::Both) {
            if err.kind() != io::ErrorKind::NotConnected {
                warn!("{} forced shutdown failed: {}", self.id, err);
            }
        }
        self.thread.join()
    }
}
