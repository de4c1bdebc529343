//! Readiness-driven dispatcher.
//!
//! One thread waits on a `mio` poll with a bounded timeout and calls the
//! callback registered for every descriptor that became readable. The
//! reactor carries no business logic of its own.
//!
//! Readiness is edge-triggered: a callback must drain its descriptor (accept
//! or read until `WouldBlock`) or it will not be called again for data that
//! was already pending.

use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::error::{Result, ServerError};

/// Callback invoked with the descriptor that became readable.
pub type ReactorFn = Arc<dyn Fn(RawFd) + Send + Sync + 'static>;

const WAKE_TOKEN: Token = Token(usize::MAX);
const EVENT_CAPACITY: usize = 256;

struct Shared {
    registry: Registry,
    handlers: Mutex<HashMap<RawFd, ReactorFn>>,
    running: AtomicBool,
    waker: Waker,
}

/// Cloneable access to a running reactor's registrations.
///
/// Safe to use from inside a callback: the handler table is not locked while
/// callbacks run.
#[derive(Clone)]
pub struct ReactorHandle {
    shared: Arc<Shared>,
}

impl ReactorHandle {
    /// Watches `fd` for readability and calls `func` on each wakeup.
    ///
    /// Registering an fd again replaces its callback.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the descriptor cannot be registered.
    pub fn add_fd(&self, fd: RawFd, func: ReactorFn) -> io::Result<()> {
        let token = Token(usize::try_from(fd).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "negative file descriptor")
        })?);

        let mut handlers = self.shared.handlers.lock();
        if handlers.contains_key(&fd) {
            self.shared
                .registry
                .reregister(&mut SourceFd(&fd), token, Interest::READABLE)?;
        } else {
            self.shared
                .registry
                .register(&mut SourceFd(&fd), token, Interest::READABLE)?;
        }
        handlers.insert(fd, func);
        trace!("reactor watching fd {}", fd);
        Ok(())
    }

    /// Stops watching `fd`. Returns whether it was registered.
    ///
    /// Must be called before the descriptor is closed.
    ///
    /// # Errors
    ///
    /// Returns the OS error if deregistration fails.
    pub fn remove_fd(&self, fd: RawFd) -> io::Result<bool> {
        let mut handlers = self.shared.handlers.lock();
        if handlers.remove(&fd).is_none() {
            return Ok(false);
        }
        self.shared.registry.deregister(&mut SourceFd(&fd))?;
        trace!("reactor released fd {}", fd);
        Ok(true)
    }

    /// Changes the readiness `fd` is watched for, keeping its callback.
    ///
    /// The callback is invoked for any of the requested readiness kinds.
    /// Returns whether `fd` was registered.
    ///
    /// # Errors
    ///
    /// Returns the OS error if re-registration fails.
    pub fn set_interest(&self, fd: RawFd, interest: Interest) -> io::Result<bool> {
        let handlers = self.shared.handlers.lock();
        if !handlers.contains_key(&fd) {
            return Ok(false);
        }
        let token = Token(usize::try_from(fd).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "negative file descriptor")
        })?);
        self.shared
            .registry
            .reregister(&mut SourceFd(&fd), token, interest)?;
        trace!("reactor fd {} interest now {:?}", fd, interest);
        Ok(true)
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.handlers.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

/// Owner of the event-loop thread.
///
/// # Example
///
/// ```rust,no_run
/// use std::net::TcpListener;
/// use std::os::fd::{AsRawFd, RawFd};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use hull_server::Reactor;
///
/// let listener = TcpListener::bind("127.0.0.1:0")?;
/// listener.set_nonblocking(true)?;
///
/// let reactor = Reactor::start(Duration::from_secs(1))?;
/// reactor.add_fd(listener.as_raw_fd(), Arc::new(|fd: RawFd| println!("fd {} is readable", fd)))?;
/// // ...
/// reactor.stop()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Reactor {
    handle: ReactorHandle,
    thread: Option<JoinHandle<()>>,
}

impl Reactor {
    /// Creates the poll instance and starts the loop thread.
    ///
    /// `poll_timeout` bounds every wait, so the loop notices a stop request
    /// even if the waker were lost and idles cheaply with nothing registered.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the poll, waker or thread cannot be created.
    pub fn start(poll_timeout: Duration) -> io::Result<Self> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;
        let shared = Arc::new(Shared {
            registry,
            handlers: Mutex::new(HashMap::new()),
            running: AtomicBool::new(true),
            waker,
        });

        let loop_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("reactor".to_string())
            .spawn(move || run_loop(poll, &loop_shared, poll_timeout))?;

        debug!("reactor started");
        Ok(Self {
            handle: ReactorHandle { shared },
            thread: Some(thread),
        })
    }

    /// A cloneable handle for registering descriptors, e.g. from callbacks.
    #[must_use]
    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// See [`ReactorHandle::add_fd`].
    ///
    /// # Errors
    ///
    /// Returns the OS error if the descriptor cannot be registered.
    pub fn add_fd(&self, fd: RawFd, func: ReactorFn) -> io::Result<()> {
        self.handle.add_fd(fd, func)
    }

    /// See [`ReactorHandle::remove_fd`].
    ///
    /// # Errors
    ///
    /// Returns the OS error if deregistration fails.
    pub fn remove_fd(&self, fd: RawFd) -> io::Result<bool> {
        self.handle.remove_fd(fd)
    }

    /// Stops the loop, joins its thread and drops every callback.
    ///
    /// # Errors
    ///
    /// [`ServerError::ReactorPanicked`] if a callback panicked the loop.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let shared = &self.handle.shared;
        shared.running.store(false, Ordering::Release);
        if let Err(err) = shared.waker.wake() {
            debug!("reactor waker failed, waiting for poll timeout: {}", err);
        }
        let joined = thread.join().map_err(|_| ServerError::ReactorPanicked);
        // Callbacks commonly hold a handle back to this reactor.
        shared.handlers.lock().clear();
        debug!("reactor stopped");
        joined
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn run_loop(mut poll: Poll, shared: &Shared, timeout: Duration) {
    let mut events = Events::with_capacity(EVENT_CAPACITY);

    while shared.running.load(Ordering::Acquire) {
        if let Err(err) = poll.poll(&mut events, Some(timeout)) {
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            error!("reactor poll failed: {}", err);
            break;
        }

        for event in events.iter() {
            if event.token() == WAKE_TOKEN {
                continue;
            }
            let Ok(fd) = RawFd::try_from(event.token().0) else {
                continue;
            };
            // Clone out so the table is unlocked while the callback runs.
            let handler = shared.handlers.lock().get(&fd).cloned();
            if let Some(handler) = handler {
                handler(fd);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::os::fd::AsRawFd;
    use std::sync::mpsc;

    #[test]
    fn test_start_and_stop_idle() {
        let reactor = Reactor::start(Duration::from_millis(10)).unwrap();
        let handle = reactor.handle();
        assert!(handle.is_running());
        assert!(handle.is_empty());
        reactor.stop().unwrap();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_callback_fires_on_readable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let listener = Arc::new(listener);

        let reactor = Reactor::start(Duration::from_millis(50)).unwrap();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let accept_from = Arc::clone(&listener);
        reactor
            .add_fd(
                listener.as_raw_fd(),
                Arc::new(move |fd: RawFd| {
                    while let Ok((stream, _)) = accept_from.accept() {
                        let _ = tx.lock().send((fd, stream));
                    }
                }),
            )
            .unwrap();
        assert_eq!(reactor.handle().len(), 1);

        let _client = TcpStream::connect(addr).unwrap();
        let (fd, _stream) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(fd, listener.as_raw_fd());

        assert!(reactor.remove_fd(listener.as_raw_fd()).unwrap());
        assert!(!reactor.remove_fd(listener.as_raw_fd()).unwrap());
        reactor.stop().unwrap();
    }

    #[test]
    fn test_callback_may_deregister_itself() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        server_side.set_nonblocking(true).unwrap();
        let fd = server_side.as_raw_fd();

        let reactor = Reactor::start(Duration::from_millis(50)).unwrap();
        let handle = reactor.handle();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        reactor
            .add_fd(
                fd,
                Arc::new(move |fd: RawFd| {
                    let removed = handle.remove_fd(fd).unwrap_or(false);
                    let _ = tx.lock().send(removed);
                }),
            )
            .unwrap();

        client.write_all(b"x\n").unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        assert!(reactor.handle().is_empty());
        reactor.stop().unwrap();
        drop(server_side);
    }

    #[test]
    fn test_writable_interest_fires_callback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let _client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        server_side.set_nonblocking(true).unwrap();
        let fd = server_side.as_raw_fd();

        let reactor = Reactor::start(Duration::from_millis(50)).unwrap();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        reactor
            .add_fd(
                fd,
                Arc::new(move |fd: RawFd| {
                    let _ = tx.lock().send(fd);
                }),
            )
            .unwrap();

        // Nothing to read, so only writability can wake the callback.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        let handle = reactor.handle();
        assert!(handle
            .set_interest(fd, Interest::READABLE | Interest::WRITABLE)
            .unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), fd);

        assert!(!handle.set_interest(fd + 1000, Interest::READABLE).unwrap());
        reactor.stop().unwrap();
        drop(server_side);
    }
}
