//! Connection sessions: receive, split into lines, respond.
//!
//! Two drivers share [`Connection`]:
//!
//! - [`run_blocking`] loops on blocking reads on a proactor thread until the
//!   peer closes.
//! - [`ReactiveSessions`] is called by the reactor each time a non-blocking
//!   client socket becomes readable or, while replies are queued, writable.
//!
//! Both end with the same teardown: the engine drops any graph build the
//! connection owned, then the per-connection state is discarded.
//!
//! ## Reactive Back-Pressure
//!
//! | Socket state | Watched for | Reads |
//! |--------------|-------------|-------|
//! | Reply queue empty | readable | until `WouldBlock` |
//! | Send buffer full | readable + writable | paused until the queue drains |

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;

use hull_core::{ConnectionId, LineBuffer, ProtocolEngine, ServerConfig};
use mio::Interest;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::reactor::ReactorHandle;

/// Per-connection I/O bounds, taken from [`ServerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Bytes requested per receive call.
    pub read_buffer_size: usize,
    /// Longest unterminated line before the connection is dropped.
    pub max_line_length: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for SessionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            read_buffer_size: config.read_buffer_size.max(1),
            max_line_length: config.max_line_length,
        }
    }
}

/// Per-connection state: identity and undelivered partial input.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    buffer: LineBuffer,
}

impl Connection {
    /// A connection with no line-length cap.
    #[must_use]
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            buffer: LineBuffer::new(),
        }
    }

    /// A connection that overflows past `max_line_length` unterminated bytes.
    #[must_use]
    pub fn with_line_limit(id: ConnectionId, max_line_length: usize) -> Self {
        Self {
            id,
            buffer: LineBuffer::with_limit(max_line_length),
        }
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Feeds received bytes through the engine.
    ///
    /// Returns the newline-terminated responses for every complete line, in
    /// order; empty when nothing is due.
    pub fn receive(&mut self, engine: &ProtocolEngine, bytes: &[u8]) -> String {
        self.buffer.extend(bytes);
        let mut out = String::new();
        while let Some(line) = self.buffer.next_line() {
            if let Some(response) = engine.process_line(self.id, &line) {
                out.push_str(&response.to_string());
                out.push('\n');
            }
        }
        out
    }

    /// Whether the unterminated input left after [`receive`](Self::receive)
    /// exceeds the line cap. The caller is expected to hang up.
    #[must_use]
    pub fn is_overflowing(&self) -> bool {
        self.buffer.is_overflowing()
    }

    /// Teardown on disconnect.
    pub fn close(self, engine: &ProtocolEngine) {
        engine.disconnect(self.id);
        if self.buffer.pending_len() > 0 {
            debug!(
                "{} closed with {} unterminated bytes",
                self.id,
                self.buffer.pending_len()
            );
        }
    }
}

/// Runs a whole connection on the current thread with blocking I/O.
///
/// Returns when the peer closes, a receive or send fails, or the peer
/// exceeds the line cap.
pub fn run_blocking(
    engine: &ProtocolEngine,
    id: ConnectionId,
    stream: &mut TcpStream,
    limits: SessionLimits,
) {
    let mut conn = Connection::with_line_limit(id, limits.max_line_length);
    let mut buf = vec![0u8; limits.read_buffer_size.max(1)];

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => {
                info!("{} disconnected", id);
                break;
            }
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("{} receive failed: {}", id, err);
                break;
            }
        };
        debug!("{} received {} bytes", id, n);

        let out = conn.receive(engine, &buf[..n]);
        if !out.is_empty() {
            if let Err(err) = stream.write_all(out.as_bytes()) {
                warn!("{} send failed: {}", id, err);
                break;
            }
        }
        if conn.is_overflowing() {
            warn!(
                "{} sent a line over {} bytes, closing",
                id, limits.max_line_length
            );
            break;
        }
    }

    conn.close(engine);
}

/// A reactor-serviced client: socket, protocol state and unsent replies.
#[derive(Debug)]
struct ReactiveClient {
    stream: TcpStream,
    conn: Connection,
    outbound: Vec<u8>,
    watching_writable: bool,
}

impl ReactiveClient {
    fn new(stream: TcpStream, conn: Connection) -> Self {
        Self {
            stream,
            conn,
            outbound: Vec::new(),
            watching_writable: false,
        }
    }

    /// Writes as much queued output as the socket accepts.
    ///
    /// `Ok(true)` once the queue is empty, `Ok(false)` if the send buffer
    /// filled first.
    fn flush(&mut self) -> io::Result<bool> {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }
}

/// Client sockets serviced on the reactor thread.
pub struct ReactiveSessions {
    engine: ProtocolEngine,
    reactor: ReactorHandle,
    limits: SessionLimits,
    clients: Mutex<HashMap<RawFd, ReactiveClient>>,
}

impl ReactiveSessions {
    pub fn new(engine: ProtocolEngine, reactor: ReactorHandle, limits: SessionLimits) -> Self {
        Self {
            engine,
            reactor,
            limits,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Takes ownership of an accepted socket and registers it with the reactor.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the socket cannot be made non-blocking or
    /// registered; the socket is dropped in that case.
    pub fn attach(self: &Arc<Self>, id: ConnectionId, stream: TcpStream) -> io::Result<()> {
        stream.set_nonblocking(true)?;
        let fd = stream.as_raw_fd();
        let conn = Connection::with_line_limit(id, self.limits.max_line_length);
        self.clients.lock().insert(fd, ReactiveClient::new(stream, conn));

        let sessions = Arc::clone(self);
        let registered = self
            .reactor
            .add_fd(fd, Arc::new(move |fd: RawFd| sessions.on_ready(fd)));
        if let Err(err) = registered {
            self.clients.lock().remove(&fd);
            return Err(err);
        }
        Ok(())
    }

    /// Number of live reactive connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reply bytes accepted from the engine but not yet taken by the kernel.
    #[must_use]
    pub fn queued_bytes(&self) -> usize {
        self.clients.lock().values().map(|c| c.outbound.len()).sum()
    }

    /// Services one ready socket; tears the connection down when it ends.
    fn on_ready(&self, fd: RawFd) {
        let mut clients = self.clients.lock();
        let Some(client) = clients.get_mut(&fd) else {
            return;
        };
        if self.service(fd, client) {
            return;
        }
        if let Some(client) = clients.remove(&fd) {
            drop(clients);
            self.release(fd, client);
        }
    }

    /// Flushes queued replies, then reads until `WouldBlock` for as long as
    /// the queue keeps draining. Returns `false` once the connection is done.
    fn service(&self, fd: RawFd, client: &mut ReactiveClient) -> bool {
        let id = client.conn.id();
        let mut buf = vec![0u8; self.limits.read_buffer_size.max(1)];
        loop {
            match client.flush() {
                Ok(true) => {}
                Ok(false) => return self.watch(fd, client, true),
                Err(err) => {
                    warn!("{} send failed: {}", id, err);
                    return false;
                }
            }

            match client.stream.read(&mut buf) {
                Ok(0) => {
                    info!("{} disconnected", id);
                    return false;
                }
                Ok(n) => {
                    debug!("{} received {} bytes", id, n);
                    let out = client.conn.receive(&self.engine, &buf[..n]);
                    client.outbound.extend_from_slice(out.as_bytes());
                    if client.conn.is_overflowing() {
                        warn!(
                            "{} sent a line over {} bytes, closing",
                            id, self.limits.max_line_length
                        );
                        let _ = client.flush();
                        return false;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    return self.watch(fd, client, false)
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("{} receive failed: {}", id, err);
                    return false;
                }
            }
        }
    }

    /// Adds or drops write interest for `fd`. Returns `false` if the
    /// descriptor could not be re-registered.
    fn watch(&self, fd: RawFd, client: &mut ReactiveClient, writable: bool) -> bool {
        if client.watching_writable == writable {
            return true;
        }
        let interest = if writable {
            debug!(
                "{} send buffer full, {} bytes queued, reads paused",
                client.conn.id(),
                client.outbound.len()
            );
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        match self.reactor.set_interest(fd, interest) {
            Ok(_) => {
                client.watching_writable = writable;
                true
            }
            Err(err) => {
                warn!("{} re-registration failed: {}", client.conn.id(), err);
                false
            }
        }
    }

    fn release(&self, fd: RawFd, client: ReactiveClient) {
        let ReactiveClient { stream, conn, .. } = client;
        if let Err(err) = self.reactor.remove_fd(fd) {
            warn!("{} deregistration failed: {}", conn.id(), err);
        }
        conn.close(&self.engine);
        drop(stream);
    }

    /// Closes every connection, running normal teardown for each.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.clients.lock().drain().collect();
        for (fd, client) in drained {
            self.release(fd, client);
        }
    }
}
