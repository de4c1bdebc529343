//! Server wiring: listener, reactor, sessions and the area monitor.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hull_core::{
    ConnectionId, DataPath, GraphStore, HullConfig, MonitorConfig, ProtocolEngine, ServerConfig,
};
use hull_monitor::{AreaMonitor, AreaMonitorConfig, AreaSignal, MonitorHandle, TransitionSink};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, ServerError};
use crate::proactor::Proactor;
use crate::reactor::{Reactor, ReactorHandle};
use crate::session::{run_blocking, ReactiveSessions, SessionLimits};

/// A bound but not yet running server.
///
/// # Example
///
/// ```rust,no_run
/// use hull_core::HullConfig;
/// use hull_monitor::Transition;
/// use hull_server::Server;
///
/// let server = Server::bind(&HullConfig::default())?;
/// let running = server.start(Box::new(|t: Transition| println!("{}", t)))?;
/// println!("listening on {}", running.local_addr());
/// // ...
/// running.shutdown()?;
/// # Ok::<(), hull_server::ServerError>(())
/// ```
pub struct Server {
    config: ServerConfig,
    monitor: MonitorConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Arc<GraphStore>,
}

impl Server {
    /// Binds the listening socket. Nothing is accepted until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the address cannot be bound, or
    /// [`ServerError::Io`] if the socket cannot be made non-blocking.
    pub fn bind(config: &HullConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(GraphStore::new()))
    }

    /// Like [`bind`](Self::bind), serving an existing store.
    ///
    /// # Errors
    ///
    /// Same as [`bind`](Self::bind).
    pub fn with_store(config: &HullConfig, store: Arc<GraphStore>) -> Result<Self> {
        let addr = config.server.listen_addr();
        let listener =
            TcpListener::bind(&addr).map_err(|source| ServerError::Bind { addr, source })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        info!("listening on {}", local_addr);

        Ok(Self {
            config: config.server.clone(),
            monitor: config.monitor.clone(),
            listener,
            local_addr,
            store,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Starts the area monitor (if enabled) and the reactor, and begins
    /// accepting connections.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: the monitor thread, the reactor or the
    /// listener registration could not be set up.
    pub fn start(self, sink: TransitionSink) -> Result<RunningServer> {
        let signal = Arc::new(AreaSignal::new());
        let monitor = if self.monitor.enabled {
            let config = AreaMonitorConfig::from(&self.monitor);
            let handle =
                AreaMonitor::new(config, Arc::clone(&self.store), Arc::clone(&signal)).spawn(sink)?;
            Some(handle)
        } else {
            debug!("area monitor disabled");
            None
        };

        let engine = ProtocolEngine::new(Arc::clone(&self.store), signal);
        let reactor = Reactor::start(self.config.poll_timeout()).map_err(ServerError::Reactor)?;
        let limits = SessionLimits::from(&self.config);
        let acceptor = Arc::new(Acceptor {
            listener: self.listener,
            reactive: Arc::new(ReactiveSessions::new(engine.clone(), reactor.handle(), limits)),
            engine,
            data_path: self.config.data_path,
            limits,
            next_id: AtomicU64::new(1),
            proactors: Arc::new(Mutex::new(HashMap::new())),
        });

        let listen_fd = acceptor.listener.as_raw_fd();
        let on_accept = Arc::clone(&acceptor);
        reactor
            .add_fd(listen_fd, Arc::new(move |_fd: RawFd| on_accept.accept_ready()))
            .map_err(ServerError::Reactor)?;

        info!(
            "server running on {} ({} data path)",
            self.local_addr, self.config.data_path
        );
        Ok(RunningServer {
            local_addr: self.local_addr,
            store: self.store,
            reactor,
            acceptor,
            monitor,
        })
    }
}

/// Handle to a running server.
pub struct RunningServer {
    local_addr: SocketAddr,
    store: Arc<GraphStore>,
    reactor: Reactor,
    acceptor: Arc<Acceptor>,
    monitor: Option<MonitorHandle>,
}

impl RunningServer {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Reactor handle, for registering extra descriptors.
    #[must_use]
    pub fn reactor(&self) -> ReactorHandle {
        self.reactor.handle()
    }

    /// Number of connections currently being serviced.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.acceptor.connection_count()
    }

    /// Stops accepting, closes every connection (running normal teardown)
    /// and stops the area monitor.
    ///
    /// # Errors
    ///
    /// Reports a panicked reactor or monitor thread.
    pub fn shutdown(self) -> Result<()> {
        info!("shutting down");
        let reactor = self.reactor.stop();
        self.acceptor.close_all();
        let monitor = match self.monitor {
            Some(handle) => handle.shutdown().map_err(ServerError::from),
            None => Ok(()),
        };
        reactor.and(monitor)
    }
}

/// Listener callback state.
struct Acceptor {
    listener: TcpListener,
    engine: ProtocolEngine,
    data_path: DataPath,
    limits: SessionLimits,
    next_id: AtomicU64,
    /// Live proactors. Each worker removes its own entry on exit.
    proactors: Arc<Mutex<HashMap<ConnectionId, Proactor>>>,
    reactive: Arc<ReactiveSessions>,
}

impl Acceptor {
    /// Accepts every pending connection. A failed accept is logged and the
    /// listener stays registered.
    fn accept_ready(&self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                    info!("accepted {} from {}", id, peer);
                    if let Err(err) = self.dispatch(id, stream) {
                        warn!("{} could not be started: {}", id, err);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("accept failed: {}", err);
                    return;
                }
            }
        }
    }

    fn dispatch(&self, id: ConnectionId, stream: TcpStream) -> io::Result<()> {
        match self.data_path {
            DataPath::Proactor => self.start_proactor(id, stream),
            DataPath::Reactor => self.reactive.attach(id, stream),
        }
    }

    fn start_proactor(&self, id: ConnectionId, stream: TcpStream) -> io::Result<()> {
        // Accepted sockets may inherit the listener's non-blocking flag.
        stream.set_nonblocking(false)?;
        let engine = self.engine.clone();
        let limits = self.limits;
        let registry = Arc::clone(&self.proactors);

        // Held across the spawn so the worker cannot deregister before it
        // is registered.
        let mut proactors = self.proactors.lock();
        let proactor = Proactor::start(id, stream, move |id, stream| {
            run_blocking(&engine, id, stream, limits);
            registry.lock().remove(&id);
        })?;
        proactors.insert(id, proactor);
        Ok(())
    }

    fn connection_count(&self) -> usize {
        self.proactors.lock().len() + self.reactive.len()
    }

    fn close_all(&self) {
        let proactors: Vec<Proactor> = self.proactors.lock().drain().map(|(_, p)| p).collect();
        for proactor in proactors {
            let id = proactor.id();
            if proactor.stop().is_err() {
                warn!("{} session thread panicked", id);
            }
        }
        self.reactive.close_all();
    }
}
