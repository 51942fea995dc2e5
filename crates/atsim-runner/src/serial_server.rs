//! Virtual serial port server.
//!
//! Every emulated modem gets its own TCP port. A host connects to that port
//! as it would open a serial device; the bytes it sends are fed to a
//! [`ModemSession`] and the session's responses are written back. One host
//! is served per port at a time, and each connection starts a fresh session
//! from the modem's configuration.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use atsim_metrics::{metric_defs, metrics};
use atsim_modem::{ModemConfig, ModemSession, SessionEnd, Transport};
use crossbeam_channel::RecvTimeoutError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};

/// Shared state tracking which modems have a host attached.
type ConnectedClients = Arc<RwLock<HashSet<String>>>;

/// How long a session read waits before re-checking its stop flag.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

// ============================================================================
// Channel transport
// ============================================================================

/// [`Transport`] backed by channels to the connection task.
///
/// Inbound chunks arrive on a crossbeam channel so the blocking session thread
/// can wait with a timeout; outbound bytes go through an unbounded tokio
/// channel that the connection task drains into the socket.
pub struct ChannelTransport {
    inbound: crossbeam_channel::Receiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    pending: Vec<u8>,
    read_timeout: Duration,
}

impl ChannelTransport {
    /// Create a transport reading from `inbound` and writing to `outbound`.
    pub fn new(
        inbound: crossbeam_channel::Receiver<Vec<u8>>,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
        read_timeout: Duration,
    ) -> Self {
        ChannelTransport {
            inbound,
            outbound,
            pending: Vec::new(),
            read_timeout,
        }
    }
}

impl Transport for ChannelTransport {
    fn read(&mut self, max: usize) -> io::Result<Vec<u8>> {
        if self.pending.is_empty() {
            match self.inbound.recv_timeout(self.read_timeout) {
                Ok(data) => self.pending = data,
                Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::ErrorKind::UnexpectedEof.into())
                }
            }
        }
        let n = max.min(self.pending.len());
        Ok(self.pending.drain(..n).collect())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.outbound
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "connection task gone"))?;
        Ok(data.len())
    }
}

// ============================================================================
// Server
// ============================================================================

/// A registered modem and its port.
#[derive(Debug, Clone)]
pub struct ModemInfo {
    /// Modem name.
    pub name: String,
    /// TCP port. `0` until [`SerialServer::start`] binds an ephemeral port.
    pub port: u16,
    /// Initial device state for each connection.
    pub config: ModemConfig,
}

/// TCP server exposing one port per emulated modem.
pub struct SerialServer {
    bind_address: String,
    /// Modems in registration order.
    modems: Vec<ModemInfo>,
    /// Next candidate port for sequential allocation. Wider than `u16` so
    /// running past 65535 is detected rather than wrapped.
    next_port: u32,
    /// Ports that are explicitly assigned or already allocated.
    reserved_ports: HashSet<u16>,
    connected_clients: ConnectedClients,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SerialServer {
    /// Create a server binding to `bind_address`, allocating from `base_port`.
    pub fn new(bind_address: impl Into<String>, base_port: u16) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        SerialServer {
            bind_address: bind_address.into(),
            modems: Vec::new(),
            next_port: u32::from(base_port),
            reserved_ports: HashSet::new(),
            connected_clients: Arc::new(RwLock::new(HashSet::new())),
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    /// Create a server with every modem of `config` registered.
    ///
    /// Explicit ports are reserved first so sequential allocation skips them.
    pub fn from_config(config: &RunnerConfig) -> Result<Self> {
        let mut server = Self::new(config.bind_address.clone(), config.base_port);
        for port in config.modems.iter().filter_map(|m| m.port) {
            server.reserve_port(port);
        }
        for entry in &config.modems {
            server.register_modem(entry.name.clone(), entry.modem.clone(), entry.port)?;
        }
        Ok(server)
    }

    /// Reserve a port so sequential allocation does not use it.
    pub fn reserve_port(&mut self, port: u16) {
        self.reserved_ports.insert(port);
    }

    fn allocate_next_port(&mut self) -> Result<u16> {
        loop {
            let port = u16::try_from(self.next_port)
                .map_err(|_| RunnerError::NoFreePort(u16::MAX))?;
            self.next_port += 1;
            if self.reserved_ports.insert(port) {
                return Ok(port);
            }
        }
    }

    /// Register a modem. `Some(0)` asks the OS for an ephemeral port at
    /// [`start`](Self::start). Returns the port (0 for ephemeral).
    pub fn register_modem(
        &mut self,
        name: impl Into<String>,
        config: ModemConfig,
        requested_port: Option<u16>,
    ) -> Result<u16> {
        let port = match requested_port {
            Some(p) => {
                self.reserved_ports.insert(p);
                p
            }
            None => self.allocate_next_port()?,
        };
        self.modems.push(ModemInfo {
            name: name.into(),
            port,
            config,
        });
        Ok(port)
    }

    /// Bind every listener and start accepting connections.
    ///
    /// Binding happens before this returns, so [`modems`](Self::modems)
    /// reports the real ports afterwards.
    pub async fn start(&mut self) -> Result<()> {
        for info in &mut self.modems {
            let addr = format!("{}:{}", self.bind_address, info.port);
            let listener = TcpListener::bind(&addr).await?;
            info.port = listener.local_addr()?.port();
            info!("{} listening on {}:{}", info.name, self.bind_address, info.port);

            let info = info.clone();
            let clients = self.connected_clients.clone();
            let shutdown = self.shutdown_tx.subscribe();
            self.tasks.push(tokio::spawn(async move {
                let name = info.name.clone();
                if let Err(e) = run_listener(listener, info, clients, shutdown).await {
                    warn!("listener for {} failed: {}", name, e);
                }
            }));
        }
        Ok(())
    }

    /// Stop accepting, end every session and wait for the tasks to finish.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("server task panicked: {}", e);
            }
        }
        info!("serial server stopped");
    }

    /// Registered modems.
    pub fn modems(&self) -> &[ModemInfo] {
        &self.modems
    }

    /// Port of the modem called `name`.
    pub fn port_of(&self, name: &str) -> Option<u16> {
        self.modems.iter().find(|m| m.name == name).map(|m| m.port)
    }

    /// Check if a host is attached to the modem called `name`.
    pub fn is_client_connected(&self, name: &str) -> bool {
        self.connected_clients
            .read()
            .map(|c| c.contains(name))
            .unwrap_or(false)
    }

    /// Print the port table to stderr.
    pub fn print_modem_table(&self) {
        eprintln!();
        eprintln!("┌{}┬{}┬{}┐", "─".repeat(20), "─".repeat(18), "─".repeat(8));
        eprintln!("│ {:^18} │ {:^16} │ {:^6} │", "Modem", "Model", "Port");
        eprintln!("├{}┼{}┼{}┤", "─".repeat(20), "─".repeat(18), "─".repeat(8));
        for info in &self.modems {
            eprintln!(
                "│ {:18} │ {:16} │ {:6} │",
                info.name, info.config.sim.model, info.port
            );
        }
        eprintln!("└{}┴{}┴{}┘", "─".repeat(20), "─".repeat(18), "─".repeat(8));
        eprintln!();
    }
}

/// Accept connections for one modem until shutdown.
async fn run_listener(
    listener: TcpListener,
    info: ModemInfo,
    connected_clients: ConnectedClients,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.changed() => return Ok(()),
        };
        info!("{}: host {} connected", info.name, peer);

        if let Ok(mut clients) = connected_clients.write() {
            clients.insert(info.name.clone());
        }
        metrics::gauge!(metric_defs::SESSIONS_ACTIVE.name).increment(1.0);

        let result = handle_connection(stream, &info, shutdown.clone()).await;

        metrics::gauge!(metric_defs::SESSIONS_ACTIVE.name).decrement(1.0);
        if let Ok(mut clients) = connected_clients.write() {
            clients.remove(&info.name);
        }

        match result {
            Ok(end) => info!("{}: session ended ({:?})", info.name, end),
            Err(e) => warn!("{}: connection error on port {}: {}", info.name, info.port, e),
        }
        if *shutdown.borrow() {
            return Ok(());
        }
    }
}

/// Serve one host connection with a fresh session.
async fn handle_connection(
    mut stream: TcpStream,
    info: &ModemInfo,
    mut shutdown: watch::Receiver<bool>,
) -> Result<SessionEnd> {
    let (mut reader, mut writer) = stream.split();
    let (rx_sender, rx_receiver) = crossbeam_channel::unbounded::<Vec<u8>>();
    let (tx_sender, mut tx_receiver) = mpsc::unbounded_channel::<Vec<u8>>();

    let stop = Arc::new(AtomicBool::new(false));
    let mut session_task = {
        let transport = ChannelTransport::new(rx_receiver, tx_sender, READ_TIMEOUT);
        let name = info.name.clone();
        let config = info.config.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = ModemSession::new(name, transport, &config);
            session.run(&stop)
        })
    };

    let mut read_buf = [0u8; 1024];
    let mut finished = None;

    loop {
        tokio::select! {
            // Host -> session
            result = reader.read(&mut read_buf) => {
                match result {
                    Ok(0) => break,
                    Ok(n) => {
                        if rx_sender.send(read_buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("{}: read failed: {}", info.name, e);
                        break;
                    }
                }
            }

            // Session -> host
            Some(data) = tx_receiver.recv() => {
                writer.write_all(&data).await?;
                writer.flush().await?;
            }

            joined = &mut session_task => {
                finished = Some(joined);
                break;
            }

            _ = shutdown.changed() => break,
        }
    }

    // Disconnect the session and wait for it.
    drop(rx_sender);
    stop.store(true, Ordering::Relaxed);
    let joined = match finished {
        Some(joined) => joined,
        None => session_task.await,
    };

    // Deliver anything the session wrote before it ended.
    while let Ok(data) = tx_receiver.try_recv() {
        if writer.write_all(&data).await.is_err() {
            break;
        }
    }
    let _ = writer.flush().await;

    let end = joined.map_err(|e| RunnerError::Io(io::Error::new(io::ErrorKind::Other, e)))??;
    Ok(end)
}
