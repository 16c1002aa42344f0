//! Readiness multiplexer loop.
//!
//! Single-threaded and level-triggered. Each iteration:
//!
//! 1. builds a fresh readiness snapshot from the connection table,
//! 2. blocks in the readiness query for at most the poll timeout,
//! 3. accepts one connection if the listener was reported,
//! 4. echoes once on every reported client in ascending slot order, marking
//!    closed or failed clients,
//! 5. sweeps the marked slots out of the table.
//!
//! Slots are removed only in the sweep, after the dispatch pass, so a
//! removal can never shift or skip another slot mid-scan.
//!
//! Once shutdown is requested the loop closes every client, moves to
//! `Stopped` and releases the listener when it is dropped.

use crate::config::Config;
use crate::runtime::connection::{CapacityExceeded, Connection, ConnectionTable};
use crate::runtime::handler::{self, AcceptOutcome, EchoOutcome};
use crate::runtime::protocol::EchoProtocol;
use crate::runtime::readiness::{AnySelector, Readiness, Selector};
use crate::runtime::token::{SlotId, Token};
use crate::shutdown::Shutdown;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Loop lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Why a client is being removed at the end of a pass.
enum CloseReason {
    Orderly,
    Hangup,
    Errored(io::Error),
}

pub struct EventLoop {
    table: ConnectionTable<TcpListener, Connection>,
    selector: AnySelector,
    protocol: EchoProtocol,
    read_buf: Vec<u8>,
    poll_timeout: Duration,
    shutdown: Shutdown,
    state: LoopState,
    /// Accepted descriptors at or above this are rejected.
    fd_limit: Option<RawFd>,
    /// Reused across iterations; cleared before every query.
    ready: Vec<Readiness<Token>>,
}

impl EventLoop {
    /// Create the listening socket and an empty connection table.
    ///
    /// Any failure here is process fatal; nothing is left open on error.
    pub fn bind(config: &Config, shutdown: Shutdown) -> io::Result<Self> {
        let listener = create_listener(config.listen, config.backlog)?;
        let selector = AnySelector::new(config.backend)?;
        let fd_limit = selector.fd_limit();

        if let Some(limit) = fd_limit {
            if listener.as_raw_fd() >= limit {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "listener fd {} is outside the {:?} backend range",
                        listener.as_raw_fd(),
                        config.backend
                    ),
                ));
            }
        }

        info!(
            addr = %listener.local_addr()?,
            backend = ?config.backend,
            max_clients = config.max_clients,
            backlog = config.backlog,
            "Listening"
        );

        Ok(Self {
            table: ConnectionTable::new(listener, config.max_clients),
            selector,
            protocol: EchoProtocol::new(config.prefix.clone()),
            read_buf: vec![0u8; config.chunk_size],
            poll_timeout: config.poll_timeout,
            shutdown,
            state: LoopState::Running,
            fd_limit,
            ready: Vec::with_capacity(config.max_clients + 1),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.table.listener().local_addr()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of connected clients.
    pub fn connection_count(&self) -> usize {
        self.table.len()
    }

    /// Run until shutdown is requested, then close every handle.
    pub fn run(mut self) {
        info!("Waiting for connections");
        while self.state == LoopState::Running {
            if self.shutdown.is_requested() {
                self.stop();
            } else {
                self.turn();
            }
        }
        drop(self);
        info!("Listener closed, event loop stopped");
    }

    /// Close every client and enter `Stopped`. The listener is closed when
    /// the loop is dropped.
    pub fn stop(&mut self) {
        for (slot, conn) in self.table.drain() {
            info!(slot = %slot, peer = %conn.peer, "Closing connection");
            drop(conn);
        }
        self.state = LoopState::Stopped;
    }

    /// One loop iteration. Returns the number of handles reported ready.
    ///
    /// A stopped loop does nothing.
    pub fn turn(&mut self) -> usize {
        if self.state == LoopState::Stopped {
            return 0;
        }

        let interests = self.table.snapshot_for_query();

        self.ready.clear();
        if let Err(e) = self
            .selector
            .select(&interests, self.poll_timeout, &mut self.ready)
        {
            warn!(error = %e, "Readiness query failed");
            return 0;
        }

        let ready = std::mem::take(&mut self.ready);
        let mut closing: Vec<(SlotId, CloseReason)> = Vec::new();

        for readiness in &ready {
            match readiness.key {
                Token::Listener => self.accept_one(),
                Token::Client(slot) => {
                    if readiness.hangup {
                        closing.push((slot, CloseReason::Hangup));
                        continue;
                    }
                    if !readiness.readable {
                        continue;
                    }
                    let Some(conn) = self.table.get_mut(slot) else {
                        continue;
                    };
                    match handler::echo(&mut conn.stream, &mut self.read_buf, &self.protocol) {
                        EchoOutcome::Ok => {}
                        EchoOutcome::Closed => closing.push((slot, CloseReason::Orderly)),
                        EchoOutcome::Errored(e) => closing.push((slot, CloseReason::Errored(e))),
                    }
                }
            }
        }

        for (slot, reason) in closing {
            // Already-empty slots are skipped by remove()
            let Some(conn) = self.table.remove(slot) else {
                continue;
            };
            match reason {
                CloseReason::Orderly => {
                    info!(slot = %slot, peer = %conn.peer, "Client disconnected")
                }
                CloseReason::Hangup => {
                    warn!(slot = %slot, peer = %conn.peer, "Hangup or error on socket, closing")
                }
                CloseReason::Errored(e) => {
                    warn!(slot = %slot, peer = %conn.peer, error = %e, "Connection error, closing")
                }
            }
        }

        let count = ready.len();
        self.ready = ready;
        count
    }

    fn accept_one(&mut self) {
        match handler::accept(self.table.listener()) {
            AcceptOutcome::Accepted(stream, peer) => {
                if let Some(limit) = self.fd_limit {
                    let fd = stream.as_raw_fd();
                    if fd >= limit {
                        warn!(
                            peer = %peer,
                            fd,
                            limit,
                            "Descriptor outside readiness backend range, rejecting connection"
                        );
                        drop(stream);
                        return;
                    }
                }
                match self.table.insert(Connection::new(stream, peer)) {
                    Ok(slot) => info!(
                        slot = %slot,
                        peer = %peer,
                        clients = self.table.len(),
                        "New connection"
                    ),
                    Err(CapacityExceeded(conn)) => {
                        warn!(
                            peer = %conn.peer,
                            max_clients = self.table.capacity(),
                            "Max clients reached, rejecting connection"
                        );
                        drop(conn);
                    }
                }
            }
            AcceptOutcome::NoneReady => debug!("Listener reported ready but nothing to accept"),
            AcceptOutcome::Fatal(e) => error!(error = %e, "Accept failed"),
        }
    }

}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
