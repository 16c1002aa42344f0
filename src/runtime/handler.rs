//! Accept and echo handlers invoked by the event loop.
//!
//! Handlers never return errors to the loop. Every outcome, including
//! per-connection failures, is folded into an outcome tag the loop acts on.

use crate::runtime::protocol::EchoProtocol;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use tracing::debug;

/// Result of servicing a readable listener.
#[derive(Debug)]
pub enum AcceptOutcome {
    /// A pending connection, already switched to non-blocking mode.
    Accepted(TcpStream, SocketAddr),
    /// Nothing was pending after all.
    NoneReady,
    /// Unexpected OS failure. The listener stays open.
    Fatal(io::Error),
}

/// Accept at most one pending connection.
pub fn accept(listener: &TcpListener) -> AcceptOutcome {
    match listener.accept() {
        Ok((stream, peer)) => match stream.set_nonblocking(true) {
            Ok(()) => AcceptOutcome::Accepted(stream, peer),
            // Dropping the stream closes it before it is ever used
            Err(e) => AcceptOutcome::Fatal(e),
        },
        Err(ref e) if is_transient(e) => AcceptOutcome::NoneReady,
        // Peer gave up between readiness and accept
        Err(ref e) if e.kind() == io::ErrorKind::ConnectionAborted => AcceptOutcome::NoneReady,
        Err(e) => AcceptOutcome::Fatal(e),
    }
}

/// Result of servicing a readable client.
#[derive(Debug)]
pub enum EchoOutcome {
    /// Connection stays open.
    Ok,
    /// Peer performed an orderly shutdown.
    Closed,
    /// Read or write failed; connection must be dropped.
    Errored(io::Error),
}

/// Read one chunk from `stream` and answer it once.
///
/// `buf` bounds the read size. A short or would-block write drops the unsent
/// remainder without closing the connection.
pub fn echo<S: Read + Write>(
    stream: &mut S,
    buf: &mut [u8],
    protocol: &EchoProtocol,
) -> EchoOutcome {
    let n = match stream.read(buf) {
        Ok(0) => return EchoOutcome::Closed,
        Ok(n) => n,
        Err(ref e) if is_transient(e) => {
            debug!("Spurious readiness, nothing to read");
            return EchoOutcome::Ok;
        }
        Err(e) => return EchoOutcome::Errored(e),
    };

    debug!(bytes = n, "Echoing chunk");
    let response = protocol.respond(&buf[..n]);
    match stream.write(&response) {
        Ok(written) if written < response.len() => {
            debug!(
                written,
                dropped = response.len() - written,
                "Partial write, dropping remainder"
            );
        }
        Ok(_) => {}
        Err(ref e) if is_transient(e) => {
            debug!(dropped = response.len(), "Write would block, dropping response");
        }
        Err(e) => return EchoOutcome::Errored(e),
    }

    EchoOutcome::Ok
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
