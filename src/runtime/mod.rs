//! Single-threaded readiness runtime for the echo server.
//!
//! Backends (selected via configuration):
//! - `select`: `select(2)`
//! - `poll`: `poll(2)`
//! - `mio`: epoll on Linux, kqueue on macOS
//!
//! All backends share common abstractions:
//! - `ConnectionTable`: bounded slot table plus the listening socket
//! - `Token`: identifies each handle in a readiness snapshot
//! - `Selector`: level-triggered readiness query over a snapshot

mod connection;
mod event_loop;
mod handler;
mod mio;
mod poll;
pub mod protocol;
pub mod readiness;
mod select;
mod token;

pub use connection::{CapacityExceeded, Connection, ConnectionTable};
pub use event_loop::{EventLoop, LoopState};
pub use handler::{AcceptOutcome, EchoOutcome};
pub use self::mio::MioSelector;
pub use poll::PollSelector;
pub use protocol::EchoProtocol;
pub use readiness::{AnySelector, Interest, Readiness, Selector};
pub use select::SelectSelector;
pub use token::{SlotId, Token};

use crate::config::Config;
use crate::shutdown::Shutdown;

/// Run the server until SIGINT or SIGTERM.
pub fn run(config: Config) -> std::io::Result<()> {
    let shutdown = Shutdown::on_signals()?;
    let event_loop = EventLoop::bind(&config, shutdown)?;
    event_loop.run();
    Ok(())
}
