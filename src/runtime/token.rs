//! Readiness keys for the server event loop.
//!
//! Every entry in a readiness snapshot carries a token identifying what the
//! handle is, so a readiness report can be dispatched without a reverse
//! lookup from raw descriptor to slot.

use std::fmt;

/// Position of a client in the connection table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a handle in the readiness snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// The listening socket.
    Listener,
    /// A connected client.
    Client(SlotId),
}
