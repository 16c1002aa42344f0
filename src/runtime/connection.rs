//! Connection table for the server event loop.
//!
//! Holds the listening socket in a fixed position plus a bounded array of
//! client slots. The table is owned by the loop thread; callers outside the
//! runtime never see slot indices.

use crate::runtime::readiness::Interest;
use crate::runtime::token::{SlotId, Token};
use std::fmt;
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};

/// A connected client.
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

/// Insert failed because every client slot is occupied.
///
/// Carries the rejected handle back so the caller decides how to close it.
pub struct CapacityExceeded<C>(pub C);

impl<C> fmt::Debug for CapacityExceeded<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CapacityExceeded")
    }
}

/// Bounded slot table of client handles plus the listening handle.
///
/// Slots never shift: removing a client only empties its slot, so a slot id
/// taken from a readiness snapshot stays valid (or harmlessly empty) for the
/// whole dispatch pass.
pub struct ConnectionTable<L, C> {
    listener: L,
    slots: Vec<Option<C>>,
    len: usize,
}

impl<L, C> ConnectionTable<L, C> {
    /// Create a table with `max_clients` empty client slots.
    pub fn new(listener: L, max_clients: usize) -> Self {
        let mut slots = Vec::with_capacity(max_clients);
        slots.resize_with(max_clients, || None);
        Self {
            listener,
            slots,
            len: 0,
        }
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Place a client in the lowest-numbered free slot.
    pub fn insert(&mut self, conn: C) -> Result<SlotId, CapacityExceeded<C>> {
        match self.slots.iter().position(Option::is_none) {
            Some(idx) => {
                self.slots[idx] = Some(conn);
                self.len += 1;
                Ok(SlotId(idx))
            }
            None => Err(CapacityExceeded(conn)),
        }
    }

    /// Empty a slot, returning its client.
    ///
    /// Removing an empty or out-of-range slot is a no-op.
    pub fn remove(&mut self, slot: SlotId) -> Option<C> {
        let conn = self.slots.get_mut(slot.0)?.take()?;
        self.len -= 1;
        Some(conn)
    }

    pub fn get(&self, slot: SlotId) -> Option<&C> {
        self.slots.get(slot.0)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut C> {
        self.slots.get_mut(slot.0)?.as_mut()
    }

    /// Number of occupied client slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of clients.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Occupied slots in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &C)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|conn| (SlotId(idx), conn)))
    }

    /// Take every client out of the table, leaving all slots empty.
    pub fn drain(&mut self) -> Vec<(SlotId, C)> {
        self.len = 0;
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, slot)| slot.take().map(|conn| (SlotId(idx), conn)))
            .collect()
    }
}

impl<L: AsRawFd, C: AsRawFd> ConnectionTable<L, C> {
    /// Build the readiness query set: the listener first, then every
    /// occupied slot in ascending order, all with read interest.
    pub fn snapshot_for_query(&self) -> Vec<Interest<Token>> {
        let mut interests = Vec::with_capacity(self.len + 1);
        interests.push(Interest::readable(Token::Listener, self.listener.as_raw_fd()));
        interests.extend(
            self.iter()
                .map(|(slot, conn)| Interest::readable(Token::Client(slot), conn.as_raw_fd())),
        );

        debug_assert!(
            {
                let mut fds: Vec<RawFd> = interests.iter().map(|i| i.fd).collect();
                fds.sort_unstable();
                fds.windows(2).all(|w| w[0] != w[1])
            },
            "duplicate handle in connection table"
        );

        interests
    }
}
