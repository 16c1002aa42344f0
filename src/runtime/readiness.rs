//! Readiness query abstraction shared by all backends.
//!
//! A query takes a freshly built snapshot of `(key, fd)` interests and fills
//! in the subset that is currently readable or in an error/hangup state.
//! Backends are level-triggered: a handle that still has unread data is
//! reported again on the next query.

use super::mio::MioSelector;
use super::poll::PollSelector;
use super::select::SelectSelector;
use crate::config::Backend;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// One handle the caller wants to be told about when it becomes readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest<K> {
    pub key: K,
    pub fd: RawFd,
}

impl<K> Interest<K> {
    pub fn readable(key: K, fd: RawFd) -> Self {
        Self { key, fd }
    }
}

/// Readiness reported for one interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness<K> {
    pub key: K,
    /// A read will not block.
    pub readable: bool,
    /// The OS reported an error or hangup on the handle.
    pub hangup: bool,
}

/// OS readiness query over a snapshot of interests.
pub trait Selector {
    /// Block for at most `timeout` and append every ready interest to
    /// `ready`, in snapshot order.
    ///
    /// A timeout with nothing ready leaves `ready` untouched. An interrupted
    /// query returns `Ok` with nothing ready so the caller can re-check its
    /// own state before querying again.
    fn select<K: Copy>(
        &mut self,
        interests: &[Interest<K>],
        timeout: Duration,
        ready: &mut Vec<Readiness<K>>,
    ) -> io::Result<()>;
}

/// Selector chosen at startup from configuration.
pub enum AnySelector {
    Select(SelectSelector),
    Poll(PollSelector),
    Mio(MioSelector),
}

impl AnySelector {
    pub fn new(backend: Backend) -> io::Result<Self> {
        Ok(match backend {
            Backend::Select => AnySelector::Select(SelectSelector::new()),
            Backend::Poll => AnySelector::Poll(PollSelector::new()),
            Backend::Mio => AnySelector::Mio(MioSelector::new()?),
        })
    }

    /// Lowest descriptor the backend cannot watch, if it has such a bound.
    pub fn fd_limit(&self) -> Option<RawFd> {
        match self {
            AnySelector::Select(_) => Some(SelectSelector::FD_LIMIT),
            AnySelector::Poll(_) | AnySelector::Mio(_) => None,
        }
    }
}

impl Selector for AnySelector {
    fn select<K: Copy>(
        &mut self,
        interests: &[Interest<K>],
        timeout: Duration,
        ready: &mut Vec<Readiness<K>>,
    ) -> io::Result<()> {
        match self {
            AnySelector::Select(s) => s.select(interests, timeout, ready),
            AnySelector::Poll(s) => s.select(interests, timeout, ready),
            AnySelector::Mio(s) => s.select(interests, timeout, ready),
        }
    }
}

/// Clamp a timeout to whole milliseconds for APIs that take an `i32`.
pub(crate) fn timeout_millis(timeout: Duration) -> libc::c_int {
    timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int
}
