//! mio-based readiness backend.
//!
//! Readiness-based I/O using mio (epoll on Linux, kqueue on macOS).
//!
//! mio registrations are persistent and edge-triggered, which does not match
//! the snapshot model of the event loop. Each query therefore registers the
//! whole snapshot, waits, and deregisters everything before returning: a
//! fresh registration reports the handle's current level, and no
//! registration outlives the query that created it.

use crate::runtime::readiness::{Interest, Readiness, Selector};
use mio::unix::SourceFd;
use mio::{Events, Poll, Token};
use std::io;
use std::time::Duration;

pub struct MioSelector {
    poll: Poll,
    events: Events,
}

impl MioSelector {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(64),
        })
    }

    fn deregister_all<K>(&self, interests: &[Interest<K>]) -> io::Result<()> {
        let mut result = Ok(());
        for interest in interests {
            if let Err(e) = self.poll.registry().deregister(&mut SourceFd(&interest.fd)) {
                result = Err(e);
            }
        }
        result
    }
}

impl Selector for MioSelector {
    fn select<K: Copy>(
        &mut self,
        interests: &[Interest<K>],
        timeout: Duration,
        ready: &mut Vec<Readiness<K>>,
    ) -> io::Result<()> {
        for (i, interest) in interests.iter().enumerate() {
            if let Err(e) = self.poll.registry().register(
                &mut SourceFd(&interest.fd),
                Token(i),
                mio::Interest::READABLE,
            ) {
                let _ = self.deregister_all(&interests[..i]);
                return Err(e);
            }
        }

        if self.events.capacity() < interests.len() {
            self.events = Events::with_capacity(interests.len());
        }

        let polled = self.poll.poll(&mut self.events, Some(timeout));
        let deregistered = self.deregister_all(interests);

        match polled {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return deregistered,
            Err(e) => return Err(e),
        }
        deregistered?;

        // Report in snapshot order regardless of kernel event order
        let mut reported: Vec<(usize, Readiness<K>)> = self
            .events
            .iter()
            .filter_map(|event| {
                let idx = event.token().0;
                let interest = interests.get(idx)?;
                Some((
                    idx,
                    Readiness {
                        key: interest.key,
                        readable: event.is_readable(),
                        hangup: event.is_error()
                            || (event.is_read_closed() && event.is_write_closed()),
                    },
                ))
            })
            .collect();
        reported.sort_by_key(|(idx, _)| *idx);
        ready.extend(reported.into_iter().map(|(_, r)| r));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::readiness::tests::{check_interrupted, check_peer_close, check_selector};
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_mio_selector() {
        check_selector(&mut MioSelector::new().unwrap());
    }

    #[test]
    fn test_mio_peer_close() {
        check_peer_close(&mut MioSelector::new().unwrap());
    }

    #[test]
    fn test_mio_interrupted_query_returns_empty() {
        check_interrupted(MioSelector::new().unwrap());
    }

    #[test]
    fn test_mio_reports_in_snapshot_order() {
        let pairs: Vec<(UnixStream, UnixStream)> =
            (0..4).map(|_| UnixStream::pair().unwrap()).collect();
        for (w, _) in &pairs {
            let mut writer: &UnixStream = w;
            writer.write_all(b"x").unwrap();
        }
        let interests: Vec<Interest<usize>> = pairs
            .iter()
            .enumerate()
            .map(|(i, (_, r))| Interest::readable(i, r.as_raw_fd()))
            .collect();

        let mut selector = MioSelector::new().unwrap();
        let mut ready = Vec::new();
        selector
            .select(&interests, Duration::from_millis(100), &mut ready)
            .unwrap();

        let keys: Vec<usize> = ready.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![0, 1, 2, 3]);
    }
}
