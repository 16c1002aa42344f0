//! `poll(2)` readiness backend.
//!
//! The pollfd array is rebuilt from the caller's snapshot on every query.
//! Hangup and error conditions (`POLLERR`, `POLLHUP`, `POLLNVAL`) are
//! reported separately from readability.

use crate::runtime::readiness::{timeout_millis, Interest, Readiness, Selector};
use std::io;
use std::time::Duration;

const HANGUP: libc::c_short = libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;

#[derive(Default)]
pub struct PollSelector {
    /// Scratch array, cleared and refilled per query.
    fds: Vec<libc::pollfd>,
}

impl PollSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for PollSelector {
    fn select<K: Copy>(
        &mut self,
        interests: &[Interest<K>],
        timeout: Duration,
        ready: &mut Vec<Readiness<K>>,
    ) -> io::Result<()> {
        self.fds.clear();
        self.fds.extend(interests.iter().map(|interest| libc::pollfd {
            fd: interest.fd,
            events: libc::POLLIN,
            revents: 0,
        }));

        // SAFETY: `fds` is a valid, initialized array of `fds.len()` pollfds
        // that outlives the call.
        let n = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                timeout_millis(timeout),
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        if n == 0 {
            return Ok(());
        }

        for (pfd, interest) in self.fds.iter().zip(interests) {
            if pfd.revents == 0 {
                continue;
            }
            ready.push(Readiness {
                key: interest.key,
                readable: pfd.revents & libc::POLLIN != 0,
                hangup: pfd.revents & HANGUP != 0,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::readiness::tests::{check_interrupted, check_peer_close, check_selector};
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_poll_selector() {
        check_selector(&mut PollSelector::new());
    }

    #[test]
    fn test_poll_peer_close() {
        check_peer_close(&mut PollSelector::new());
    }

    #[test]
    fn test_poll_interrupted_query_returns_empty() {
        check_interrupted(PollSelector::new());
    }

    #[test]
    fn test_poll_reports_reset_as_hangup() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        // Linger of zero turns close into a reset
        socket2::SockRef::from(&client)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
        drop(client);

        let mut selector = PollSelector::new();
        let interests = [Interest::readable(0usize, server_side.as_raw_fd())];
        let mut ready = Vec::new();
        selector
            .select(&interests, Duration::from_secs(1), &mut ready)
            .unwrap();

        assert_eq!(ready.len(), 1);
        assert!(ready[0].hangup);
    }
}
