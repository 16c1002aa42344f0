//! `select(2)` readiness backend.
//!
//! The read set is rebuilt from the caller's snapshot on every query.
//! `select` only reports readability; errors and hangups surface later as a
//! zero-byte read or a read error on the handle.

use crate::runtime::readiness::{Interest, Readiness, Selector};
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;
use std::time::Duration;

#[derive(Default)]
pub struct SelectSelector;

impl SelectSelector {
    /// Descriptors at or above this value cannot be placed in an `fd_set`.
    pub const FD_LIMIT: RawFd = libc::FD_SETSIZE as RawFd;

    pub fn new() -> Self {
        Self
    }
}

impl Selector for SelectSelector {
    fn select<K: Copy>(
        &mut self,
        interests: &[Interest<K>],
        timeout: Duration,
        ready: &mut Vec<Readiness<K>>,
    ) -> io::Result<()> {
        let mut max_fd = -1;
        for interest in interests {
            if interest.fd < 0 || interest.fd >= Self::FD_LIMIT {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("fd {} outside select() range", interest.fd),
                ));
            }
            max_fd = max_fd.max(interest.fd);
        }

        // SAFETY: FD_ZERO fully initializes the set before it is read, and
        // every fd passed to FD_SET was range-checked above.
        let mut read_set = unsafe {
            let mut set = MaybeUninit::<libc::fd_set>::uninit();
            libc::FD_ZERO(set.as_mut_ptr());
            set.assume_init()
        };
        for interest in interests {
            unsafe { libc::FD_SET(interest.fd, &mut read_set) };
        }

        let mut tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };

        // SAFETY: all pointers refer to live locals for the duration of the call.
        let n = unsafe {
            libc::select(
                max_fd + 1,
                &mut read_set,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut tv,
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

        for interest in interests {
            if unsafe { libc::FD_ISSET(interest.fd, &read_set) } {
                ready.push(Readiness {
                    key: interest.key,
                    readable: true,
                    hangup: false,
                });
            }
        }

        Ok(())
    }
}
