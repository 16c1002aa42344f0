//! Interactive console client.
//!
//! Multiplexes console input and the server socket through one readiness
//! query. Console lines are forwarded verbatim; a line reading `quit` ends
//! the session locally and is never sent.

pub mod line;

use crate::runtime::{Interest, PollSelector, Readiness, Selector};
use line::{is_quit, LineAssembler};
use std::fs::File;
use std::io::{self, Read, Write};
use std::mem::ManuallyDrop;
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::time::Duration;
use tracing::debug;

/// Console reads and socket reads are both bounded by this size.
pub const CHUNK_SIZE: usize = 1024;

const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Why the client loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// User typed `quit`.
    Quit,
    /// Server closed the connection or the socket reported hangup.
    ServerClosed,
    /// Console reached end of input and the connection went idle.
    ConsoleClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Console,
    Server,
}

/// Unbuffered standard input.
///
/// `std::io::Stdin` buffers internally, which would hide pending lines from
/// the readiness query.
pub struct Console(ManuallyDrop<File>);

impl Console {
    pub fn stdin() -> Self {
        // SAFETY: fd 0 stays open for the life of the process and is never
        // closed through this handle.
        Self(ManuallyDrop::new(unsafe {
            File::from_raw_fd(libc::STDIN_FILENO)
        }))
    }
}

impl Read for Console {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl AsRawFd for Console {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

pub struct Client {
    stream: TcpStream,
    selector: PollSelector,
    poll_timeout: Duration,
    buf: Vec<u8>,
}

impl Client {
    /// Connect with a bounded timeout, then switch the socket to
    /// non-blocking mode.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> io::Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::for_address(addr),
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )?;
        socket.connect_timeout(&addr.into(), timeout)?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            stream: socket.into(),
            selector: PollSelector::new(),
            poll_timeout: POLL_TIMEOUT,
            buf: vec![0u8; CHUNK_SIZE],
        })
    }

    pub fn set_poll_timeout(&mut self, timeout: Duration) {
        self.poll_timeout = timeout;
    }

    /// Drive the session until quit, disconnect, or console exhaustion.
    ///
    /// User-facing messages go to `out`.
    pub fn run<C, W>(&mut self, console: &mut C, out: &mut W) -> io::Result<ClientExit>
    where
        C: Read + AsRawFd,
        W: Write,
    {
        let mut lines = LineAssembler::new(CHUNK_SIZE);
        let mut console_open = true;
        let mut ready: Vec<Readiness<Source>> = Vec::with_capacity(2);

        writeln!(out, "Client ready. Type messages to send (or 'quit' to exit):")?;

        loop {
            let mut interests = Vec::with_capacity(2);
            if console_open {
                interests.push(Interest::readable(Source::Console, console.as_raw_fd()));
            }
            interests.push(Interest::readable(Source::Server, self.stream.as_raw_fd()));

            ready.clear();
            self.selector
                .select(&interests, self.poll_timeout, &mut ready)?;

            if ready.is_empty() && !console_open {
                return Ok(ClientExit::ConsoleClosed);
            }

            for readiness in &ready {
                match readiness.key {
                    Source::Console => match console.read(&mut self.buf) {
                        Ok(0) => {
                            debug!("Console closed");
                            console_open = false;
                            if let Some(rest) = lines.finish() {
                                self.send(&rest, out)?;
                            }
                        }
                        Ok(n) => {
                            for line in lines.push(&self.buf[..n]) {
                                if is_quit(&line) {
                                    writeln!(out, "Closing connection...")?;
                                    return Ok(ClientExit::Quit);
                                }
                                self.send(&line, out)?;
                            }
                        }
                        Err(ref e) if is_transient(e) => {}
                        Err(e) => return Err(e),
                    },
                    Source::Server => {
                        if readiness.readable {
                            match self.stream.read(&mut self.buf) {
                                Ok(0) => {
                                    writeln!(out, "Server disconnected")?;
                                    return Ok(ClientExit::ServerClosed);
                                }
                                Ok(n) => {
                                    let text = response_text(&self.buf[..n]);
                                    writeln!(out, "Server response: {text}")?;
                                }
                                Err(ref e) if is_transient(e) => {}
                                Err(e) => {
                                    writeln!(out, "Read error: {e}")?;
                                    return Err(e);
                                }
                            }
                        }
                        if readiness.hangup {
                            writeln!(out, "Connection error or closed")?;
                            return Ok(ClientExit::ServerClosed);
                        }
                    }
                }
            }
        }
    }

    /// Send one line with a single write. A write that would block drops the
    /// line.
    fn send<W: Write>(&mut self, line: &[u8], out: &mut W) -> io::Result<()> {
        match self.stream.write(line) {
            Ok(n) => writeln!(out, "Message sent ({n} bytes)"),
            Err(ref e) if is_transient(e) => {
                debug!(bytes = line.len(), "Send would block, line dropped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Render one reply chunk for display. A single trailing newline is dropped
/// because the output line supplies its own.
fn response_text(chunk: &[u8]) -> String {
    let chunk = chunk.strip_suffix(b"\n").unwrap_or(chunk);
    String::from_utf8_lossy(chunk).into_owned()
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
