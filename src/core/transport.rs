//! Transport primitives
//!
//! The byte-oriented handle a channel sits on. Implemented for TCP sockets
//! and for an in-memory pipe used by headless nodes and tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Channel is already open")]
    AlreadyOpen,

    #[error("Channel is not open")]
    NotOpen,

    #[error("Channel is not suspended for a door")]
    NotSuspended,

    #[error("Door lease belongs to a different channel")]
    ForeignLease,

    #[error("Invalid handle")]
    InvalidHandle,

    #[error("Previous reader has not stopped yet")]
    ReaderStillRunning,

    #[error("Connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Raw operations the channel needs from a connection handle
///
/// `recv` must return within the poll interval (with `WouldBlock` or
/// `TimedOut`) so the reader can observe its stop flag.
pub trait Transport: Send + Sync + 'static {
    /// Read raw bytes. `Ok(0)` means the peer closed.
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send raw bytes, returning how many were taken
    fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// Bound how long `recv` may block
    fn set_poll_interval(&self, interval: Duration) -> io::Result<()>;

    /// Close both directions, waking any blocked `recv`
    fn shutdown(&self) -> io::Result<()>;

    /// A second handle to the same connection, for door programs
    fn duplicate(&self) -> io::Result<Self>
    where
        Self: Sized;

    fn is_connected(&self) -> bool;

    fn peer_address(&self) -> String;

    /// Name the connection presents itself under, if any
    fn remote_name(&self) -> String {
        String::new()
    }
}

impl Transport for TcpStream {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut stream: &TcpStream = self;
        stream.read(buf)
    }

    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let mut stream: &TcpStream = self;
        stream.write(buf)
    }

    fn set_poll_interval(&self, interval: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(interval))
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn duplicate(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn is_connected(&self) -> bool {
        self.peer_addr().is_ok()
    }

    fn peer_address(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|_| String::from("unknown"))
    }

    fn remote_name(&self) -> String {
        String::from("Internet telnet session")
    }
}

/// Shared state behind both ends of a [`MemoryTransport`]
#[derive(Default)]
struct Pipe {
    /// Bytes travelling towards the channel
    to_node: VecDeque<u8>,
    /// Bytes the channel has sent
    from_node: Vec<u8>,
    closed: bool,
    /// Number of upcoming sends that fail with `WouldBlock`
    stalls: usize,
    /// Every send after this fails hard
    broken: bool,
}

/// In-memory transport, the headless stand-in for a socket
#[derive(Clone)]
pub struct MemoryTransport {
    pipe: Arc<(Mutex<Pipe>, Condvar)>,
    poll: Arc<Mutex<Duration>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            pipe: Arc::new((Mutex::new(Pipe::default()), Condvar::new())),
            poll: Arc::new(Mutex::new(Duration::from_millis(10))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pipe> {
        self.pipe.0.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Bytes the remote peer "types"
    pub fn inject(&self, bytes: &[u8]) {
        self.lock().to_node.extend(bytes);
        self.pipe.1.notify_all();
    }

    /// Everything the channel has sent so far, draining it
    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().from_node)
    }

    /// Make the next `n` sends report `WouldBlock`
    pub fn stall_sends(&self, n: usize) {
        self.lock().stalls = n;
    }

    /// Make every following send fail
    pub fn break_sends(&self) {
        self.lock().broken = true;
    }

    /// Simulate the peer hanging up
    pub fn hang_up(&self) {
        self.lock().closed = true;
        self.pipe.1.notify_all();
    }
}

impl Transport for MemoryTransport {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = *self.poll.lock().unwrap_or_else(|p| p.into_inner());
        let mut pipe = self.lock();
        if pipe.to_node.is_empty() && !pipe.closed {
            pipe = match self.pipe.1.wait_timeout(pipe, timeout) {
                Ok((guard, _)) => guard,
                Err(p) => p.into_inner().0,
            };
        }
        if !pipe.to_node.is_empty() {
            let n = buf.len().min(pipe.to_node.len());
            for (slot, byte) in buf.iter_mut().zip(pipe.to_node.drain(..n)) {
                *slot = byte;
            }
            return Ok(n);
        }
        if pipe.closed {
            return Ok(0);
        }
        Err(io::ErrorKind::WouldBlock.into())
    }

    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let mut pipe = self.lock();
        if pipe.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if pipe.broken {
            return Err(io::ErrorKind::ConnectionReset.into());
        }
        if pipe.stalls > 0 {
            pipe.stalls -= 1;
            return Err(io::ErrorKind::WouldBlock.into());
        }
        pipe.from_node.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn set_poll_interval(&self, interval: Duration) -> io::Result<()> {
        *self.poll.lock().unwrap_or_else(|p| p.into_inner()) = interval;
        Ok(())
    }

    fn shutdown(&self) -> io::Result<()> {
        self.hang_up();
        Ok(())
    }

    fn duplicate(&self) -> io::Result<Self> {
        Ok(self.clone())
    }

    fn is_connected(&self) -> bool {
        !self.lock().closed
    }

    fn peer_address(&self) -> String {
        String::from("memory")
    }

    fn remote_name(&self) -> String {
        String::from("In-memory session")
    }
}
