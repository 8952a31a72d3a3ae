//! Transport channel
//!
//! Owns a connection handle, runs the background reader that unescapes
//! telnet and fills the inbound queue, and escapes outbound writes.

use std::borrow::Cow;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::queue::ByteQueue;
use super::telnet::{escape_iac, TelnetDecoder, IAC, STARTUP_PREAMBLE};
use super::transport::{Result, Transport, TransportError};

/// Largest raw read the reader makes at once
pub const READ_CHUNK: usize = 4096;
const THROTTLE_SLEEP: Duration = Duration::from_millis(10);
const SEND_RETRY_SLEEP: Duration = Duration::from_millis(1);

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Tunables for a channel
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Pass inbound NUL bytes through
    pub binary_mode: bool,
    /// Longest the reader blocks before rechecking its stop flag
    pub poll_interval: Duration,
    /// Queue length above which the reader throttles itself
    pub high_water_mark: usize,
    /// Hard bound on queued inbound bytes
    pub queue_capacity: usize,
    /// How long `close` waits for the reader before abandoning it
    pub shutdown_timeout: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            binary_mode: false,
            poll_interval: Duration::from_millis(100),
            high_water_mark: 16 * 1024,
            queue_capacity: 64 * 1024,
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// Username/password captured by transports that authenticate inline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// What we know about the remote end
#[derive(Debug, Clone, Default)]
pub struct RemoteInfo {
    pub address: String,
    pub display_name: Option<String>,
    credentials: Option<Credentials>,
}

impl RemoteInfo {
    pub fn set_credentials(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
    }

    /// Hand out the captured credentials; they are gone afterwards
    pub fn take_credentials(&mut self) -> Option<Credentials> {
        self.credentials.take()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Forget everything about the previous caller
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Open,
    /// Reader stopped, handle lent to a door program
    Suspended,
}

/// State shared with the reader thread
struct Shared {
    inbound: ByteQueue,
    stop: AtomicBool,
    /// Cleared by the reader when the connection drops
    valid: AtomicBool,
    binary: Arc<AtomicBool>,
    /// Held for each whole send so reader replies never split a write
    send_lock: Mutex<()>,
}

struct Reader {
    join: JoinHandle<TelnetDecoder>,
    /// Disconnects when the reader thread exits
    done: Receiver<()>,
}

/// A second handle to the connection, valid while the channel is suspended
pub struct DoorLease<T: Transport> {
    channel_id: u64,
    handle: T,
}

impl<T: Transport> DoorLease<T> {
    /// The handle to pass to the external program
    pub fn handle(&self) -> &T {
        &self.handle
    }
}

/// One connection's telnet channel
pub struct TransportChannel<T: Transport> {
    id: u64,
    transport: Arc<T>,
    settings: ChannelSettings,
    state: ChannelState,
    /// False once the handle has been shut down for good
    handle_valid: bool,
    shared: Arc<Shared>,
    reader: Option<Reader>,
    /// Reader that missed the shutdown deadline and may still be running
    abandoned: Option<Reader>,
    decoder: Option<TelnetDecoder>,
    send_failed: bool,
    batch: Option<Vec<u8>>,
    remote_info: RemoteInfo,
}

impl<T: Transport> TransportChannel<T> {
    pub fn new(transport: T, settings: ChannelSettings) -> Self {
        let binary = Arc::new(AtomicBool::new(settings.binary_mode));
        let shared = Arc::new(Shared {
            inbound: ByteQueue::new(settings.queue_capacity),
            stop: AtomicBool::new(false),
            valid: AtomicBool::new(false),
            binary: binary.clone(),
            send_lock: Mutex::new(()),
        });
        let name = transport.remote_name();
        let remote_info = RemoteInfo {
            address: transport.peer_address(),
            display_name: (!name.is_empty()).then_some(name),
            ..RemoteInfo::default()
        };

        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            transport: Arc::new(transport),
            settings,
            state: ChannelState::Closed,
            handle_valid: true,
            shared,
            reader: None,
            abandoned: None,
            decoder: Some(TelnetDecoder::new(binary)),
            send_failed: false,
            batch: None,
            remote_info,
        }
    }

    /// Start the reader and send the option preamble.
    ///
    /// Returns once the preamble is sent; replies arrive later.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            ChannelState::Open => return Err(TransportError::AlreadyOpen),
            ChannelState::Suspended => return Err(TransportError::InvalidHandle),
            ChannelState::Closed => {}
        }
        if !self.handle_valid || !self.transport.is_connected() {
            return Err(TransportError::InvalidHandle);
        }

        self.transport.set_poll_interval(self.settings.poll_interval)?;
        self.send_failed = false;
        self.start_reader()?;
        self.state = ChannelState::Open;

        if let Err(e) = send_all(&*self.transport, &self.shared, &STARTUP_PREAMBLE) {
            warn!("Failed to send telnet preamble to {}: {}", self.remote_info.address, e);
            self.close(false);
            return Err(e.into());
        }

        info!("Channel {} opened for {}", self.id, self.remote_info.address);
        Ok(())
    }

    fn start_reader(&mut self) -> Result<()> {
        if !self.reader_stopped() {
            warn!("Reader for channel {} is still running", self.id);
            return Err(TransportError::ReaderStillRunning);
        }
        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.valid.store(true, Ordering::SeqCst);

        let decoder = self
            .decoder
            .take()
            .unwrap_or_else(|| TelnetDecoder::new(self.shared.binary.clone()));
        let transport = self.transport.clone();
        let shared = self.shared.clone();
        let settings = self.settings.clone();
        let (done_tx, done_rx) = mpsc::channel();

        let join = thread::Builder::new()
            .name(format!("channel-{}-reader", self.id))
            .spawn(move || reader_loop(transport, shared, settings, decoder, done_tx))?;

        self.reader = Some(Reader { join, done: done_rx });
        Ok(())
    }

    /// Stop the reader.
    ///
    /// Permanent close also shuts the handle down. Temporary close keeps
    /// the handle valid and leaves the channel suspended.
    pub fn close(&mut self, temporary: bool) {
        if self.state == ChannelState::Closed {
            return;
        }

        let _ = self.flush();
        self.shared.stop.store(true, Ordering::SeqCst);
        if !temporary {
            if let Err(e) = self.transport.shutdown() {
                debug!("Shutdown of channel {} failed: {}", self.id, e);
            }
            self.handle_valid = false;
        }
        self.join_reader();

        if temporary {
            self.state = ChannelState::Suspended;
            debug!("Channel {} suspended", self.id);
        } else {
            self.shared.valid.store(false, Ordering::SeqCst);
            self.state = ChannelState::Closed;
            info!("Channel {} closed", self.id);
        }
    }

    fn join_reader(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };

        match reader.done.recv_timeout(self.settings.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match reader.join.join() {
                Ok(decoder) => self.decoder = Some(decoder),
                Err(_) => warn!("Reader for channel {} panicked", self.id),
            },
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Reader for channel {} did not stop within {:?}, abandoning it",
                    self.id, self.settings.shutdown_timeout
                );
                self.abandoned = Some(reader);
            }
        }
    }

    /// False while a reader abandoned at shutdown is still running.
    ///
    /// Once it has exited, its negotiation state is taken back.
    pub fn reader_stopped(&mut self) -> bool {
        let Some(reader) = self.abandoned.as_ref() else {
            return true;
        };
        if let Err(TryRecvError::Empty) = reader.done.try_recv() {
            return false;
        }
        if let Some(reader) = self.abandoned.take() {
            match reader.join.join() {
                Ok(decoder) => self.decoder = Some(decoder),
                Err(_) => warn!("Reader for channel {} panicked", self.id),
            }
        }
        true
    }

    /// Suspend the channel and lend its handle to a door program
    pub fn lease_door(&mut self) -> Result<DoorLease<T>> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        let handle = self.transport.duplicate()?;
        self.close(true);
        Ok(DoorLease {
            channel_id: self.id,
            handle,
        })
    }

    /// Take the handle back from a door and restart the reader.
    ///
    /// Fails with `ReaderStillRunning` if the reader stopped for the door
    /// has not exited yet.
    pub fn resume(&mut self, lease: DoorLease<T>) -> Result<()> {
        if lease.channel_id != self.id {
            return Err(TransportError::ForeignLease);
        }
        if self.state != ChannelState::Suspended {
            return Err(TransportError::NotSuspended);
        }
        drop(lease);

        self.transport.set_poll_interval(self.settings.poll_interval)?;
        self.start_reader()?;
        self.state = ChannelState::Open;
        debug!("Channel {} resumed", self.id);
        Ok(())
    }

    /// Pop up to `max` decoded bytes without blocking
    pub fn read(&self, max: usize) -> Vec<u8> {
        self.shared.inbound.pop_many(max)
    }

    /// Wait up to `timeout` for one decoded byte
    pub fn read_byte_timeout(&self, timeout: Duration) -> Option<u8> {
        self.shared.inbound.pop_timeout(timeout)
    }

    /// True when decoded bytes are waiting
    pub fn incoming(&self) -> bool {
        self.shared.inbound.has_data()
    }

    /// Number of decoded bytes waiting
    pub fn pending(&self) -> usize {
        self.shared.inbound.len()
    }

    /// Send bytes, doubling IAC when `escape` is set.
    ///
    /// Returns the number of caller bytes taken, or 0 when the channel is
    /// not open or the send failed. A failed send leaves the channel open
    /// but refuses further writes.
    pub fn write(&mut self, bytes: &[u8], escape: bool) -> usize {
        if self.state != ChannelState::Open || self.send_failed || bytes.is_empty() {
            return 0;
        }

        let data: Cow<'_, [u8]> = if escape && bytes.contains(&IAC) {
            Cow::Owned(escape_iac(bytes))
        } else {
            Cow::Borrowed(bytes)
        };

        if let Some(batch) = self.batch.as_mut() {
            batch.extend_from_slice(&data);
            return bytes.len();
        }

        match send_all(&*self.transport, &self.shared, &data) {
            Ok(()) => bytes.len(),
            Err(e) => {
                warn!("Send on channel {} failed: {}", self.id, e);
                self.send_failed = true;
                0
            }
        }
    }

    /// Collect writes until `flush`
    pub fn begin_batch(&mut self) {
        if self.batch.is_none() {
            self.batch = Some(Vec::with_capacity(1024));
        }
    }

    /// Send everything collected since `begin_batch`
    pub fn flush(&mut self) -> usize {
        let Some(batch) = self.batch.take() else {
            return 0;
        };
        if batch.is_empty() || self.state != ChannelState::Open || self.send_failed {
            return 0;
        }
        match send_all(&*self.transport, &self.shared, &batch) {
            Ok(()) => batch.len(),
            Err(e) => {
                warn!("Batched send on channel {} failed: {}", self.id, e);
                self.send_failed = true;
                0
            }
        }
    }

    /// Open and the connection still alive
    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open && self.shared.valid.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether a send has failed since the channel was opened
    pub fn send_failed(&self) -> bool {
        self.send_failed
    }

    pub fn binary_mode(&self) -> bool {
        self.shared.binary.load(Ordering::Relaxed)
    }

    pub fn set_binary_mode(&self, enabled: bool) {
        self.shared.binary.store(enabled, Ordering::Relaxed);
    }

    pub fn remote_info(&self) -> &RemoteInfo {
        &self.remote_info
    }

    pub fn remote_info_mut(&mut self) -> &mut RemoteInfo {
        &mut self.remote_info
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T: Transport> Drop for TransportChannel<T> {
    fn drop(&mut self) {
        self.close(false);
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

/// Send all of `data`, retrying on would-block.
///
/// Both the foreground writer and the reader's negotiation replies come
/// through here, one whole send at a time.
fn send_all<T: Transport>(transport: &T, shared: &Shared, data: &[u8]) -> io::Result<()> {
    let _guard = shared.send_lock.lock().unwrap_or_else(|p| p.into_inner());
    let mut sent = 0;
    while sent < data.len() {
        match transport.send(&data[sent..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => sent += n,
            Err(e) if is_transient(&e) => {
                if !shared.valid.load(Ordering::SeqCst) || shared.stop.load(Ordering::SeqCst) {
                    return Err(io::ErrorKind::NotConnected.into());
                }
                thread::sleep(SEND_RETRY_SLEEP);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn reader_loop<T: Transport>(
    transport: Arc<T>,
    shared: Arc<Shared>,
    settings: ChannelSettings,
    mut decoder: TelnetDecoder,
    _done: Sender<()>,
) -> TelnetDecoder {
    let mut buffer = vec![0u8; READ_CHUNK];

    loop {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }

        // Let a slow consumer catch up
        if shared.inbound.len() > settings.high_water_mark {
            thread::sleep(THROTTLE_SLEEP);
            continue;
        }

        match transport.recv(&mut buffer) {
            Ok(0) => {
                debug!("Remote closed the connection");
                shared.valid.store(false, Ordering::SeqCst);
                break;
            }
            Ok(n) => {
                let decoded = decoder.decode(&buffer[..n]);
                if !decoded.replies.is_empty() {
                    if let Err(e) = send_all(&*transport, &shared, &decoded.replies) {
                        debug!("Failed to send negotiation reply: {}", e);
                    }
                }
                let accepted = shared.inbound.push_slice(&decoded.data);
                if accepted < decoded.data.len() {
                    warn!(
                        "Inbound queue full, dropped {} bytes",
                        decoded.data.len() - accepted
                    );
                }
            }
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                if !shared.stop.load(Ordering::SeqCst) {
                    debug!("Reader stopping on error: {}", e);
                }
                shared.valid.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    decoder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::telnet::{DO, OPT_SGA, WILL};
    use crate::core::transport::MemoryTransport;
    use std::sync::Condvar;
    use std::time::Instant;

    fn settings() -> ChannelSettings {
        ChannelSettings {
            poll_interval: Duration::from_millis(5),
            shutdown_timeout: Duration::from_secs(2),
            ..ChannelSettings::default()
        }
    }

    fn open_channel() -> (MemoryTransport, TransportChannel<MemoryTransport>) {
        open_with(settings())
    }

    fn open_with(
        settings: ChannelSettings,
    ) -> (MemoryTransport, TransportChannel<MemoryTransport>) {
        let wire = MemoryTransport::new();
        let mut channel = TransportChannel::new(wire.clone(), settings);
        channel.open().unwrap();
        (wire, channel)
    }

    fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    /// A handle whose `recv` ignores the poll interval until released
    #[derive(Clone, Default)]
    struct StuckTransport {
        released: Arc<(Mutex<bool>, Condvar)>,
    }

    impl StuckTransport {
        fn release(&self) {
            *self.released.0.lock().unwrap() = true;
            self.released.1.notify_all();
        }
    }

    impl Transport for StuckTransport {
        fn recv(&self, _buf: &mut [u8]) -> io::Result<usize> {
            let (lock, cvar) = &*self.released;
            let mut released = lock.lock().unwrap();
            while !*released {
                released = cvar.wait(released).unwrap();
            }
            drop(released);
            thread::sleep(Duration::from_millis(1));
            Err(io::ErrorKind::WouldBlock.into())
        }

        fn send(&self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn set_poll_interval(&self, _interval: Duration) -> io::Result<()> {
            Ok(())
        }

        fn shutdown(&self) -> io::Result<()> {
            self.release();
            Ok(())
        }

        fn duplicate(&self) -> io::Result<Self> {
            Ok(self.clone())
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn peer_address(&self) -> String {
            String::from("stuck")
        }
    }

    fn open_stuck() -> (StuckTransport, TransportChannel<StuckTransport>) {
        let wire = StuckTransport::default();
        let settings = ChannelSettings {
            shutdown_timeout: Duration::from_millis(50),
            ..settings()
        };
        let mut channel = TransportChannel::new(wire.clone(), settings);
        channel.open().unwrap();
        (wire, channel)
    }

    fn wait_for(channel: &TransportChannel<MemoryTransport>, n: usize) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while out.len() < n && Instant::now() < deadline {
            if let Some(b) = channel.read_byte_timeout(Duration::from_millis(20)) {
                out.push(b);
            }
        }
        out
    }

    #[test]
    fn test_open_sends_preamble() {
        let (wire, channel) = open_channel();
        assert!(channel.is_open());
        assert_eq!(wire.take_sent(), STARTUP_PREAMBLE.to_vec());
    }

    #[test]
    fn test_open_twice_fails() {
        let (_wire, mut channel) = open_channel();
        assert!(matches!(channel.open(), Err(TransportError::AlreadyOpen)));
    }

    #[test]
    fn test_open_on_dead_handle_fails() {
        let wire = MemoryTransport::new();
        wire.hang_up();
        let mut channel = TransportChannel::new(wire, settings());
        assert!(matches!(channel.open(), Err(TransportError::InvalidHandle)));
    }

    #[test]
    fn test_reader_decodes_into_queue() {
        let (wire, channel) = open_channel();
        wire.inject(&[0xFF, 0xFF, 0x41]);
        assert_eq!(wait_for(&channel, 2), vec![0xFF, 0x41]);
        assert!(!channel.incoming());
    }

    #[test]
    fn test_reader_answers_negotiation() {
        let (wire, channel) = open_channel();
        wire.take_sent();
        wire.inject(&[IAC, DO, OPT_SGA, b'x']);
        assert_eq!(wait_for(&channel, 1), b"x".to_vec());
        assert_eq!(wire.take_sent(), vec![IAC, WILL, OPT_SGA]);
    }

    #[test]
    fn test_negotiation_reply_survives_would_block() {
        let (wire, channel) = open_channel();
        wire.take_sent();
        wire.stall_sends(2);
        wire.inject(&[IAC, DO, OPT_SGA, b'x']);
        assert_eq!(wait_for(&channel, 1), b"x".to_vec());
        assert_eq!(wire.take_sent(), vec![IAC, WILL, OPT_SGA]);
    }

    #[test]
    fn test_reader_throttles_at_high_water() {
        let (wire, channel) = open_with(ChannelSettings {
            high_water_mark: 4,
            queue_capacity: 64,
            ..settings()
        });
        wire.inject(&[b'a'; 20]);
        assert!(wait_until(|| channel.pending() == 20));

        // Above the mark the reader leaves new input on the wire
        wire.inject(&[b'b'; 10]);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(channel.pending(), 20);

        assert_eq!(channel.read(100), vec![b'a'; 20]);
        assert_eq!(wait_for(&channel, 10), vec![b'b'; 10]);
    }

    #[test]
    fn test_full_queue_drops_excess() {
        let (wire, channel) = open_with(ChannelSettings {
            queue_capacity: 8,
            ..settings()
        });
        wire.inject(&[b'z'; 20]);
        assert!(wait_until(|| channel.pending() == 8));
        assert_eq!(channel.read(100), vec![b'z'; 8]);

        thread::sleep(Duration::from_millis(30));
        assert!(!channel.incoming());
    }

    #[test]
    fn test_stuck_reader_is_abandoned() {
        let (_wire, mut channel) = open_stuck();
        let started = Instant::now();
        let lease = channel.lease_door().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(channel.state(), ChannelState::Suspended);
        assert!(!channel.reader_stopped());

        // No second reader while the first may still feed the queue
        assert!(matches!(channel.resume(lease), Err(TransportError::ReaderStillRunning)));
        assert_eq!(channel.state(), ChannelState::Suspended);
    }

    #[test]
    fn test_resume_after_abandoned_reader_exits() {
        let (wire, mut channel) = open_stuck();
        let lease = channel.lease_door().unwrap();
        assert!(!channel.reader_stopped());

        wire.release();
        assert!(wait_until(|| channel.reader_stopped()));
        channel.resume(lease).unwrap();
        assert!(channel.is_open());
    }

    #[test]
    fn test_write_escapes_iac() {
        let (wire, mut channel) = open_channel();
        wire.take_sent();
        assert_eq!(channel.write(b"a\xFFb", true), 3);
        assert_eq!(wire.take_sent(), b"a\xFF\xFFb".to_vec());
        assert_eq!(channel.write(b"a\xFFb", false), 3);
        assert_eq!(wire.take_sent(), b"a\xFFb".to_vec());
    }

    #[test]
    fn test_write_retries_would_block() {
        let (wire, mut channel) = open_channel();
        wire.take_sent();
        wire.stall_sends(3);
        assert_eq!(channel.write(b"hello", true), 5);
        assert_eq!(wire.take_sent(), b"hello".to_vec());
    }

    #[test]
    fn test_hard_send_failure_disables_writes() {
        let (wire, mut channel) = open_channel();
        wire.break_sends();
        assert_eq!(channel.write(b"x", true), 0);
        assert!(channel.send_failed());
        assert_eq!(channel.state(), ChannelState::Open);
        assert_eq!(channel.write(b"y", true), 0);
    }

    #[test]
    fn test_batch_sends_once() {
        let (wire, mut channel) = open_channel();
        wire.take_sent();
        channel.begin_batch();
        channel.write(b"one ", true);
        channel.write(b"two", true);
        assert!(wire.take_sent().is_empty());
        assert_eq!(channel.flush(), 7);
        assert_eq!(wire.take_sent(), b"one two".to_vec());
    }

    #[test]
    fn test_write_after_close_is_noop() {
        let (_wire, mut channel) = open_channel();
        channel.close(false);
        assert!(!channel.is_open());
        assert_eq!(channel.write(b"late", true), 0);
        assert!(matches!(channel.open(), Err(TransportError::InvalidHandle)));
    }

    #[test]
    fn test_remote_hangup_marks_invalid() {
        let (wire, channel) = open_channel();
        wire.hang_up();
        let deadline = Instant::now() + Duration::from_secs(5);
        while channel.is_open() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!channel.is_open());
    }

    #[test]
    fn test_door_lease_round_trip() {
        let (wire, mut channel) = open_channel();
        let lease = channel.lease_door().unwrap();
        assert_eq!(channel.state(), ChannelState::Suspended);
        assert!(!channel.is_open());

        // The door talks on the leased handle while we stand aside
        lease.handle().send(b"door").unwrap();
        wire.take_sent();

        channel.resume(lease).unwrap();
        assert!(channel.is_open());
        wire.inject(b"k");
        assert_eq!(wait_for(&channel, 1), b"k".to_vec());
    }

    #[test]
    fn test_foreign_lease_rejected() {
        let (_wire_a, mut a) = open_channel();
        let (_wire_b, mut b) = open_channel();
        let lease = a.lease_door().unwrap();
        b.close(true);
        assert!(matches!(b.resume(lease), Err(TransportError::ForeignLease)));
    }

    #[test]
    fn test_remote_info_names_and_clears() {
        let (_wire, mut channel) = open_channel();
        assert_eq!(channel.remote_info().address, "memory");
        assert_eq!(channel.remote_info().display_name.as_deref(), Some("In-memory session"));

        let info = channel.remote_info_mut();
        info.set_credentials("sysop", "secret");
        info.clear();
        assert!(info.address.is_empty());
        assert!(info.display_name.is_none());
        assert!(!info.has_credentials());
    }

    #[test]
    fn test_credentials_taken_once() {
        let (_wire, mut channel) = open_channel();
        channel.remote_info_mut().set_credentials("sysop", "secret");
        let creds = channel.remote_info_mut().take_credentials().unwrap();
        assert_eq!(creds.username, "sysop");
        assert!(channel.remote_info_mut().take_credentials().is_none());
    }
}
