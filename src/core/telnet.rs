//! Telnet wire handling
//!
//! IAC escaping for outbound data, and the inbound scanner that strips
//! control sequences and answers option negotiation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

/// Interpret As Command
pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
/// Subnegotiation begin
pub const SB: u8 = 250;
/// Subnegotiation end
pub const SE: u8 = 240;

pub const OPT_BINARY: u8 = 0;
pub const OPT_ECHO: u8 = 1;
pub const OPT_SGA: u8 = 3;
pub const OPT_LINEMODE: u8 = 34;

/// Sent once when a channel opens: don't echo locally, we echo, no line mode
#[rustfmt::skip]
pub const STARTUP_PREAMBLE: [u8; 9] = [
    IAC, DONT, OPT_ECHO,
    IAC, WILL, OPT_ECHO,
    IAC, DONT, OPT_LINEMODE,
];

/// Double every IAC byte so it travels as data
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let extra = data.iter().filter(|&&b| b == IAC).count();
    let mut out = Vec::with_capacity(data.len() + extra);
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out
}

/// Option state for one side of the connection
#[derive(Clone)]
struct OptionTable([bool; 256]);

impl Default for OptionTable {
    fn default() -> Self {
        Self([false; 256])
    }
}

impl OptionTable {
    fn get(&self, option: u8) -> bool {
        self.0[option as usize]
    }

    fn set(&mut self, option: u8, enabled: bool) -> bool {
        let changed = self.0[option as usize] != enabled;
        self.0[option as usize] = enabled;
        changed
    }
}

/// Answers the peer's option requests
///
/// Only the options the node actually performs are agreed to. A reply is
/// produced only when the option state changes, so a chatty peer cannot
/// drive us into a negotiation loop.
#[derive(Default)]
pub struct Negotiator {
    /// Options we perform (WILL side)
    local: OptionTable,
    /// Options the peer performs (DO side)
    remote: OptionTable,
}

impl Negotiator {
    pub fn new() -> Self {
        let mut negotiator = Self::default();
        // The startup preamble already offered these
        negotiator.local.set(OPT_ECHO, true);
        negotiator
    }

    fn supports_local(option: u8) -> bool {
        matches!(option, OPT_ECHO | OPT_SGA | OPT_BINARY)
    }

    fn supports_remote(option: u8) -> bool {
        matches!(option, OPT_SGA | OPT_BINARY)
    }

    /// Handle `IAC <command> <option>`; returns the reply to send, if any
    pub fn handle(&mut self, command: u8, option: u8) -> Option<[u8; 3]> {
        trace!("telnet negotiation: cmd={} opt={}", command, option);
        match command {
            DO => {
                if Self::supports_local(option) {
                    if self.local.set(option, true) {
                        return Some([IAC, WILL, option]);
                    }
                    None
                } else {
                    Some([IAC, WONT, option])
                }
            }
            DONT => {
                if self.local.set(option, false) {
                    Some([IAC, WONT, option])
                } else {
                    None
                }
            }
            WILL => {
                if Self::supports_remote(option) {
                    if self.remote.set(option, true) {
                        return Some([IAC, DO, option]);
                    }
                    None
                } else if self.remote.get(option) {
                    None
                } else {
                    Some([IAC, DONT, option])
                }
            }
            WONT => {
                if self.remote.set(option, false) {
                    Some([IAC, DONT, option])
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn local_enabled(&self, option: u8) -> bool {
        self.local.get(option)
    }

    pub fn remote_enabled(&self, option: u8) -> bool {
        self.remote.get(option)
    }
}

/// Result of scanning one inbound chunk
#[derive(Debug, Default, PartialEq)]
pub struct Decoded {
    /// Application bytes, telnet sequences removed
    pub data: Vec<u8>,
    /// Negotiation replies to send back to the peer
    pub replies: Vec<u8>,
}

/// Inbound scanner, owned by the channel's reader thread
///
/// NUL bytes are passed through only while the peer transmits in binary
/// (it sent `WILL BINARY`). The NUL of an NVT `CR NUL` pair is always
/// consumed.
pub struct TelnetDecoder {
    negotiator: Negotiator,
    binary: Arc<AtomicBool>,
    /// Last data byte was CR
    after_cr: bool,
}

impl TelnetDecoder {
    pub fn new(binary: Arc<AtomicBool>) -> Self {
        Self {
            negotiator: Negotiator::new(),
            binary,
            after_cr: false,
        }
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    /// Scan one chunk read off the wire.
    ///
    /// Sequences cut off at the end of the chunk are dropped, not carried
    /// over into the next read.
    pub fn decode(&mut self, chunk: &[u8]) -> Decoded {
        let mut out = Decoded::default();
        let mut i = 0;

        while i < chunk.len() {
            let byte = chunk[i];
            if byte != IAC {
                let after_cr = std::mem::replace(&mut self.after_cr, byte == b'\r');
                let keep = byte != 0 || (!after_cr && self.binary.load(Ordering::Relaxed));
                if keep {
                    out.data.push(byte);
                }
                i += 1;
                continue;
            }
            self.after_cr = false;

            let Some(&command) = chunk.get(i + 1) else {
                debug!("dropping lone IAC at end of chunk");
                break;
            };

            match command {
                IAC => {
                    out.data.push(IAC);
                    i += 2;
                }
                WILL | WONT | DO | DONT => {
                    let Some(&option) = chunk.get(i + 2) else {
                        debug!("dropping incomplete telnet command {} at end of chunk", command);
                        break;
                    };
                    let peer_binary = self.negotiator.remote_enabled(OPT_BINARY);
                    if let Some(reply) = self.negotiator.handle(command, option) {
                        out.replies.extend_from_slice(&reply);
                    }
                    let now_binary = self.negotiator.remote_enabled(OPT_BINARY);
                    if now_binary != peer_binary {
                        debug!("peer binary transmission: {}", now_binary);
                        self.binary.store(now_binary, Ordering::Relaxed);
                    }
                    i += 3;
                }
                SB => {
                    match find_subnegotiation_end(&chunk[i + 2..]) {
                        Some(len) => {
                            trace!("skipping subnegotiation of {} bytes", len);
                            i += 2 + len;
                        }
                        None => {
                            debug!("dropping unterminated subnegotiation at end of chunk");
                            break;
                        }
                    }
                }
                _ => {
                    // NOP, GA, AYT and friends carry no option byte
                    trace!("ignoring telnet command {}", command);
                    i += 2;
                }
            }
        }

        out
    }
}

/// Length of a subnegotiation payload including its `IAC SE` trailer
fn find_subnegotiation_end(payload: &[u8]) -> Option<usize> {
    let mut j = 0;
    while j + 1 < payload.len() {
        if payload[j] == IAC {
            if payload[j + 1] == SE {
                return Some(j + 2);
            }
            // Escaped IAC inside the payload
            j += 2;
            continue;
        }
        j += 1;
    }
    None
}
