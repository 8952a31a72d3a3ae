//! Core protocol and display components.
//!
//! - **queue**: bounded inbound byte FIFO shared with the reader thread
//! - **telnet**: IAC escaping, option negotiation and the inbound decoder
//! - **transport**: connection handles (TCP, in-memory)
//! - **channel**: reader thread, outbound escaping and door leases
//! - **term**: display state, escape interpreter and draw surfaces
//! - **session**: one caller's foreground side, tying the above together
//!
//! # Data flow
//!
//! ```text
//! Session
//! ├── output ──> EscapeInterpreter ──> DisplayState + DrawSurface
//! │          └─> TransportChannel::write (IAC escaped) ──> wire
//! └── input  <── KeyDecoder <── ByteQueue <── reader thread <── wire
//! ```

pub mod channel;
pub mod queue;
pub mod session;
pub mod telnet;
pub mod term;
pub mod transport;
