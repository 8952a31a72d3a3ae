//! bbsterm - terminal protocol and field editing for telnet BBS nodes
//!
//! Drives a remote ANSI terminal over telnet: interprets outgoing escape
//! sequences to keep a model of the caller's screen, mirrors it on a local
//! surface, negotiates telnet options and unescapes inbound bytes on a
//! background reader, and edits bounded input fields from decoded keys.

pub mod config;
pub mod core;
pub mod editor;
pub mod ui;

pub use crate::config::Config;
pub use crate::core::channel::{ChannelSettings, ChannelState, DoorLease, TransportChannel};
pub use crate::core::session::{Session, SessionSettings};
pub use crate::core::transport::{MemoryTransport, Transport, TransportError};
pub use crate::editor::{CharPolicy, EditableField, FieldResult, KeyToken, LineEditor, Verdict};
