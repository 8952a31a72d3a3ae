//! Session management
//!
//! One caller's foreground side. Output runs through the escape interpreter
//! onto the local surface and, escaped, out the channel. Input from the
//! channel and the local keyboard shares one key decoder.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::channel::{ChannelSettings, DoorLease, TransportChannel};
use super::term::{
    apply, sgr_sequence, Attribute, DisplayState, DrawCommand, DrawSurface, EscapeInterpreter,
};
use super::transport::{Result, Transport, TransportError};
use crate::editor::{cell_byte, CharPolicy, EditableField, FieldResult, KeyDecoder, KeyToken};

const PAUSE_PROMPT: &[u8] = b"[PAUSE]";
const ERASE_LINE: &[u8] = b"\r\x1b[K";
/// How often an idle wait rechecks the local keyboard
const INPUT_SLICE: Duration = Duration::from_millis(50);

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub width: u16,
    pub height: u16,
    pub pause_on_page: bool,
    /// Colour fields are drawn in while being edited
    pub edit_attribute: Attribute,
    /// Quiet time after ESC before it counts as the Escape key
    pub escape_timeout: Duration,
    pub channel: ChannelSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            width: 80,
            height: 25,
            pause_on_page: true,
            edit_attribute: Attribute::from_bits_retain(0x1F),
            escape_timeout: Duration::from_millis(250),
            channel: ChannelSettings::default(),
        }
    }
}

/// A connected caller
pub struct Session<T: Transport, S: DrawSurface> {
    channel: TransportChannel<T>,
    state: DisplayState,
    interpreter: EscapeInterpreter,
    decoder: KeyDecoder,
    pending_keys: VecDeque<KeyToken>,
    surface: S,
    settings: SessionSettings,
}

impl<T: Transport, S: DrawSurface> Session<T, S> {
    pub fn new(transport: T, surface: S, settings: SessionSettings) -> Self {
        let state =
            DisplayState::new(settings.width, settings.height).with_pause(settings.pause_on_page);
        Self {
            channel: TransportChannel::new(transport, settings.channel.clone()),
            state,
            interpreter: EscapeInterpreter::new(),
            decoder: KeyDecoder::new(),
            pending_keys: VecDeque::new(),
            surface,
            settings,
        }
    }

    /// Open the channel and start negotiating
    pub fn open(&mut self) -> Result<()> {
        self.channel.open()
    }

    /// Send output to the caller and the local surface.
    ///
    /// Stops for a key at each full page when paging is on.
    pub fn output(&mut self, bytes: &[u8]) -> Result<()> {
        self.channel.begin_batch();
        let mut start = 0;

        for (i, &byte) in bytes.iter().enumerate() {
            let commands = self.interpreter.feed(byte, &mut self.state);
            apply(&mut self.surface, &commands);

            if commands.contains(&DrawCommand::Pause) {
                self.channel.write(&bytes[start..=i], true);
                self.flush_output()?;
                start = i + 1;
                self.pause()?;
                self.channel.begin_batch();
            }
        }

        self.channel.write(&bytes[start..], true);
        self.flush_output()
    }

    pub fn puts(&mut self, text: &str) -> Result<()> {
        self.output(text.as_bytes())
    }

    fn flush_output(&mut self) -> Result<()> {
        self.channel.flush();
        self.surface.flush();
        if self.channel.send_failed() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        debug!("Page full, pausing");
        self.output(PAUSE_PROMPT)?;
        self.wait_key()?;
        self.output(ERASE_LINE)
    }

    /// Next key from the caller or the local keyboard.
    ///
    /// `None` waits indefinitely. Returns `Ok(None)` when the timeout
    /// passes and `Closed` once the connection is gone and drained.
    pub fn read_key(&mut self, timeout: Option<Duration>) -> Result<Option<KeyToken>> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if let Some(key) = self.pending_keys.pop_front() {
                return Ok(Some(key));
            }

            while let Some(byte) = self.surface.read_key() {
                let keys = self.decoder.feed(byte);
                self.pending_keys.extend(keys);
            }
            if !self.pending_keys.is_empty() {
                continue;
            }

            if !self.channel.is_open() && !self.channel.incoming() {
                return Err(TransportError::Closed);
            }

            let escape_pending = self.decoder.escape_pending();
            let wait = match (escape_pending, deadline) {
                (true, _) => self.settings.escape_timeout,
                (false, Some(deadline)) => {
                    INPUT_SLICE.min(deadline.saturating_duration_since(Instant::now()))
                }
                (false, None) => INPUT_SLICE,
            };

            match self.channel.read_byte_timeout(wait) {
                Some(byte) => {
                    let keys = self.decoder.feed(byte);
                    self.pending_keys.extend(keys);
                }
                None if escape_pending => self.pending_keys.extend(self.decoder.flush()),
                None => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn wait_key(&mut self) -> Result<KeyToken> {
        loop {
            if let Some(key) = self.read_key(None)? {
                return Ok(key);
            }
        }
    }

    /// Edit a field at the cursor.
    ///
    /// The field is drawn in the edit colour while it has focus. When it
    /// ends, the value is redrawn space-padded in the colour that was
    /// active before.
    pub fn input_field(
        &mut self,
        initial: &str,
        capacity: usize,
        policy: CharPolicy,
    ) -> Result<FieldResult> {
        let mut field = EditableField::new(initial, capacity, policy);
        let origin = (self.state.cursor_x, self.state.cursor_y);
        let saved = self.state.attribute;

        self.draw_field(&field, origin)?;
        loop {
            let key = self.wait_key()?;
            if field.step(key).is_terminal() {
                break;
            }
            self.draw_field(&field, origin)?;
        }

        let result = field.finish();
        let mut tail = goto_sequence(origin);
        tail.extend(sgr_sequence(saved));
        tail.extend(result.text.chars().map(cell_byte));
        let width = result.text.chars().count();
        tail.resize(tail.len() + capacity.saturating_sub(width), b' ');
        self.output(&tail)?;

        debug!("Field finished with {:?}", result.verdict);
        Ok(result)
    }

    fn draw_field(&mut self, field: &EditableField, origin: (u16, u16)) -> Result<()> {
        let mut bytes = goto_sequence(origin);
        bytes.extend(sgr_sequence(self.settings.edit_attribute));
        bytes.extend(field.render());
        let cursor_x = origin.0.saturating_add(field.cursor() as u16);
        bytes.extend(goto_sequence((cursor_x, origin.1)));
        self.output(&bytes)
    }

    /// Hand the connection to a door program
    pub fn lease_door(&mut self) -> Result<DoorLease<T>> {
        self.pending_keys.clear();
        self.decoder.flush();
        let lease = self.channel.lease_door()?;
        info!("Session {} handed to door", self.channel.id());
        Ok(lease)
    }

    /// Take the connection back after a door exits
    pub fn resume_from_door(&mut self, lease: DoorLease<T>) -> Result<()> {
        self.channel.resume(lease)?;
        info!("Session {} back from door", self.channel.id());
        Ok(())
    }

    pub fn hangup(&mut self) {
        self.channel.close(false);
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_open()
    }

    pub fn channel(&self) -> &TransportChannel<T> {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut TransportChannel<T> {
        &mut self.channel
    }

    pub fn display(&self) -> &DisplayState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

/// Cursor position sequence for a 0-based cell
fn goto_sequence((x, y): (u16, u16)) -> Vec<u8> {
    format!("\x1b[{};{}H", y as u32 + 1, x as u32 + 1).into_bytes()
}
