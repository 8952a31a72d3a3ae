//! Escape sequence interpreter
//!
//! Consumes output bytes one at a time, collects `ESC [ args letter`
//! sequences, updates the display state and emits draw commands.

use tracing::debug;

use super::draw::DrawCommand;
use super::state::{Attribute, DisplayState};

const ESC: u8 = 0x1B;

/// Hard capacity of the sequence buffer
pub const SEQUENCE_CAPACITY: usize = 80;
/// Unterminated sequences longer than this are thrown away
pub const SEQUENCE_LIMIT: usize = 75;
const MAX_ARGS: usize = 10;

/// ANSI color index to PC attribute color
const COLOR_TABLE: [u8; 8] = [0, 4, 2, 6, 1, 5, 3, 7];

/// Fixed-capacity sequence buffer
struct SequenceBuffer {
    bytes: Vec<u8>,
}

impl SequenceBuffer {
    fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(SEQUENCE_CAPACITY),
        }
    }

    /// Returns false instead of growing past capacity
    fn push(&mut self, byte: u8) -> bool {
        if self.bytes.len() >= SEQUENCE_CAPACITY {
            return false;
        }
        self.bytes.push(byte);
        true
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Numeric arguments between `ESC [` and the final byte
    fn args(&self) -> Vec<u16> {
        let end = self.bytes.len().saturating_sub(1).max(2);
        let body = self.bytes.get(2..end).unwrap_or(&[]);
        body.split(|&b| b == b';')
            .take(MAX_ARGS)
            .map(parse_arg)
            .collect()
    }
}

fn parse_arg(group: &[u8]) -> u16 {
    group
        .iter()
        .filter(|b| b.is_ascii_digit())
        .fold(0u32, |acc, &b| (acc * 10 + (b - b'0') as u32).min(u16::MAX as u32)) as u16
}

fn is_sequence_byte(byte: u8) -> bool {
    byte.is_ascii_digit() || byte == b';' || byte == b'['
}

/// Per-session interpreter state
pub struct EscapeInterpreter {
    collecting: bool,
    buffer: SequenceBuffer,
}

impl Default for EscapeInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl EscapeInterpreter {
    pub fn new() -> Self {
        Self {
            collecting: false,
            buffer: SequenceBuffer::new(),
        }
    }

    /// True while a sequence is being collected
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    fn reset(&mut self) {
        self.collecting = false;
        self.buffer.clear();
    }

    /// Feed a single output byte
    pub fn feed(&mut self, byte: u8, state: &mut DisplayState) -> Vec<DrawCommand> {
        if self.collecting {
            return self.collect(byte, state);
        }

        match byte {
            ESC => {
                self.collecting = true;
                self.buffer.clear();
                self.buffer.push(ESC);
                Vec::new()
            }
            b'\n' => {
                let mut commands = vec![DrawCommand::LineFeed];
                if state.newline() {
                    commands.push(DrawCommand::Pause);
                }
                commands
            }
            b'\r' => {
                state.carriage_return();
                vec![DrawCommand::MoveCursor { x: 0, y: state.cursor_y }]
            }
            0x0C => {
                state.clear_screen();
                vec![DrawCommand::ClearScreen]
            }
            0x07 => vec![DrawCommand::Bell],
            b'\t' => {
                let n = state.tab_width();
                let mut commands = Vec::with_capacity(n as usize + 1);
                for _ in 0..n {
                    commands.push(DrawCommand::PutChar { ch: b' ', attr: state.attribute });
                    if state.advance() {
                        commands.push(self.cursor_command(state));
                    }
                }
                commands
            }
            0x08 => {
                state.backspace();
                vec![self.cursor_command(state)]
            }
            0x00..=0x1F => Vec::new(),
            _ => {
                let mut commands = vec![DrawCommand::PutChar { ch: byte, attr: state.attribute }];
                if state.advance() {
                    commands.push(self.cursor_command(state));
                }
                commands
            }
        }
    }

    fn cursor_command(&self, state: &DisplayState) -> DrawCommand {
        DrawCommand::MoveCursor {
            x: state.cursor_x,
            y: state.cursor_y,
        }
    }

    fn collect(&mut self, byte: u8, state: &mut DisplayState) -> Vec<DrawCommand> {
        if !self.buffer.push(byte) {
            debug!("escape sequence overflowed, discarding");
            self.reset();
            return Vec::new();
        }

        if self.buffer.len() == 2 && byte != b'[' {
            // Not a CSI sequence, or line noise
            self.reset();
            return Vec::new();
        }

        if is_sequence_byte(byte) {
            if self.buffer.len() > SEQUENCE_LIMIT {
                debug!("unterminated escape sequence of {} bytes, discarding", self.buffer.len());
                self.reset();
            }
            return Vec::new();
        }

        let args = self.buffer.args();
        self.reset();
        self.execute(byte, &args, state)
    }

    fn execute(
        &mut self,
        final_byte: u8,
        args: &[u16],
        state: &mut DisplayState,
    ) -> Vec<DrawCommand> {
        let first = args.first().copied().unwrap_or(0);
        let distance = first.max(1);

        match final_byte {
            b'H' | b'f' => {
                let col = args.get(1).copied().unwrap_or(0);
                state.cursor_position(first, col);
                vec![self.cursor_command(state)]
            }
            b'A' => {
                state.cursor_up(distance);
                vec![self.cursor_command(state)]
            }
            b'B' => {
                state.cursor_down(distance);
                vec![self.cursor_command(state)]
            }
            b'C' => {
                state.cursor_forward(distance);
                vec![self.cursor_command(state)]
            }
            b'D' => {
                state.cursor_backward(distance);
                vec![self.cursor_command(state)]
            }
            b's' => {
                state.save_cursor();
                Vec::new()
            }
            b'u' => {
                if state.restore_cursor() {
                    vec![self.cursor_command(state)]
                } else {
                    Vec::new()
                }
            }
            b'J' => {
                if first == 2 {
                    state.clear_screen();
                    vec![DrawCommand::ClearScreen]
                } else {
                    Vec::new()
                }
            }
            b'K' | b'k' => vec![DrawCommand::ClearToEol],
            b'm' => {
                state.attribute = select_graphic_rendition(state.attribute, args);
                Vec::new()
            }
            _ => {
                debug!("ignoring escape sequence ending in {:?}", final_byte as char);
                Vec::new()
            }
        }
    }
}

/// Apply SGR arguments, in order, to an attribute
pub fn select_graphic_rendition(mut attr: Attribute, args: &[u16]) -> Attribute {
    let args: &[u16] = if args.is_empty() { &[0] } else { args };

    for &arg in args {
        attr = match arg {
            0 => Attribute::DEFAULT,
            1 => attr | Attribute::BOLD,
            5 => attr | Attribute::BLINK,
            7 => attr.reversed(),
            // Legacy behavior: 8 blanks the attribute rather than concealing
            8 => Attribute::empty(),
            30..=37 => attr.with_foreground(COLOR_TABLE[(arg - 30) as usize]),
            40..=47 => attr.with_background(COLOR_TABLE[(arg - 40) as usize]),
            _ => attr,
        };
    }
    attr
}

/// SGR sequence that sets exactly `attr`, starting from a reset
pub fn sgr_sequence(attr: Attribute) -> Vec<u8> {
    let mut seq = String::from("\x1b[0");
    if attr.contains(Attribute::BOLD) {
        seq.push_str(";1");
    }
    if attr.contains(Attribute::BLINK) {
        seq.push_str(";5");
    }
    // The colour table is its own inverse
    let fg = COLOR_TABLE[attr.foreground() as usize];
    let bg = COLOR_TABLE[attr.background() as usize];
    seq.push_str(&format!(";3{};4{}m", fg, bg));
    seq.into_bytes()
}
