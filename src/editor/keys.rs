//! Keystroke decoding
//!
//! Turns raw inbound bytes into key tokens. Understands the PC extended-key
//! form (a `0x00` or `0xE0` prefix followed by a scan code) and the ANSI
//! cursor/function sequences most telnet clients send.

/// Prefix bytes that introduce a PC scan code
pub const EXTENDED_PREFIX: u8 = 0x00;
pub const EXTENDED_PREFIX_ALT: u8 = 0xE0;

/// PC scan codes
pub mod scan {
    pub const F1: u8 = 59;
    pub const F10: u8 = 68;
    pub const HOME: u8 = 71;
    pub const UP: u8 = 72;
    pub const PAGE_UP: u8 = 73;
    pub const LEFT: u8 = 75;
    pub const RIGHT: u8 = 77;
    pub const END: u8 = 79;
    pub const DOWN: u8 = 80;
    pub const PAGE_DOWN: u8 = 81;
    pub const INSERT: u8 = 82;
    pub const DELETE: u8 = 83;
}

/// A decoded key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyToken {
    Char(char),
    /// Control letter, e.g. `Ctrl('A')` for 0x01
    Ctrl(char),
    Return,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Function(u8),
}

impl KeyToken {
    /// Key for a PC scan code
    pub fn from_scan_code(code: u8) -> Option<Self> {
        Some(match code {
            scan::F1..=scan::F10 => KeyToken::Function(code - scan::F1 + 1),
            scan::HOME => KeyToken::Home,
            scan::UP => KeyToken::Up,
            scan::PAGE_UP => KeyToken::PageUp,
            scan::LEFT => KeyToken::Left,
            scan::RIGHT => KeyToken::Right,
            scan::END => KeyToken::End,
            scan::DOWN => KeyToken::Down,
            scan::PAGE_DOWN => KeyToken::PageDown,
            scan::INSERT => KeyToken::Insert,
            scan::DELETE => KeyToken::Delete,
            _ => return None,
        })
    }

    /// Scan code for an extended key
    pub fn scan_code(self) -> Option<u8> {
        Some(match self {
            KeyToken::Function(n @ 1..=10) => scan::F1 + n - 1,
            KeyToken::Home => scan::HOME,
            KeyToken::Up => scan::UP,
            KeyToken::PageUp => scan::PAGE_UP,
            KeyToken::Left => scan::LEFT,
            KeyToken::Right => scan::RIGHT,
            KeyToken::End => scan::END,
            KeyToken::Down => scan::DOWN,
            KeyToken::PageDown => scan::PAGE_DOWN,
            KeyToken::Insert => scan::INSERT,
            KeyToken::Delete => scan::DELETE,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum DecodeState {
    #[default]
    Ground,
    /// Prefix seen, waiting for the scan code
    Extended,
    Escape,
    Csi,
    Ss3,
}

/// Byte-at-a-time key decoder
#[derive(Default)]
pub struct KeyDecoder {
    state: DecodeState,
    param: u16,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a lone ESC is waiting to be resolved
    pub fn escape_pending(&self) -> bool {
        self.state == DecodeState::Escape
    }

    /// True while in the middle of any multi-byte key
    pub fn is_pending(&self) -> bool {
        self.state != DecodeState::Ground
    }

    /// Resolve whatever is pending because no more bytes are coming.
    /// A lone ESC becomes the Escape key; partial sequences are dropped.
    pub fn flush(&mut self) -> Option<KeyToken> {
        let pending = self.state;
        self.state = DecodeState::Ground;
        self.param = 0;
        (pending == DecodeState::Escape).then_some(KeyToken::Escape)
    }

    /// Feed one byte; returns the keys it completes (usually zero or one)
    pub fn feed(&mut self, byte: u8) -> Vec<KeyToken> {
        match self.state {
            DecodeState::Ground => self.ground(byte).into_iter().collect(),
            DecodeState::Extended => {
                self.state = DecodeState::Ground;
                KeyToken::from_scan_code(byte).into_iter().collect()
            }
            DecodeState::Escape => match byte {
                b'[' => {
                    self.state = DecodeState::Csi;
                    self.param = 0;
                    Vec::new()
                }
                b'O' => {
                    self.state = DecodeState::Ss3;
                    Vec::new()
                }
                0x1B => vec![KeyToken::Escape],
                _ => {
                    // ESC followed by something unrelated: both are keys
                    self.state = DecodeState::Ground;
                    let mut keys = vec![KeyToken::Escape];
                    keys.extend(self.ground(byte));
                    keys
                }
            },
            DecodeState::Csi => self.csi(byte).into_iter().collect(),
            DecodeState::Ss3 => {
                self.state = DecodeState::Ground;
                let key = match byte {
                    b'P' => Some(KeyToken::Function(1)),
                    b'Q' => Some(KeyToken::Function(2)),
                    b'R' => Some(KeyToken::Function(3)),
                    b'S' => Some(KeyToken::Function(4)),
                    _ => cursor_final(byte),
                };
                key.into_iter().collect()
            }
        }
    }

    fn ground(&mut self, byte: u8) -> Option<KeyToken> {
        match byte {
            EXTENDED_PREFIX | EXTENDED_PREFIX_ALT => {
                self.state = DecodeState::Extended;
                None
            }
            0x1B => {
                self.state = DecodeState::Escape;
                None
            }
            0x08 | 0x7F => Some(KeyToken::Backspace),
            b'\t' => Some(KeyToken::Tab),
            b'\r' => Some(KeyToken::Return),
            // CR LF from line-oriented clients
            b'\n' => None,
            0x01..=0x1A => Some(KeyToken::Ctrl((b'A' + byte - 1) as char)),
            0x20..=0x7E => Some(KeyToken::Char(byte as char)),
            _ => None,
        }
    }

    fn csi(&mut self, byte: u8) -> Option<KeyToken> {
        if byte.is_ascii_digit() {
            self.param = self.param.saturating_mul(10).saturating_add((byte - b'0') as u16);
            return None;
        }
        if byte == b';' {
            // Modifier parameters are not distinguished
            return None;
        }

        self.state = DecodeState::Ground;
        let param = std::mem::take(&mut self.param);
        if byte == b'~' {
            return match param {
                1 | 7 => Some(KeyToken::Home),
                2 => Some(KeyToken::Insert),
                3 => Some(KeyToken::Delete),
                4 | 8 => Some(KeyToken::End),
                5 => Some(KeyToken::PageUp),
                6 => Some(KeyToken::PageDown),
                11..=15 => Some(KeyToken::Function((param - 10) as u8)),
                17..=21 => Some(KeyToken::Function((param - 11) as u8)),
                _ => None,
            };
        }
        cursor_final(byte)
    }
}

fn cursor_final(byte: u8) -> Option<KeyToken> {
    match byte {
        b'A' => Some(KeyToken::Up),
        b'B' => Some(KeyToken::Down),
        b'C' => Some(KeyToken::Right),
        b'D' => Some(KeyToken::Left),
        b'H' => Some(KeyToken::Home),
        b'F' | b'K' => Some(KeyToken::End),
        _ => None,
    }
}
