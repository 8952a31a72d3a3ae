//! Key mapping for the local console
//!
//! Converts crossterm key events into the raw bytes a remote caller would
//! send, so sysop keystrokes go through the same decoder as remote ones.
//! Navigation and function keys use the PC extended-key form.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::editor::keys::{KeyToken, EXTENDED_PREFIX};

/// Key mapper for converting key events to node input bytes
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to raw input bytes
    pub fn map(event: &KeyEvent) -> Option<Vec<u8>> {
        match event.code {
            KeyCode::Char(ch) => Self::map_char(ch, event.modifiers),
            KeyCode::Enter => Some(vec![0x0D]),
            KeyCode::Backspace => Some(vec![0x08]),
            KeyCode::Tab => Some(vec![0x09]),
            KeyCode::Esc => Some(vec![0x1B]),

            KeyCode::Up => Self::extended(KeyToken::Up),
            KeyCode::Down => Self::extended(KeyToken::Down),
            KeyCode::Right => Self::extended(KeyToken::Right),
            KeyCode::Left => Self::extended(KeyToken::Left),
            KeyCode::Home => Self::extended(KeyToken::Home),
            KeyCode::End => Self::extended(KeyToken::End),
            KeyCode::PageUp => Self::extended(KeyToken::PageUp),
            KeyCode::PageDown => Self::extended(KeyToken::PageDown),
            KeyCode::Insert => Self::extended(KeyToken::Insert),
            KeyCode::Delete => Self::extended(KeyToken::Delete),
            KeyCode::F(n) => Self::extended(KeyToken::Function(n)),

            _ => None,
        }
    }

    fn map_char(ch: char, mods: KeyModifiers) -> Option<Vec<u8>> {
        // Ctrl + letter = control character
        if mods.contains(KeyModifiers::CONTROL) && ch.is_ascii_alphabetic() {
            return Some(vec![(ch.to_ascii_uppercase() as u8) - b'A' + 1]);
        }

        // The node works in single bytes
        if ch.is_ascii() && !ch.is_ascii_control() {
            Some(vec![ch as u8])
        } else {
            None
        }
    }

    fn extended(key: KeyToken) -> Option<Vec<u8>> {
        key.scan_code().map(|code| vec![EXTENDED_PREFIX, code])
    }
}
