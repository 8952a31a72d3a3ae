//! Bounded field editor
//!
//! A fixed-width input field with insert/overwrite editing and per-field
//! character filtering. Unused cells hold the filler glyph so the user can
//! see how much room is left.

use super::keys::KeyToken;

/// Pad glyph for unused cells (CP437 0xB0)
pub const FILLER: char = '\u{2591}';
/// Byte the filler is sent as
pub const FILLER_BYTE: u8 = 0xB0;
/// Key that finishes the whole form
pub const DONE_KEY: KeyToken = KeyToken::Function(1);

/// Printable ASCII, the only characters a field holds besides filler
fn is_field_char(c: char) -> bool {
    c == ' ' || c.is_ascii_graphic()
}

/// Wire byte for one field cell
pub fn cell_byte(c: char) -> u8 {
    match c {
        FILLER => FILLER_BYTE,
        c if c.is_ascii() => c as u8,
        _ => b'?',
    }
}

/// Which characters a field accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharPolicy {
    Any,
    UppercaseOnly,
    DigitsAndSpace,
    /// Multiple choice: slot `i` may only hold `set[i]` or a space
    FixedSet(Vec<char>),
}

impl CharPolicy {
    /// Build a fixed-set policy from the allowed characters, one per slot
    pub fn fixed_set(allowed: &str) -> Self {
        CharPolicy::FixedSet(allowed.chars().map(|c| c.to_ascii_uppercase()).collect())
    }

    fn is_fixed_set(&self) -> bool {
        matches!(self, CharPolicy::FixedSet(_))
    }
}

/// Where the user wants to go after this field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Done,
    PreviousField,
    NextField,
    Aborted,
}

impl Verdict {
    pub fn is_terminal(self) -> bool {
        self != Verdict::Continue
    }
}

/// Finished field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResult {
    pub text: String,
    pub verdict: Verdict,
}

/// One field being edited
#[derive(Debug, Clone)]
pub struct EditableField {
    buffer: Vec<char>,
    cursor: usize,
    insert_mode: bool,
    policy: CharPolicy,
    verdict: Verdict,
}

impl EditableField {
    /// Start editing `initial`, truncated to `capacity`. Characters a
    /// field cannot hold are dropped.
    pub fn new(initial: &str, capacity: usize, policy: CharPolicy) -> Self {
        let mut buffer: Vec<char> = initial
            .chars()
            .filter(|&c| is_field_char(c))
            .take(capacity)
            .collect();
        buffer.resize(capacity, FILLER);
        Self {
            buffer,
            cursor: 0,
            insert_mode: false,
            policy,
            verdict: Verdict::Continue,
        }
    }

    pub fn with_insert_mode(mut self, insert: bool) -> Self {
        self.insert_mode = insert;
        self
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert_mode(&self) -> bool {
        self.insert_mode
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// All cells, filler included
    pub fn cells(&self) -> &[char] {
        &self.buffer
    }

    /// Cells up to the trailing filler
    pub fn content_len(&self) -> usize {
        self.buffer
            .iter()
            .rposition(|&c| c != FILLER)
            .map_or(0, |i| i + 1)
    }

    /// Current value without trailing filler; vacant cells inside it
    /// read as spaces
    pub fn text(&self) -> String {
        self.buffer[..self.content_len()]
            .iter()
            .map(|&c| if c == FILLER { ' ' } else { c })
            .collect()
    }

    /// Cells as wire bytes, filler as CP437
    pub fn render(&self) -> Vec<u8> {
        self.buffer.iter().map(|&c| cell_byte(c)).collect()
    }

    /// Apply one key. Returns the verdict; anything but `Continue` ends
    /// the edit.
    pub fn step(&mut self, key: KeyToken) -> Verdict {
        if self.verdict.is_terminal() {
            return self.verdict;
        }

        match key {
            KeyToken::Home | KeyToken::Ctrl('A') => self.cursor = 0,
            KeyToken::End | KeyToken::Ctrl('E') => self.cursor = self.content_len(),
            KeyToken::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyToken::Right => {
                if self.cursor < self.content_len() {
                    self.cursor += 1;
                }
            }
            KeyToken::Insert => {
                if !self.policy.is_fixed_set() {
                    self.insert_mode = !self.insert_mode;
                }
            }
            KeyToken::Delete => {
                if !self.policy.is_fixed_set() {
                    self.delete_at(self.cursor);
                }
            }
            KeyToken::Backspace => self.backspace(),
            KeyToken::Char(ch) => self.type_char(ch),
            KeyToken::Return | KeyToken::Tab | KeyToken::Down => self.verdict = Verdict::NextField,
            KeyToken::Escape => self.verdict = Verdict::Aborted,
            KeyToken::Up | KeyToken::Ctrl('O') => self.verdict = Verdict::PreviousField,
            key if key == DONE_KEY => self.verdict = Verdict::Done,
            _ => {}
        }

        self.verdict
    }

    /// Consume the field, returning its trimmed value and verdict
    pub fn finish(self) -> FieldResult {
        FieldResult {
            text: self.text(),
            verdict: self.verdict,
        }
    }

    fn delete_at(&mut self, pos: usize) {
        if pos >= self.buffer.len() {
            return;
        }
        self.buffer.remove(pos);
        self.buffer.push(FILLER);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        if self.insert_mode {
            self.delete_at(self.cursor - 1);
            self.cursor -= 1;
        } else {
            let len = self.content_len();
            self.cursor -= 1;
            self.buffer[self.cursor] = if self.cursor + 1 == len { FILLER } else { ' ' };
        }
    }

    fn type_char(&mut self, ch: char) {
        if !is_field_char(ch) {
            return;
        }
        let ch = match &self.policy {
            CharPolicy::Any => ch,
            CharPolicy::UppercaseOnly => ch.to_ascii_uppercase(),
            CharPolicy::DigitsAndSpace => {
                if !(ch.is_ascii_digit() || ch == ' ') {
                    return;
                }
                ch
            }
            CharPolicy::FixedSet(set) => match Self::select(set, &self.buffer, self.cursor, ch) {
                Some((pos, ch)) => {
                    self.cursor = pos;
                    ch
                }
                None => return,
            },
        };

        let capacity = self.buffer.len();
        if self.cursor >= capacity {
            return;
        }
        if self.insert_mode && !self.policy.is_fixed_set() {
            self.buffer.pop();
            self.buffer.insert(self.cursor, ch);
        } else {
            self.buffer[self.cursor] = ch;
        }
        self.cursor += 1;
    }

    /// Resolve a keypress in a multiple-choice field to (slot, glyph).
    ///
    /// Typing an allowed letter jumps to its slot and toggles it between
    /// the letter and a space. Space clears the current slot; any other
    /// key marks the current slot with its own letter.
    fn select(set: &[char], buffer: &[char], cursor: usize, ch: char) -> Option<(usize, char)> {
        let ch = ch.to_ascii_uppercase();
        if ch == ' ' {
            return Some((cursor, ' '));
        }
        let slots = set.len().min(buffer.len());
        match set[..slots].iter().position(|&allowed| allowed == ch) {
            Some(pos) => {
                let vacant = buffer[pos] == ' ' || buffer[pos] == FILLER;
                Some((pos, if vacant { set[pos] } else { ' ' }))
            }
            None => set.get(cursor).filter(|_| cursor < slots).map(|&c| (cursor, c)),
        }
    }
}
