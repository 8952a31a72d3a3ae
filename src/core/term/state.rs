//! Display state
//!
//! What the node believes the remote screen looks like: cursor, current
//! attribute, saved cursor and the page-pause line counter.

use bitflags::bitflags;

bitflags! {
    /// PC text attribute byte
    ///
    /// Foreground in bits 0-2, bold in bit 3, background in bits 4-6 and
    /// blink in bit 7.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Attribute: u8 {
        const FOREGROUND = 0b0000_0111;
        const BOLD       = 0b0000_1000;
        const BACKGROUND = 0b0111_0000;
        const BLINK      = 0b1000_0000;
    }
}

impl Attribute {
    /// Light grey on black
    pub const DEFAULT: Self = Self::from_bits_retain(0x07);

    pub fn foreground(self) -> u8 {
        self.bits() & Self::FOREGROUND.bits()
    }

    pub fn background(self) -> u8 {
        (self.bits() & Self::BACKGROUND.bits()) >> 4
    }

    pub fn with_foreground(self, color: u8) -> Self {
        Self::from_bits_retain((self.bits() & !Self::FOREGROUND.bits()) | (color & 0x07))
    }

    pub fn with_background(self, color: u8) -> Self {
        Self::from_bits_retain((self.bits() & !Self::BACKGROUND.bits()) | ((color & 0x07) << 4))
    }

    /// Swap foreground and background, keeping bold and blink
    pub fn reversed(self) -> Self {
        let keep = self.bits() & (Self::BOLD.bits() | Self::BLINK.bits());
        Self::from_bits_retain(keep | (self.foreground() << 4) | self.background())
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-session screen state
#[derive(Debug, Clone)]
pub struct DisplayState {
    pub cursor_x: u16,
    pub cursor_y: u16,
    pub attribute: Attribute,
    pub saved_cursor: Option<(u16, u16)>,
    pub lines_since_pause: u16,
    pub width: u16,
    /// Rows on the remote screen; also the page length for pausing
    pub height: u16,
    pub pause_on_page: bool,
}

impl DisplayState {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            cursor_x: 0,
            cursor_y: 0,
            attribute: Attribute::DEFAULT,
            saved_cursor: None,
            lines_since_pause: 0,
            width: width.max(1),
            height: height.max(1),
            pause_on_page: false,
        }
    }

    pub fn with_pause(mut self, enabled: bool) -> Self {
        self.pause_on_page = enabled;
        self
    }

    fn max_x(&self) -> u16 {
        self.width - 1
    }

    fn max_y(&self) -> u16 {
        self.height - 1
    }

    /// Absolute position from 1-based row/col; 0 counts as 1
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        self.cursor_y = row.saturating_sub(1).min(self.max_y());
        self.cursor_x = col.saturating_sub(1).min(self.max_x());
    }

    pub fn cursor_up(&mut self, n: u16) {
        self.cursor_y = self.cursor_y.saturating_sub(n);
    }

    pub fn cursor_down(&mut self, n: u16) {
        self.cursor_y = self.cursor_y.saturating_add(n).min(self.max_y());
    }

    pub fn cursor_forward(&mut self, n: u16) {
        self.cursor_x = self.cursor_x.saturating_add(n).min(self.max_x());
    }

    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor_x = self.cursor_x.saturating_sub(n);
    }

    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some((self.cursor_x, self.cursor_y));
    }

    /// Returns false when nothing was saved
    pub fn restore_cursor(&mut self) -> bool {
        match self.saved_cursor {
            Some((x, y)) => {
                self.cursor_x = x.min(self.max_x());
                self.cursor_y = y.min(self.max_y());
                true
            }
            None => false,
        }
    }

    /// Clear screen; the saved cursor survives
    pub fn clear_screen(&mut self) {
        self.cursor_x = 0;
        self.cursor_y = 0;
        self.lines_since_pause = 0;
    }

    pub fn carriage_return(&mut self) {
        self.cursor_x = 0;
    }

    /// Logical newline. Returns true when a page pause is due.
    pub fn newline(&mut self) -> bool {
        self.cursor_x = 0;
        self.cursor_y = (self.cursor_y + 1).min(self.max_y());
        self.lines_since_pause = self.lines_since_pause.saturating_add(1);

        if self.pause_on_page && self.lines_since_pause >= self.height.saturating_sub(1) {
            self.lines_since_pause = 0;
            return true;
        }
        false
    }

    /// Backspace, wrapping to the end of the previous row at the left edge
    pub fn backspace(&mut self) {
        if self.cursor_x == 0 {
            self.cursor_x = self.max_x();
            self.cursor_y = self.cursor_y.saturating_sub(1);
        } else {
            self.cursor_x -= 1;
        }
    }

    /// Step past a printed character. Returns true when the row wrapped.
    pub fn advance(&mut self) -> bool {
        self.cursor_x = (self.cursor_x + 1) % self.width;
        if self.cursor_x == 0 {
            self.cursor_y = (self.cursor_y + 1).min(self.max_y());
            return true;
        }
        false
    }

    /// Columns to the next tab stop, not past the right edge
    pub fn tab_width(&self) -> u16 {
        let next = (self.cursor_x / 8 + 1) * 8;
        next.min(self.width) - self.cursor_x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_parts() {
        let attr = Attribute::from_bits_retain(0x1E);
        assert_eq!(attr.foreground(), 6);
        assert_eq!(attr.background(), 1);
        assert!(attr.contains(Attribute::BOLD));
        assert_eq!(attr.reversed().bits(), 0x69);
    }

    #[test]
    fn test_attribute_colors() {
        let attr = Attribute::DEFAULT.with_background(4).with_foreground(2);
        assert_eq!(attr.bits(), 0x42);
    }

    #[test]
    fn test_cursor_clamps() {
        let mut state = DisplayState::new(80, 24);
        state.cursor_down(100);
        assert_eq!(state.cursor_y, 23);
        state.cursor_forward(500);
        assert_eq!(state.cursor_x, 79);
        state.cursor_up(100);
        state.cursor_backward(100);
        assert_eq!((state.cursor_x, state.cursor_y), (0, 0));
    }

    #[test]
    fn test_advance_wraps() {
        let mut state = DisplayState::new(4, 3);
        state.cursor_x = 3;
        assert!(state.advance());
        assert_eq!((state.cursor_x, state.cursor_y), (0, 1));
    }

    #[test]
    fn test_backspace_wraps_left() {
        let mut state = DisplayState::new(80, 24);
        state.cursor_y = 2;
        state.backspace();
        assert_eq!((state.cursor_x, state.cursor_y), (79, 1));
    }

    #[test]
    fn test_tab_width() {
        let mut state = DisplayState::new(20, 5);
        assert_eq!(state.tab_width(), 8);
        state.cursor_x = 5;
        assert_eq!(state.tab_width(), 3);
        state.cursor_x = 17;
        assert_eq!(state.tab_width(), 3);
    }

    #[test]
    fn test_newline_pause() {
        let mut state = DisplayState::new(80, 4).with_pause(true);
        assert!(!state.newline());
        assert!(!state.newline());
        assert!(state.newline());
        assert_eq!(state.lines_since_pause, 0);
    }

    #[test]
    fn test_saved_cursor_survives_clear() {
        let mut state = DisplayState::new(80, 24);
        state.cursor_position(5, 10);
        state.save_cursor();
        state.clear_screen();
        assert!(state.restore_cursor());
        assert_eq!((state.cursor_x, state.cursor_y), (9, 4));
    }
}
