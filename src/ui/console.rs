//! Local console surface using crossterm
//!
//! Mirrors the caller's screen on the sysop's terminal and feeds local
//! keystrokes back into the node.

use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::{
    cursor::{MoveTo, Show},
    event::{self, Event, KeyEventKind},
    execute, queue,
    style::{self, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::{debug, warn};

use super::cp437;
use super::keymapper::KeyMapper;
use crate::core::term::{Attribute, DrawSurface, Region};

/// PC colour index to crossterm colour
fn pc_color(index: u8) -> Color {
    match index & 0x0F {
        0 => Color::Black,
        1 => Color::DarkBlue,
        2 => Color::DarkGreen,
        3 => Color::DarkCyan,
        4 => Color::DarkRed,
        5 => Color::DarkMagenta,
        6 => Color::DarkYellow,
        7 => Color::Grey,
        8 => Color::DarkGrey,
        9 => Color::Blue,
        10 => Color::Green,
        11 => Color::Cyan,
        12 => Color::Red,
        13 => Color::Magenta,
        14 => Color::Yellow,
        _ => Color::White,
    }
}

/// Console surface
pub struct ConsoleSurface {
    stdout: Stdout,
    width: u16,
    height: u16,
    /// Attribute last sent to the terminal
    current: Option<Attribute>,
    /// Bytes of a multi-byte key not yet handed out
    pending_keys: VecDeque<u8>,
    initialized: bool,
}

impl ConsoleSurface {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            stdout: io::stdout(),
            width,
            height,
            current: None,
            pending_keys: VecDeque::new(),
            initialized: false,
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.stdout,
            EnterAlternateScreen,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        self.initialized = true;
        debug!("Console surface initialized ({}x{})", self.width, self.height);
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let _ = execute!(self.stdout, ResetColor, SetAttribute(style::Attribute::Reset));
        let _ = execute!(self.stdout, Show);
        let _ = execute!(self.stdout, LeaveAlternateScreen);
        terminal::disable_raw_mode()
    }

    fn set_attribute(&mut self, attr: Attribute) -> io::Result<()> {
        if self.current == Some(attr) {
            return Ok(());
        }
        let mut fg = attr.foreground();
        if attr.contains(Attribute::BOLD) {
            fg += 8;
        }
        queue!(
            self.stdout,
            SetAttribute(style::Attribute::Reset),
            SetForegroundColor(pc_color(fg)),
            SetBackgroundColor(pc_color(attr.background()))
        )?;
        if attr.contains(Attribute::BLINK) {
            queue!(self.stdout, SetAttribute(style::Attribute::SlowBlink))?;
        }
        self.current = Some(attr);
        Ok(())
    }

    fn log_error(result: io::Result<()>) {
        if let Err(e) = result {
            warn!("Console write failed: {}", e);
        }
    }
}

impl DrawSurface for ConsoleSurface {
    fn move_cursor(&mut self, x: u16, y: u16) {
        Self::log_error(queue!(self.stdout, MoveTo(x, y)));
    }

    fn put_char(&mut self, ch: u8, attr: Attribute) {
        let result = self
            .set_attribute(attr)
            .and_then(|_| queue!(self.stdout, Print(cp437::to_char(ch))));
        Self::log_error(result);
    }

    fn line_feed(&mut self) {
        // Raw mode: LF alone keeps the column
        Self::log_error(queue!(self.stdout, Print("\r\n")));
    }

    fn clear_region(&mut self, region: Region) {
        if region == Region::full(self.width, self.height) {
            Self::log_error(queue!(self.stdout, ResetColor, Clear(ClearType::All)));
            self.current = None;
            return;
        }
        let blank = " ".repeat((region.right.saturating_sub(region.left) + 1) as usize);
        for row in region.top..=region.bottom {
            Self::log_error(queue!(self.stdout, MoveTo(region.left, row), Print(&blank)));
        }
    }

    fn clear_to_eol(&mut self) {
        Self::log_error(queue!(self.stdout, Clear(ClearType::UntilNewLine)));
    }

    fn bell(&mut self) {
        Self::log_error(queue!(self.stdout, Print('\x07')));
    }

    fn read_key(&mut self) -> Option<u8> {
        if let Some(byte) = self.pending_keys.pop_front() {
            return Some(byte);
        }
        while event::poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                    if let Some(bytes) = KeyMapper::map(&key) {
                        self.pending_keys.extend(bytes);
                        return self.pending_keys.pop_front();
                    }
                }
                Ok(Event::Resize(w, h)) => debug!("Console resized to {}x{}", w, h),
                Ok(_) => {}
                Err(e) => {
                    warn!("Console read failed: {}", e);
                    return None;
                }
            }
        }
        None
    }

    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn flush(&mut self) {
        Self::log_error(self.stdout.flush());
    }
}

impl Drop for ConsoleSurface {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pc_colors() {
        assert_eq!(pc_color(0), Color::Black);
        assert_eq!(pc_color(4), Color::DarkRed);
        assert_eq!(pc_color(7), Color::Grey);
        assert_eq!(pc_color(7 + 8), Color::White);
        assert_eq!(pc_color(1 + 8), Color::Blue);
    }
}
