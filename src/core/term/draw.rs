//! Draw commands and the surface they are painted on

use super::state::Attribute;

/// Primitive effect produced by the escape interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    MoveCursor { x: u16, y: u16 },
    PutChar { ch: u8, attr: Attribute },
    /// Start of the next line, scrolling when already on the bottom row
    LineFeed,
    ClearScreen,
    ClearToEol,
    Bell,
    /// Page is full; the session waits for a key before continuing
    Pause,
}

/// Inclusive screen rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl Region {
    pub fn full(width: u16, height: u16) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width.saturating_sub(1),
            bottom: height.saturating_sub(1),
        }
    }
}

/// Rendering backend the engine draws on
///
/// `put_char` writes at the surface's cursor and advances it by one
/// column. Characters are CP437 bytes.
pub trait DrawSurface {
    fn move_cursor(&mut self, x: u16, y: u16);
    fn put_char(&mut self, ch: u8, attr: Attribute);
    fn line_feed(&mut self);
    fn clear_region(&mut self, region: Region);
    fn clear_to_eol(&mut self);
    fn bell(&mut self) {}
    /// A raw key byte from the local keyboard, if one is waiting
    fn read_key(&mut self) -> Option<u8>;
    fn size(&self) -> (u16, u16);
    fn flush(&mut self) {}
}

impl<S: DrawSurface + ?Sized> DrawSurface for Box<S> {
    fn move_cursor(&mut self, x: u16, y: u16) {
        (**self).move_cursor(x, y)
    }

    fn put_char(&mut self, ch: u8, attr: Attribute) {
        (**self).put_char(ch, attr)
    }

    fn line_feed(&mut self) {
        (**self).line_feed()
    }

    fn clear_region(&mut self, region: Region) {
        (**self).clear_region(region)
    }

    fn clear_to_eol(&mut self) {
        (**self).clear_to_eol()
    }

    fn bell(&mut self) {
        (**self).bell()
    }

    fn read_key(&mut self) -> Option<u8> {
        (**self).read_key()
    }

    fn size(&self) -> (u16, u16) {
        (**self).size()
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}

/// Paint commands on a surface. `Pause` is the caller's business.
pub fn apply(surface: &mut dyn DrawSurface, commands: &[DrawCommand]) {
    for command in commands {
        match *command {
            DrawCommand::MoveCursor { x, y } => surface.move_cursor(x, y),
            DrawCommand::PutChar { ch, attr } => surface.put_char(ch, attr),
            DrawCommand::LineFeed => surface.line_feed(),
            DrawCommand::ClearScreen => {
                let (width, height) = surface.size();
                surface.clear_region(Region::full(width, height));
                surface.move_cursor(0, 0);
            }
            DrawCommand::ClearToEol => surface.clear_to_eol(),
            DrawCommand::Bell => surface.bell(),
            DrawCommand::Pause => {}
        }
    }
}
