//! In-memory surface
//!
//! A character grid with no terminal behind it. Used when the node runs
//! without a local console, and in tests to inspect what was drawn.

use std::collections::VecDeque;

use super::cp437;
use crate::core::term::{Attribute, DrawSurface, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: u8,
    pub attr: Attribute,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: b' ',
            attr: Attribute::DEFAULT,
        }
    }
}

pub struct HeadlessSurface {
    width: u16,
    height: u16,
    cells: Vec<Vec<Cell>>,
    cursor: (u16, u16),
    keys: VecDeque<u8>,
    bells: usize,
}

impl HeadlessSurface {
    pub fn new(width: u16, height: u16) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![vec![Cell::default(); width as usize]; height as usize],
            cursor: (0, 0),
            keys: VecDeque::new(),
            bells: 0,
        }
    }

    /// Queue bytes as if typed on the local keyboard
    pub fn push_keys(&mut self, bytes: &[u8]) {
        self.keys.extend(bytes);
    }

    pub fn cursor(&self) -> (u16, u16) {
        self.cursor
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<Cell> {
        self.cells
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
    }

    /// Row text with trailing blanks trimmed
    pub fn row_text(&self, y: u16) -> String {
        self.cells
            .get(y as usize)
            .map(|row| {
                let text: String = row.iter().map(|c| cp437::to_char(c.ch)).collect();
                text.trim_end().to_string()
            })
            .unwrap_or_default()
    }

    pub fn bells(&self) -> usize {
        self.bells
    }

    fn scroll_up(&mut self) {
        self.cells.remove(0);
        self.cells.push(vec![Cell::default(); self.width as usize]);
    }
}

impl DrawSurface for HeadlessSurface {
    fn move_cursor(&mut self, x: u16, y: u16) {
        self.cursor = (x.min(self.width - 1), y.min(self.height - 1));
    }

    fn put_char(&mut self, ch: u8, attr: Attribute) {
        let (x, y) = self.cursor;
        self.cells[y as usize][x as usize] = Cell { ch, attr };
        // The interpreter repositions explicitly on wrap
        if x + 1 < self.width {
            self.cursor.0 = x + 1;
        }
    }

    fn line_feed(&mut self) {
        self.cursor.0 = 0;
        if self.cursor.1 + 1 >= self.height {
            self.scroll_up();
        } else {
            self.cursor.1 += 1;
        }
    }

    fn clear_region(&mut self, region: Region) {
        let right = region.right.min(self.width - 1);
        let bottom = region.bottom.min(self.height - 1);
        for y in region.top..=bottom {
            for x in region.left..=right {
                self.cells[y as usize][x as usize] = Cell::default();
            }
        }
    }

    fn clear_to_eol(&mut self) {
        let (x, y) = self.cursor;
        for cell in &mut self.cells[y as usize][x as usize..] {
            *cell = Cell::default();
        }
    }

    fn bell(&mut self) {
        self.bells += 1;
    }

    fn read_key(&mut self) -> Option<u8> {
        self.keys.pop_front()
    }

    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }
}
