//! Display state, escape interpreter and draw surface interface

pub mod draw;
pub mod parser;
pub mod state;

pub use draw::{apply, DrawCommand, DrawSurface, Region};
pub use parser::{select_graphic_rendition, sgr_sequence, EscapeInterpreter};
pub use state::{Attribute, DisplayState};
