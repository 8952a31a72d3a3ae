//! Local display surfaces and keyboard input.
//!
//! - **console**: crossterm surface mirroring the caller's screen for the sysop
//! - **headless**: in-memory grid for nodes without a console, and for tests
//! - **keymapper**: local key events to the raw bytes a caller would send
//! - **cp437**: glyphs for the BBS character set

pub mod console;
pub mod cp437;
pub mod headless;
pub mod keymapper;

pub use console::ConsoleSurface;
pub use headless::{Cell, HeadlessSurface};
pub use keymapper::KeyMapper;
