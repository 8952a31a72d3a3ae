//! Field editing.
//!
//! - **keys**: raw bytes to key tokens, including extended-key sequences
//! - **field**: the bounded field buffer and its edit rules
//!
//! [`LineEditor`] ties the two together for callers that have raw bytes.

pub mod field;
pub mod keys;

pub use field::{cell_byte, CharPolicy, EditableField, FieldResult, Verdict, FILLER, FILLER_BYTE};
pub use keys::{KeyDecoder, KeyToken};

/// A field plus the decoder feeding it
pub struct LineEditor {
    decoder: KeyDecoder,
    field: EditableField,
}

impl LineEditor {
    pub fn new(field: EditableField) -> Self {
        Self {
            decoder: KeyDecoder::new(),
            field,
        }
    }

    /// Feed one raw byte; stops at the first terminal verdict
    pub fn feed(&mut self, byte: u8) -> Verdict {
        for key in self.decoder.feed(byte) {
            if self.field.step(key).is_terminal() {
                break;
            }
        }
        self.field.verdict()
    }

    /// Apply an already decoded key
    pub fn step(&mut self, key: KeyToken) -> Verdict {
        self.field.step(key)
    }

    /// Input has gone quiet: resolve a pending lone ESC
    pub fn idle(&mut self) -> Verdict {
        if let Some(key) = self.decoder.flush() {
            self.field.step(key);
        }
        self.field.verdict()
    }

    pub fn field(&self) -> &EditableField {
        &self.field
    }

    pub fn finish(self) -> FieldResult {
        self.field.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_bytes_drive_field() {
        let field = EditableField::new("AB", 5, CharPolicy::Any);
        let mut editor = LineEditor::new(field);
        // End via the extended prefix, then type and finish with F1
        for &b in &[0x00, 79, b'C', b'D'] {
            assert_eq!(editor.feed(b), Verdict::Continue);
        }
        assert_eq!(editor.feed(0xE0), Verdict::Continue);
        assert_eq!(editor.feed(59), Verdict::Done);

        let result = editor.finish();
        assert_eq!(result.text, "ABCD");
        assert_eq!(result.verdict, Verdict::Done);
    }

    #[test]
    fn test_lone_escape_aborts_on_idle() {
        let mut editor = LineEditor::new(EditableField::new("", 4, CharPolicy::Any));
        assert_eq!(editor.feed(0x1B), Verdict::Continue);
        assert_eq!(editor.idle(), Verdict::Aborted);
    }
}
