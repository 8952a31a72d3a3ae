//! Property-based invariant tests for bbsterm.
//!
//! Verifies:
//! 1. SGR handling is a pure function of the starting attribute and arguments
//! 2. Cursor stays inside the screen for any output byte stream
//! 3. IAC escaping followed by inbound decoding is the identity
//! 4. Multiple-choice fields never hold more marks than allowed choices
//! 5. Edited fields never outgrow their capacity
//! 6. Key decoding never panics and leaves no pending state after a flush
//! 7. Overlong unterminated escape sequences are discarded

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bbsterm::core::telnet::{escape_iac, TelnetDecoder};
use bbsterm::core::term::{
    select_graphic_rendition, Attribute, DisplayState, DrawCommand, EscapeInterpreter,
};
use bbsterm::editor::{CharPolicy, EditableField, KeyDecoder, KeyToken, FILLER};
use proptest::prelude::*;

// ── Strategy helpers ──────────────────────────────────────────────────

fn dims() -> impl Strategy<Value = (u16, u16)> {
    (1u16..=132, 1u16..=60)
}

fn arb_attribute() -> impl Strategy<Value = Attribute> {
    any::<u8>().prop_map(Attribute::from_bits_retain)
}

fn arb_sgr_args() -> impl Strategy<Value = Vec<u16>> {
    proptest::collection::vec(
        prop_oneof![
            Just(0u16),
            Just(1),
            Just(5),
            Just(7),
            Just(8),
            30u16..=37,
            40u16..=47,
            0u16..=99,
        ],
        1..=10,
    )
}

/// Output streams biased towards escape sequences
fn arb_output() -> impl Strategy<Value = Vec<u8>> {
    let chunk = prop_oneof![
        proptest::collection::vec(any::<u8>(), 1..8),
        (0u16..200, 0u16..200).prop_map(|(r, c)| format!("\x1b[{};{}H", r, c).into_bytes()),
        (0u16..300, prop_oneof![Just('A'), Just('B'), Just('C'), Just('D')])
            .prop_map(|(n, f)| format!("\x1b[{}{}", n, f).into_bytes()),
        Just(b"\x1b[s".to_vec()),
        Just(b"\x1b[u".to_vec()),
        Just(b"\x1b[2J".to_vec()),
        Just(b"\r\n".to_vec()),
        Just(b"\x08\x08\t".to_vec()),
    ];
    proptest::collection::vec(chunk, 0..64).prop_map(|chunks| chunks.concat())
}

fn arb_key() -> impl Strategy<Value = KeyToken> {
    prop_oneof![
        (0x20u8..0x7F).prop_map(|b| KeyToken::Char(b as char)),
        Just(KeyToken::Backspace),
        Just(KeyToken::Delete),
        Just(KeyToken::Insert),
        Just(KeyToken::Left),
        Just(KeyToken::Right),
        Just(KeyToken::Home),
        Just(KeyToken::End),
        Just(KeyToken::Ctrl('A')),
        Just(KeyToken::Ctrl('E')),
    ]
}

fn is_mark(c: char) -> bool {
    c != ' ' && c != FILLER
}

// ── SGR ───────────────────────────────────────────────────────────────

proptest! {
    /// Same start and arguments always give the same attribute.
    #[test]
    fn sgr_is_deterministic(start in arb_attribute(), args in arb_sgr_args()) {
        prop_assert_eq!(
            select_graphic_rendition(start, &args),
            select_graphic_rendition(start, &args)
        );
    }

    /// Arguments apply left to right, so splitting the list changes nothing.
    #[test]
    fn sgr_split_equivalence(
        start in arb_attribute(),
        args in arb_sgr_args(),
        split in 0usize..10,
    ) {
        let split = split.min(args.len());
        let (head, tail) = args.split_at(split);
        let stepwise = if head.is_empty() {
            start
        } else {
            select_graphic_rendition(start, head)
        };
        let stepwise = if tail.is_empty() {
            stepwise
        } else {
            select_graphic_rendition(stepwise, tail)
        };
        prop_assert_eq!(stepwise, select_graphic_rendition(start, &args));
    }

    /// The interpreter's `m` handling matches the pure function and draws nothing.
    #[test]
    fn sgr_through_interpreter(start in arb_attribute(), args in arb_sgr_args()) {
        let text: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let seq = format!("\x1b[{}m", text.join(";"));

        let mut state = DisplayState::new(80, 25);
        state.attribute = start;
        let mut interp = EscapeInterpreter::new();
        let commands: Vec<DrawCommand> =
            seq.bytes().flat_map(|b| interp.feed(b, &mut state)).collect();

        prop_assert!(commands.is_empty());
        prop_assert_eq!(state.attribute, select_graphic_rendition(start, &args));
    }
}

// ── Cursor bounds ─────────────────────────────────────────────────────

proptest! {
    /// No output stream moves the cursor off the screen.
    #[test]
    fn cursor_stays_on_screen((w, h) in dims(), bytes in arb_output()) {
        let mut state = DisplayState::new(w, h);
        let mut interp = EscapeInterpreter::new();
        for &b in &bytes {
            for command in interp.feed(b, &mut state) {
                if let DrawCommand::MoveCursor { x, y } = command {
                    prop_assert!(x < w && y < h, "move to ({}, {}) on {}x{}", x, y, w, h);
                }
            }
            prop_assert!(state.cursor_x < w);
            prop_assert!(state.cursor_y < h);
        }
    }

    /// Arbitrary bytes never panic the interpreter.
    #[test]
    fn interpreter_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let mut state = DisplayState::new(80, 25).with_pause(true);
        let mut interp = EscapeInterpreter::new();
        for &b in &bytes {
            let _ = interp.feed(b, &mut state);
        }
    }
}

// ── Telnet ────────────────────────────────────────────────────────────

proptest! {
    /// Escaped data decodes back to itself with nothing to reply.
    #[test]
    fn iac_escape_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        // CR NUL is the NVT line ending and decodes to a bare CR
        prop_assume!(!data.windows(2).any(|w| w == b"\r\0"));
        let mut decoder = TelnetDecoder::new(Arc::new(AtomicBool::new(true)));
        let decoded = decoder.decode(&escape_iac(&data));
        prop_assert_eq!(decoded.data, data);
        prop_assert!(decoded.replies.is_empty());
    }

    /// Escaping only ever doubles 0xFF.
    #[test]
    fn iac_escape_length(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let iacs = data.iter().filter(|&&b| b == 0xFF).count();
        prop_assert_eq!(escape_iac(&data).len(), data.len() + iacs);
    }
}

// ── Field editing ─────────────────────────────────────────────────────

proptest! {
    /// A multiple-choice field holds at most one mark per allowed choice,
    /// each in its own slot.
    #[test]
    fn fixed_set_marks_bounded(
        choices in "[A-Z]{1,6}",
        capacity in 1usize..10,
        keys in proptest::collection::vec(arb_key(), 0..64),
    ) {
        let set: Vec<char> = choices.chars().collect();
        let mut field = EditableField::new("", capacity, CharPolicy::fixed_set(&choices));
        for key in keys {
            field.step(key);
        }

        let marks = field.cells().iter().filter(|&&c| is_mark(c)).count();
        prop_assert!(marks <= set.len());
        for (i, &c) in field.cells().iter().enumerate() {
            if is_mark(c) {
                prop_assert_eq!(Some(&c), set.get(i));
            }
        }
    }

    /// Editing never grows the buffer or pushes the cursor past it.
    #[test]
    fn field_respects_capacity(
        initial in "[ -~]{0,12}",
        capacity in 0usize..12,
        insert in any::<bool>(),
        keys in proptest::collection::vec(arb_key(), 0..64),
    ) {
        let mut field =
            EditableField::new(&initial, capacity, CharPolicy::Any).with_insert_mode(insert);
        for key in keys {
            field.step(key);
            prop_assert_eq!(field.cells().len(), capacity);
            prop_assert!(field.cursor() <= capacity);
        }
        prop_assert!(field.text().chars().count() <= capacity);
    }

    /// Digit fields only ever hold digits and spaces.
    #[test]
    fn digit_field_filters(keys in proptest::collection::vec(arb_key(), 0..64)) {
        let mut field = EditableField::new("", 8, CharPolicy::DigitsAndSpace);
        for key in keys {
            field.step(key);
        }
        prop_assert!(field.text().chars().all(|c| c.is_ascii_digit() || c == ' '));
    }
}

// ── Key decoding ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn key_decoder_settles(bytes in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let mut decoder = KeyDecoder::new();
        for &b in &bytes {
            let _ = decoder.feed(b);
        }
        let _ = decoder.flush();
        prop_assert!(!decoder.is_pending());
    }
}

// ── Fixed scenarios ───────────────────────────────────────────────────

#[test]
fn overlong_sequence_is_discarded() {
    let mut state = DisplayState::new(80, 25);
    let mut interp = EscapeInterpreter::new();

    // ESC [ and 74 digits: 76 bytes without a terminator
    let mut seq = b"\x1b[".to_vec();
    seq.extend(std::iter::repeat(b'1').take(74));
    assert_eq!(seq.len(), 76);

    for &b in &seq {
        assert!(interp.feed(b, &mut state).is_empty());
    }
    assert!(!interp.is_collecting());

    let commands = interp.feed(b'Z', &mut state);
    assert_eq!(
        commands,
        vec![DrawCommand::PutChar { ch: b'Z', attr: Attribute::DEFAULT }]
    );
    assert_eq!((state.cursor_x, state.cursor_y), (1, 0));
}

#[test]
fn cursor_position_zero_means_one() {
    let mut state = DisplayState::new(80, 25);
    let mut interp = EscapeInterpreter::new();
    for &b in b"\x1b[10;10H\x1b[1;0H" {
        interp.feed(b, &mut state);
    }
    assert_eq!((state.cursor_x, state.cursor_y), (0, 0));
}

#[test]
fn reverse_video_swaps_nibbles() {
    let start = Attribute::from_bits_retain(0x1E);
    assert_eq!(select_graphic_rendition(start, &[7]).bits(), 0x69);
}

#[test]
fn doubled_iac_then_data() {
    let mut decoder = TelnetDecoder::new(Arc::new(AtomicBool::new(false)));
    let decoded = decoder.decode(&[0xFF, 0xFF, 0x41]);
    assert_eq!(decoded.data, vec![0xFF, 0x41]);
}
