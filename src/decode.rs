//! Text decoding.
//!
//! Walks the tree after suppression and rewrites leaf tokens into decoded
//! byte runs. Decoding state is scoped: the active font and the `\ucN`
//! fallback byte count are pushed on group entry and popped on exit, held in
//! an explicit stack alongside an explicit frame stack so that deeply nested
//! documents never touch the call stack.
//!
//! Byte-run decoding resolves an encoding per scope: the active font's
//! codepage, else `\ansicpgN`, else the charset keyword's codepage. Maximal
//! runs of `\'HH` escapes decode as one unit so multi-byte codepages survive
//! being split across escapes. `\uN` escapes emit UTF-8, pairing surrogate
//! halves and consuming their ANSI fallback bytes.

use std::iter::Peekable;
use std::vec::IntoIter;

use encoding_rs::Encoding;
use smallvec::SmallVec;

use crate::common::encoding::codepage_to_encoding;
use crate::document::DeEncapsulationOptions;
use crate::error::{Error, Result};
use crate::fonts::FontTable;
use crate::header::HeaderInfo;
use crate::lexer::{Token, TokenKind};
use crate::tree::{Group, Node};

/// Per-scope decoding state.
#[derive(Debug, Clone, Copy)]
struct ScopeState {
    /// Active font number, if any (`\deffN` until a `\fN` overrides it).
    font: Option<i32>,
    /// Unicode fallback byte count (`\ucN`).
    uc: usize,
}

/// A high surrogate waiting for its low half within the same scope.
#[derive(Debug)]
struct PendingSurrogate {
    high: u16,
    offset: usize,
    fallback: Vec<u8>,
}

struct Frame {
    iter: Peekable<IntoIter<Node>>,
    out: Vec<Node>,
    open_offset: usize,
    close_offset: usize,
    surrogate: Option<PendingSurrogate>,
}

impl Frame {
    fn new(group: Group) -> Self {
        Self {
            iter: group.children.into_iter().peekable(),
            out: Vec::new(),
            open_offset: group.open_offset,
            close_offset: group.close_offset,
            surrogate: None,
        }
    }
}

/// Decode all leaf tokens of the tree into byte runs.
pub fn decode_tree(
    root: Group,
    fonts: &FontTable,
    header: &HeaderInfo,
    options: &DeEncapsulationOptions,
) -> Result<Group> {
    let decoder = Decoder {
        fonts,
        header,
        options,
    };
    decoder.run(root)
}

struct Decoder<'a> {
    fonts: &'a FontTable,
    header: &'a HeaderInfo,
    options: &'a DeEncapsulationOptions,
}

impl Decoder<'_> {
    fn run(&self, root: Group) -> Result<Group> {
        let initial = ScopeState {
            font: self.fonts.default_font,
            uc: self.options.initial_byte_count.max(0) as usize,
        };
        let mut frames = vec![Frame::new(root)];
        let mut states = vec![initial];

        loop {
            let next = frames.last_mut().expect("frame stack is never empty").iter.next();
            match next {
                None => {
                    let mut frame = frames.pop().expect("frame stack is never empty");
                    states.pop();
                    // The surrogate buffer is per-scope and must be empty at
                    // group close.
                    if let Some(pending) = frame.surrogate.take() {
                        self.surrogate_failure(&mut frame, pending)?;
                    }
                    let group = Group {
                        open_offset: frame.open_offset,
                        close_offset: frame.close_offset,
                        children: frame.out,
                    };
                    match frames.last_mut() {
                        Some(parent) => parent.out.push(Node::Group(group)),
                        None => return Ok(group),
                    }
                },
                Some(Node::Group(child)) => {
                    let frame = frames.last_mut().expect("frame stack is never empty");
                    if let Some(pending) = frame.surrogate.take() {
                        self.surrogate_failure(frame, pending)?;
                    }
                    let inherited = *states.last().expect("state stack is never empty");
                    states.push(inherited);
                    frames.push(Frame::new(child));
                },
                Some(Node::Bytes(bytes)) => {
                    frames
                        .last_mut()
                        .expect("frame stack is never empty")
                        .out
                        .push(Node::Bytes(bytes));
                },
                Some(Node::Token(token)) => {
                    let frame = frames.last_mut().expect("frame stack is never empty");
                    let state = states.last_mut().expect("state stack is never empty");
                    self.handle_token(token, frame, state)?;
                },
            }
        }
    }

    fn handle_token(&self, token: Token, frame: &mut Frame, state: &mut ScopeState) -> Result<()> {
        // Anything but the next \uN (or layout) ends a pending surrogate pair.
        if frame.surrogate.is_some()
            && !matches!(token.kind, TokenKind::UnicodeEscape(_) | TokenKind::Newline)
        {
            let pending = frame.surrogate.take().expect("checked above");
            self.surrogate_failure(frame, pending)?;
        }

        // Tokens that neither decode nor update state stay in the tree; the
        // control-word stripper decides later, after destinations have been
        // classified off their leading tokens.
        let mut keep = false;
        match &token.kind {
            TokenKind::ControlWord { name, param } => match (name.as_str(), *param) {
                // Font selection: consumed, no emission.
                ("f", Some(n)) => state.font = Some(n),
                // Fallback byte count: consumed, clamped at zero.
                ("uc", p) => state.uc = p.unwrap_or(1).max(0) as usize,
                _ => match special_char(name) {
                    Some(text) => frame.out.push(Node::Bytes(text.as_bytes().to_vec())),
                    None => keep = true,
                },
            },
            TokenKind::ControlSymbol(symbol) => match symbol {
                b'~' => push_char(frame, '\u{00A0}'),
                b'-' => push_char(frame, '\u{00AD}'),
                b'_' => push_char(frame, '\u{2011}'),
                b'|' => {},
                _ => keep = true,
            },
            TokenKind::HexEscape(first) => {
                let mut bytes: SmallVec<[u8; 16]> = SmallVec::new();
                bytes.push(*first);
                // Maximal run, so multi-byte codepoints split across escapes
                // (and line wraps) decode as one unit.
                loop {
                    match frame.iter.peek() {
                        Some(Node::Token(tok)) => match tok.kind {
                            TokenKind::HexEscape(next) => {
                                bytes.push(next);
                                frame.iter.next();
                            },
                            TokenKind::Newline => {
                                frame.iter.next();
                            },
                            _ => break,
                        },
                        _ => break,
                    }
                }
                self.push_decoded(frame, state, &bytes, token.offset);
            },
            TokenKind::Literal(bytes) => {
                self.push_decoded(frame, state, bytes, token.offset);
            },
            TokenKind::UnicodeEscape(value) => {
                self.handle_unicode(token.offset, *value, frame, state)?;
            },
            // Layout only.
            TokenKind::Newline => {},
            // The tree builder consumed all brace tokens.
            TokenKind::GroupOpen | TokenKind::GroupClose => {},
        }
        if keep {
            frame.out.push(Node::Token(token));
        }
        Ok(())
    }

    /// Decode a byte run through the scope's active encoding.
    fn push_decoded(&self, frame: &mut Frame, state: &ScopeState, bytes: &[u8], offset: usize) {
        if bytes.is_empty() {
            return;
        }
        let encoding = self.active_encoding(state);
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if had_errors {
            log::debug!(
                "lossy {} decode of {} byte(s) at byte offset {}",
                encoding.name(),
                bytes.len(),
                offset
            );
        }
        frame.out.push(Node::Bytes(decoded.into_owned().into_bytes()));
    }

    fn handle_unicode(
        &self,
        offset: usize,
        value: u16,
        frame: &mut Frame,
        state: &ScopeState,
    ) -> Result<()> {
        let fallback = consume_fallback(&mut frame.iter, state.uc);

        if let Some(pending) = frame.surrogate.take() {
            if is_low_surrogate(value) {
                let code_point = 0x10000
                    + (((pending.high - 0xD800) as u32) << 10)
                    + ((value - 0xDC00) as u32);
                let ch = char::from_u32(code_point)
                    .expect("a surrogate pair always combines to a valid code point");
                push_char(frame, ch);
                return Ok(());
            }
            // The pending high was not followed by a low; fail it and fall
            // through to treat the current escape on its own.
            self.surrogate_failure(frame, pending)?;
        }

        if is_high_surrogate(value) {
            frame.surrogate = Some(PendingSurrogate {
                high: value,
                offset,
                fallback,
            });
        } else if is_low_surrogate(value) {
            self.unicode_failure(frame, offset, fallback, "unexpected low surrogate")?;
        } else {
            let ch = char::from_u32(value as u32).expect("BMP non-surrogate value");
            push_char(frame, ch);
        }
        Ok(())
    }

    fn surrogate_failure(&self, frame: &mut Frame, pending: PendingSurrogate) -> Result<()> {
        self.unicode_failure(
            frame,
            pending.offset,
            pending.fallback,
            "high surrogate without a following low surrogate",
        )
    }

    fn unicode_failure(
        &self,
        frame: &mut Frame,
        offset: usize,
        fallback: Vec<u8>,
        msg: &str,
    ) -> Result<()> {
        if self.options.use_ascii_alternatives_on_unicode_decode_failure {
            log::debug!("{} at byte offset {}; emitting ASCII fallback", msg, offset);
            if !fallback.is_empty() {
                frame.out.push(Node::Bytes(fallback));
            }
            Ok(())
        } else {
            Err(Error::malformed_at(offset, msg))
        }
    }

    /// Resolve the decoder for the current scope: active font, else
    /// `\ansicpgN`, else the charset keyword, else ANSI.
    fn active_encoding(&self, state: &ScopeState) -> &'static Encoding {
        state
            .font
            .and_then(|num| self.fonts.get(num))
            .and_then(|def| def.encoding())
            .or_else(|| self.header.ansi_codepage.and_then(codepage_to_encoding))
            .or_else(|| codepage_to_encoding(self.header.charset.codepage()))
            .unwrap_or(encoding_rs::WINDOWS_1252)
    }
}

#[inline]
fn is_high_surrogate(value: u16) -> bool {
    (0xD800..=0xDBFF).contains(&value)
}

#[inline]
fn is_low_surrogate(value: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&value)
}

fn push_char(frame: &mut Frame, ch: char) {
    let mut buf = [0u8; 4];
    frame
        .out
        .push(Node::Bytes(ch.encode_utf8(&mut buf).as_bytes().to_vec()));
}

/// Consume up to `uc` fallback bytes following a `\uN`.
///
/// A hex escape is one byte; a literal counts byte by byte and is split in
/// place when it holds more than the remaining count; a control word or
/// symbol counts as one; layout newlines do not count. Consumption never
/// crosses a group boundary and stops short at the next `\uN`, which is a
/// surrogate half rather than fallback.
fn consume_fallback(iter: &mut Peekable<IntoIter<Node>>, uc: usize) -> Vec<u8> {
    let mut captured = Vec::new();
    let mut remaining = uc;

    while remaining > 0 {
        enum Step {
            TakeHex(u8),
            TakeLiteral(usize),
            SplitLiteral,
            SkipLayout,
            TakeOpaque,
            Stop,
        }

        let step = match iter.peek() {
            Some(Node::Token(tok)) => match &tok.kind {
                TokenKind::HexEscape(byte) => Step::TakeHex(*byte),
                TokenKind::Literal(bytes) => {
                    if bytes.len() <= remaining {
                        Step::TakeLiteral(bytes.len())
                    } else {
                        Step::SplitLiteral
                    }
                },
                TokenKind::Newline => Step::SkipLayout,
                TokenKind::UnicodeEscape(_) => Step::Stop,
                TokenKind::ControlWord { .. } | TokenKind::ControlSymbol(_) => Step::TakeOpaque,
                TokenKind::GroupOpen | TokenKind::GroupClose => Step::Stop,
            },
            _ => Step::Stop,
        };

        match step {
            Step::TakeHex(byte) => {
                iter.next();
                captured.push(byte);
                remaining -= 1;
            },
            Step::TakeLiteral(len) => {
                if let Some(Node::Token(tok)) = iter.next()
                    && let TokenKind::Literal(bytes) = tok.kind
                {
                    captured.extend_from_slice(&bytes);
                }
                remaining -= len;
            },
            Step::SplitLiteral => {
                if let Some(Node::Token(tok)) = iter.peek_mut()
                    && let TokenKind::Literal(bytes) = &mut tok.kind
                {
                    captured.extend(bytes.drain(..remaining));
                }
                remaining = 0;
            },
            Step::SkipLayout => {
                iter.next();
            },
            Step::TakeOpaque => {
                iter.next();
                remaining -= 1;
            },
            Step::Stop => break,
        }
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DeEncapsulationOptions;
    use crate::header::validate;
    use crate::lexer::Lexer;
    use crate::tree::build_tree;

    fn decode_str(input: &[u8], options: &DeEncapsulationOptions) -> Result<Group> {
        let root = build_tree(Lexer::new(input).tokenize()?)?;
        let header = validate(&root, options)?;
        let fonts = crate::fonts::parse_font_table(&root, &header);
        decode_tree(root, &fonts, &header, options)
    }

    /// All decoded bytes in document order, descending into every group
    /// except font tables (whose face names decode but never render).
    fn decoded_bytes(group: &Group) -> Vec<u8> {
        let mut out = Vec::new();
        for node in &group.children {
            match node {
                Node::Bytes(bytes) => out.extend_from_slice(bytes),
                Node::Group(child)
                    if child.destination() != crate::tree::Destination::FontTable =>
                {
                    out.extend_from_slice(&decoded_bytes(child));
                },
                _ => {},
            }
        }
        out
    }

    fn decode_ok(input: &[u8]) -> Vec<u8> {
        decoded_bytes(&decode_str(input, &DeEncapsulationOptions::default()).unwrap())
    }

    #[test]
    fn test_plain_literal() {
        assert_eq!(decode_ok(br"{\rtf1\ansi\fromtext hello}"), b"hello");
    }

    #[test]
    fn test_par_and_tab() {
        assert_eq!(
            decode_ok(br"{\rtf1\ansi\fromtext hello\par world\tab !}"),
            b"hello\nworld\t!"
        );
    }

    #[test]
    fn test_hex_escape_cp1252() {
        // \'e9 is é in Windows-1252; output is UTF-8.
        assert_eq!(
            decode_ok(br"{\rtf1\ansi\ansicpg1252\fromtext caf\'e9}"),
            "café".as_bytes()
        );
    }

    #[test]
    fn test_hex_run_decodes_shift_jis_pairs() {
        // 0x88 0x9F is one Shift-JIS code point (U+4E9C); the run must decode
        // as a unit even though each byte arrives in its own escape.
        let out = decode_ok(
            br"{\rtf1\ansi\fromhtml1{\fonttbl{\f1\fcharset128 MS Mincho;}}\f1 \'88\'9f}",
        );
        assert_eq!(out, "亜".as_bytes());
    }

    #[test]
    fn test_font_scope_restored_on_group_close() {
        // f1 selected inside the group only; the trailing hex decodes with
        // the document default again.
        let out = decode_ok(
            br"{\rtf1\ansi\ansicpg1252\fromhtml1{\fonttbl{\f1\fcharset128 MS Mincho;}}x\'e9}",
        );
        assert_eq!(out, "xé".as_bytes());
    }

    #[test]
    fn test_unicode_escape_with_fallback() {
        // \u8212? : U+2014 em dash, the '?' is consumed fallback.
        assert_eq!(
            decode_ok(br"{\rtf1\ansi\fromtext \u8212?x}"),
            "\u{2014}x".as_bytes()
        );
    }

    #[test]
    fn test_unicode_fallback_split_from_literal() {
        // uc2 consumes exactly two bytes of the literal; the rest is text.
        assert_eq!(
            decode_ok(br"{\rtf1\ansi\fromtext \uc2\u8212abX}"),
            "\u{2014}X".as_bytes()
        );
    }

    #[test]
    fn test_unicode_fallback_hex_escape() {
        assert_eq!(
            decode_ok(br"{\rtf1\ansi\fromtext \u8212\'3fx}"),
            "\u{2014}x".as_bytes()
        );
    }

    #[test]
    fn test_uc_zero_consumes_nothing() {
        assert_eq!(
            decode_ok(br"{\rtf1\ansi\fromtext \uc0\u8212?}"),
            "\u{2014}?".as_bytes()
        );
    }

    #[test]
    fn test_surrogate_pair() {
        // 0xD83D 0xDE00 → U+1F600.
        assert_eq!(
            decode_ok(br"{\rtf1\ansi\fromtext \u-10179?\u-8704?}"),
            "\u{1F600}".as_bytes()
        );
    }

    #[test]
    fn test_unpaired_high_surrogate_is_error() {
        let err =
            decode_str(br"{\rtf1\ansi\fromtext \u-10179?}", &DeEncapsulationOptions::default())
                .unwrap_err();
        assert!(matches!(err, Error::MalformedRtf(_)));
    }

    #[test]
    fn test_unpaired_low_surrogate_is_error() {
        let err =
            decode_str(br"{\rtf1\ansi\fromtext \u-8704?}", &DeEncapsulationOptions::default())
                .unwrap_err();
        assert!(matches!(err, Error::MalformedRtf(_)));
    }

    #[test]
    fn test_surrogate_must_pair_within_group() {
        let err = decode_str(
            br"{\rtf1\ansi\fromtext {\u-10179?}\u-8704?}",
            &DeEncapsulationOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRtf(_)));
    }

    #[test]
    fn test_ascii_alternative_on_surrogate_failure() {
        let options = DeEncapsulationOptions {
            use_ascii_alternatives_on_unicode_decode_failure: true,
            ..Default::default()
        };
        let tree = decode_str(br"{\rtf1\ansi\fromtext \u-10179?end}", &options).unwrap();
        assert_eq!(decoded_bytes(&tree), b"?end");
    }

    #[test]
    fn test_control_symbols_with_text_meaning() {
        assert_eq!(
            decode_ok(br"{\rtf1\ansi\fromtext a\~b\-c\|d}"),
            "a\u{00A0}b\u{00AD}cd".as_bytes()
        );
    }

    #[test]
    fn test_special_char_words() {
        assert_eq!(
            decode_ok(br"{\rtf1\ansi\fromtext \ldblquote q\rdblquote\bullet\endash\emdash}"),
            "\u{201C}q\u{201D}\u{2022}\u{2013}\u{2014}".as_bytes()
        );
    }

    #[test]
    fn test_initial_byte_count_option() {
        let options = DeEncapsulationOptions {
            initial_byte_count: 2,
            ..Default::default()
        };
        let tree = decode_str(br"{\rtf1\ansi\fromtext \u8212ab}", &options).unwrap();
        assert_eq!(decoded_bytes(&tree), "\u{2014}".as_bytes());
    }
}

/// Control words that decode to a fixed character sequence.
fn special_char(name: &str) -> Option<&'static str> {
    match name {
        "par" | "line" => Some("\n"),
        "tab" => Some("\t"),
        "lquote" => Some("\u{2018}"),
        "rquote" => Some("\u{2019}"),
        "ldblquote" => Some("\u{201C}"),
        "rdblquote" => Some("\u{201D}"),
        "bullet" => Some("\u{2022}"),
        "endash" => Some("\u{2013}"),
        "emdash" => Some("\u{2014}"),
        "enspace" => Some("\u{2002}"),
        "emspace" => Some("\u{2003}"),
        "qmspace" => Some("\u{2005}"),
        "zwj" => Some("\u{200D}"),
        "zwnj" => Some("\u{200C}"),
        _ => None,
    }
}
