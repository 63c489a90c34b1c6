//! Byte-order-mark handling for in-memory RTF streams.
//!
//! Encapsulated RTF is an ASCII-superset byte stream, so the only mark worth
//! tolerating ahead of `{\rtf1` is UTF-8's: exporters occasionally prepend
//! it and it carries no information. A UTF-16/32 mark means the stream is
//! wide-encoded text and cannot be tokenized as RTF at all.

/// What the leading bytes of a stream say about its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bom {
    /// No byte order mark; the stream starts directly.
    Absent,
    /// The UTF-8 mark; harmless, consumed.
    Utf8,
    /// A UTF-16 or UTF-32 mark, named for diagnostics; the stream is not
    /// byte-oriented RTF.
    Wide(&'static str),
}

/// Classify a leading BOM and strip it when the stream remains readable.
///
/// Only the UTF-8 mark is consumed; a wide mark is left in place since the
/// caller rejects the stream anyway. UTF-32 LE begins with the UTF-16 LE
/// mark, so the wider forms are tested first.
pub fn strip_bom(input: &[u8]) -> (Bom, &[u8]) {
    const WIDE_MARKS: [(&[u8], &str); 4] = [
        (&[0xFF, 0xFE, 0x00, 0x00], "UTF-32LE"),
        (&[0x00, 0x00, 0xFE, 0xFF], "UTF-32BE"),
        (&[0xFF, 0xFE], "UTF-16LE"),
        (&[0xFE, 0xFF], "UTF-16BE"),
    ];
    for (mark, name) in WIDE_MARKS {
        if input.starts_with(mark) {
            return (Bom::Wide(name), input);
        }
    }
    match input.strip_prefix(&[0xEF, 0xBB, 0xBF][..]) {
        Some(rest) => (Bom::Utf8, rest),
        None => (Bom::Absent, input),
    }
}
