//! Pre-tokenizer pass that rewrites escaped literal specials.
//!
//! Authors may write `\\`, `\{`, `\}` in literal text to encode a backslash
//! or brace. Rewriting them to their `\'HH` hex form before tokenization
//! means the grammar only ever sees hex escapes and never a structural
//! character that is secretly text.
//!
//! The rewrite is idempotent: it copies existing `\'HH` sequences through
//! verbatim and never consumes the backslash of a control word.

use memchr::memchr;

/// Rewrite `\\`, `\{`, `\}` to `\'5c`, `\'7b`, `\'7d`.
pub fn normalize_escapes(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        let Some(found) = memchr(b'\\', &input[pos..]) else {
            output.extend_from_slice(&input[pos..]);
            break;
        };
        let slash = pos + found;
        output.extend_from_slice(&input[pos..slash]);

        match input.get(slash + 1) {
            Some(b'\\') => {
                output.extend_from_slice(b"\\'5c");
                pos = slash + 2;
            },
            Some(b'{') => {
                output.extend_from_slice(b"\\'7b");
                pos = slash + 2;
            },
            Some(b'}') => {
                output.extend_from_slice(b"\\'7d");
                pos = slash + 2;
            },
            Some(b'\'') => {
                // An existing hex escape; copy `\'` plus its two digits so the
                // scan cannot restart inside the HH pair.
                let end = (slash + 4).min(input.len());
                output.extend_from_slice(&input[slash..end]);
                pos = end;
            },
            _ => {
                // Control word or symbol; the next byte cannot be a special.
                output.push(b'\\');
                pos = slash + 1;
            },
        }
    }

    output
}
