//! rtf-deencap - De-encapsulation of HTML and plain text from RTF streams
//!
//! Microsoft Outlook wraps HTML and plain-text message bodies inside an RTF
//! container when exporting `.msg` messages ([MS-OXRTFEX]). This library
//! reconstructs the original body with minimal loss: it tokenizes the RTF
//! byte stream, validates the encapsulation header, removes the RTF the
//! encapsulator injected for pretty-printing (`\htmlrtf` regions), and
//! decodes the remaining payload through the font table's codepages,
//! `\uN`/`\ucN` Unicode escapes (surrogate pairs included), and `\'HH` hex
//! escapes.
//!
//! # Architecture
//!
//! The pipeline is a series of in-memory passes:
//! - **Pre-passes**: splice out `\binN` payloads, rewrite `\\ \{ \}` to hex
//!   escapes, skip a UTF-8 BOM, decompress `LZFu`/`MELA` streams
//! - **Lexer + tree**: byte stream → typed tokens → nested group tree
//! - **Validation**: `{\rtf1` and `\fromhtml1`/`\fromtext` header checks
//! - **Suppression**: scoped `\htmlrtf` state machine marks injected RTF
//! - **Decoding**: per-scope font/`\uc` state rewrites leaves to bytes
//! - **Transforms**: strip non-visible groups, join the surviving bytes
//!
//! # Example
//!
//! ```rust
//! use rtf_deencap::{ContentType, RtfDeEncapsulator};
//!
//! let rtf = br"{\rtf1\ansi\ansicpg1252\fromhtml1{\*\htmltag <p>Hello!</p>}}";
//! let mut dec = RtfDeEncapsulator::from_bytes(rtf.as_slice());
//! dec.deencapsulate()?;
//! assert_eq!(dec.content_type(), Some(ContentType::Html));
//! assert_eq!(dec.html(), Some(&b"<p>Hello!</p>"[..]));
//! # Ok::<(), rtf_deencap::Error>(())
//! ```

/// Codepage resolution and BOM handling shared across the pipeline
pub mod common;

mod binary;
mod compressed;
mod decode;
mod document;
mod error;
mod fonts;
mod header;
mod lexer;
mod normalize;
mod suppress;
mod transform;
mod tree;

// Re-exports
pub use binary::{BinarySplice, reinsert_binary, strip_binary};
pub use compressed::{decompress, is_compressed_rtf};
pub use document::{DeEncapsulationOptions, RtfDeEncapsulator, deencapsulate};
pub use error::{Error, Result};
pub use fonts::{FontDef, FontTable};
pub use header::{CharacterSet, ContentType};
pub use lexer::{Token, TokenId, TokenKind, TokenTag};
pub use tree::{Destination, Group, Node};
