//! Public de-encapsulation facade.
//!
//! [`RtfDeEncapsulator`] is the entry point: construct it from raw bytes (or
//! a text string, re-encoded as Latin-1 to preserve byte identity), call
//! [`deencapsulate`](RtfDeEncapsulator::deencapsulate), then read `content`
//! and `content_type`. Compressed (`LZFu`/`MELA`) input and a leading UTF-8
//! BOM are handled transparently.

use crate::binary::strip_binary;
use crate::common::bom::{Bom, strip_bom};
use crate::compressed::{decompress, is_compressed_rtf};
use crate::error::{Error, Result};
use crate::header::ContentType;
use crate::lexer::Lexer;
use crate::normalize::normalize_escapes;
use crate::tree::{Group, build_tree};
use crate::{decode, fonts, header, suppress, transform};

/// Configuration for one de-encapsulation.
#[derive(Debug, Clone)]
pub struct DeEncapsulationOptions {
    /// Substitute `\ansi` when the stream omits its charset keyword instead
    /// of failing.
    pub fallback_to_default_charset: bool,
    /// Starting `\uc` value, for inputs that are fragments of a larger
    /// stream.
    pub initial_byte_count: i32,
    /// On a Unicode decode failure, emit the captured ANSI fallback bytes
    /// instead of failing.
    pub use_ascii_alternatives_on_unicode_decode_failure: bool,
    /// Retain font-definition groups in the tree after decoding, for
    /// diagnostics. They never contribute output bytes.
    pub keep_fontdef: bool,
}

impl Default for DeEncapsulationOptions {
    fn default() -> Self {
        Self {
            fallback_to_default_charset: false,
            initial_byte_count: 1,
            use_ascii_alternatives_on_unicode_decode_failure: false,
            keep_fontdef: false,
        }
    }
}

/// De-encapsulates the HTML or plain-text payload from an encapsulating RTF
/// stream per [MS-OXRTFEX].
///
/// # Examples
///
/// ```rust
/// use rtf_deencap::{ContentType, RtfDeEncapsulator};
///
/// let rtf = br"{\rtf1\ansi\ansicpg1252\fromhtml1{\*\htmltag <p>hi</p>}}";
/// let mut dec = RtfDeEncapsulator::from_bytes(rtf.as_slice());
/// dec.deencapsulate()?;
/// assert_eq!(dec.content_type(), Some(ContentType::Html));
/// assert_eq!(dec.content(), Some(&b"<p>hi</p>"[..]));
/// # Ok::<(), rtf_deencap::Error>(())
/// ```
pub struct RtfDeEncapsulator {
    raw: Vec<u8>,
    options: DeEncapsulationOptions,
    content: Option<Vec<u8>>,
    content_type: Option<ContentType>,
    tree: Option<Group>,
}

impl RtfDeEncapsulator {
    /// Create a de-encapsulator over raw stream bytes.
    pub fn from_bytes(raw: impl Into<Vec<u8>>) -> Self {
        Self {
            raw: raw.into(),
            options: DeEncapsulationOptions::default(),
            content: None,
            content_type: None,
            tree: None,
        }
    }

    /// Create a de-encapsulator from text, re-encoded as Latin-1 so every
    /// code point maps back to the byte it stood for.
    pub fn from_str(text: &str) -> Result<Self> {
        let mut raw = Vec::with_capacity(text.len());
        for ch in text.chars() {
            let cp = ch as u32;
            if cp > 0xFF {
                return Err(Error::MalformedRtf(format!(
                    "input string is not Latin-1: {:?} has no byte form",
                    ch
                )));
            }
            raw.push(cp as u8);
        }
        Ok(Self::from_bytes(raw))
    }

    /// Replace the default options.
    pub fn with_options(mut self, options: DeEncapsulationOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the de-encapsulation pipeline. Idempotent: a second call on a
    /// successfully processed stream is a no-op.
    pub fn deencapsulate(&mut self) -> Result<()> {
        if self.content.is_some() {
            return Ok(());
        }

        let raw = if is_compressed_rtf(&self.raw) {
            log::debug!("input carries a compressed RTF header");
            decompress(&self.raw)?
        } else {
            self.raw.clone()
        };

        let (bom, raw) = strip_bom(&raw);
        if let Bom::Wide(name) = bom {
            return Err(Error::UnsupportedRtfFormat(format!(
                "stream starts with a {} byte order mark; RTF is an ASCII-superset format",
                name
            )));
        }
        if bom == Bom::Utf8 {
            log::debug!("skipped UTF-8 byte order mark");
        }

        let (stripped, _splices) = strip_binary(raw);
        let normalized = normalize_escapes(&stripped);
        let tokens = Lexer::new(&normalized).tokenize()?;
        let root = build_tree(tokens)?;

        let header = header::validate(&root, &self.options)?;
        let fonts = fonts::parse_font_table(&root, &header);
        let doomed = suppress::scan(&root);
        let root = suppress::delete_tokens(root, &doomed);
        let mut root = decode::decode_tree(root, &fonts, &header, &self.options)?;

        transform::strip_non_visible(&mut root, self.options.keep_fontdef);
        transform::strip_control_artifacts(&mut root);
        let content = transform::join(&root);

        log::debug!(
            "de-encapsulated {} byte(s) of {}",
            content.len(),
            header.content_type.as_str()
        );
        self.content = Some(content);
        self.content_type = Some(header.content_type);
        if self.options.keep_fontdef {
            self.tree = Some(root);
        }
        Ok(())
    }

    /// The de-encapsulated payload bytes, once `deencapsulate` has run.
    #[inline]
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// The detected payload kind, once `deencapsulate` has run.
    #[inline]
    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    /// The payload when it is HTML (`None` for text payloads).
    #[inline]
    pub fn html(&self) -> Option<&[u8]> {
        if self.content_type == Some(ContentType::Html) {
            self.content()
        } else {
            None
        }
    }

    /// The payload when it is plain text (`None` for HTML payloads).
    #[inline]
    pub fn text(&self) -> Option<&[u8]> {
        if self.content_type == Some(ContentType::Text) {
            self.content()
        } else {
            None
        }
    }

    /// The transformed tree, retained only with
    /// [`DeEncapsulationOptions::keep_fontdef`].
    #[inline]
    pub fn tree(&self) -> Option<&Group> {
        self.tree.as_ref()
    }
}

/// One-shot de-encapsulation of a stream.
pub fn deencapsulate(data: &[u8]) -> Result<(Vec<u8>, ContentType)> {
    let mut dec = RtfDeEncapsulator::from_bytes(data);
    dec.deencapsulate()?;
    let content_type = dec.content_type.expect("set by deencapsulate");
    let content = dec.content.take().expect("set by deencapsulate");
    Ok((content, content_type))
}
