//! Font-table parsing.
//!
//! The `\fonttbl` destination maps font numbers to charset information. The
//! decoder uses it to pick the codepage for hex-escaped and literal byte
//! runs: an explicit `\cpgN` wins, otherwise `\fcharsetN` resolves through
//! the charset table. Fonts declaring only a face name carry no codepage and
//! decode through the document defaults.
//!
//! Both layouts that occur in the wild are accepted: one subgroup per font
//! (`{\fonttbl{\f0\fswiss Arial;}}`) and the flat form where entries sit
//! directly in the table group separated by `;`.

use std::collections::HashMap;

use encoding_rs::Encoding;

use crate::common::encoding::{charset_to_codepage, codepage_to_encoding};
use crate::header::HeaderInfo;
use crate::lexer::TokenKind;
use crate::tree::{Destination, Group, Node};

/// One font definition from the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontDef {
    /// Font number (`\fN`).
    pub num: i32,
    /// Face name, informational only.
    pub name: String,
    /// `\fcharsetN` if present.
    pub charset: Option<i32>,
    /// Resolved codepage: `\cpgN` if present, else derived from the charset.
    pub codepage: Option<u32>,
}

impl FontDef {
    /// The decoder for this font, when it names one.
    #[inline]
    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.codepage.and_then(codepage_to_encoding)
    }
}

/// Mapping from `\fN` to font definitions, plus the document default font.
#[derive(Debug, Clone, Default)]
pub struct FontTable {
    fonts: HashMap<i32, FontDef>,
    /// `\deffN` from the header.
    pub default_font: Option<i32>,
}

impl FontTable {
    /// Look up a font by number.
    #[inline]
    pub fn get(&self, num: i32) -> Option<&FontDef> {
        self.fonts.get(&num)
    }

    /// Number of fonts defined.
    #[inline]
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// True when the table defines no fonts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Build the font table from the document tree.
///
/// A missing or empty `\fonttbl` is not an error; everything then decodes
/// through the document-level codepage.
pub fn parse_font_table(root: &Group, header: &HeaderInfo) -> FontTable {
    let mut table = FontTable {
        fonts: HashMap::new(),
        default_font: header.default_font,
    };

    let Some(fonttbl) = find_font_table(root) else {
        log::debug!("no \\fonttbl group in the stream");
        return table;
    };

    let mut flat = EntryBuilder::default();
    for node in &fonttbl.children {
        match node {
            Node::Group(entry) => {
                if let Some(def) = parse_entry(entry) {
                    table.fonts.insert(def.num, def);
                }
            },
            Node::Token(token) => flat.feed(token, &mut table),
            Node::Bytes(_) => {},
        }
    }
    flat.finish(&mut table);

    log::debug!("parsed font table with {} font(s)", table.len());
    table
}

/// Locate the `\fonttbl` group anywhere under the root.
fn find_font_table(root: &Group) -> Option<&Group> {
    for node in &root.children {
        if let Node::Group(group) = node {
            if group.destination() == Destination::FontTable {
                return Some(group);
            }
            if let Some(found) = find_font_table(group) {
                return Some(found);
            }
        }
    }
    None
}

/// Parse one `{\fN ... Name;}` subgroup.
fn parse_entry(group: &Group) -> Option<FontDef> {
    let mut builder = EntryBuilder::default();
    for node in &group.children {
        match node {
            // Nested groups such as {\*\panose ...} carry no charset facts.
            Node::Group(_) => {},
            Node::Token(token) => builder.accept(token),
            Node::Bytes(_) => {},
        }
    }
    builder.take()
}

/// Accumulates one font definition from a token run.
#[derive(Default)]
struct EntryBuilder {
    num: Option<i32>,
    name: Vec<u8>,
    charset: Option<i32>,
    cpg: Option<u32>,
}

impl EntryBuilder {
    /// Consume one token from a subgroup entry.
    fn accept(&mut self, token: &crate::lexer::Token) {
        match &token.kind {
            TokenKind::ControlWord { name, param } => match (name.as_str(), param) {
                ("f", Some(n)) => self.num = Some(*n),
                ("fcharset", Some(n)) => self.charset = Some(*n),
                ("cpg", Some(n)) if *n >= 0 => self.cpg = Some(*n as u32),
                _ => {},
            },
            TokenKind::Literal(bytes) => {
                let trimmed: &[u8] = match bytes.iter().position(|&b| b == b';') {
                    Some(end) => &bytes[..end],
                    None => bytes,
                };
                self.name.extend_from_slice(trimmed);
            },
            _ => {},
        }
    }

    /// Consume one token from the flat table form, finalizing an entry at
    /// each `;` separator or at the next `\fN`.
    fn feed(&mut self, token: &crate::lexer::Token, table: &mut FontTable) {
        if let Some(("f", Some(_))) = token.control_word()
            && self.num.is_some()
        {
            self.finish(table);
        }
        let terminated = matches!(&token.kind, TokenKind::Literal(bytes) if bytes.contains(&b';'));
        self.accept(token);
        if terminated {
            self.finish(table);
        }
    }

    fn finish(&mut self, table: &mut FontTable) {
        if let Some(def) = std::mem::take(self).take() {
            table.fonts.insert(def.num, def);
        }
    }

    fn take(self) -> Option<FontDef> {
        let num = self.num?;
        let codepage = self.cpg.or_else(|| self.charset.and_then(charset_to_codepage));
        let name = String::from_utf8_lossy(&self.name).trim().to_string();
        Some(FontDef {
            num,
            name,
            charset: self.charset,
            codepage,
        })
    }
}
