//! Encapsulation header validation.
//!
//! Per [MS-OXRTFEX], an encapsulating stream announces itself inside the
//! first ten significant tokens: `\rtf1` first, then `\fromhtml1` or
//! `\fromtext` ahead of any font table. The header prefix also supplies the
//! document-level decoding defaults: the charset keyword, `\ansicpgN`, and
//! the default font `\deffN`.

use crate::common::encoding::codepage_to_encoding;
use crate::document::DeEncapsulationOptions;
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use crate::tree::{Group, Node};

/// How many significant tokens the encapsulation markers may hide behind.
const MARKER_WINDOW: usize = 10;

/// The kind of payload the stream encapsulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Original body was HTML (`\fromhtml1`).
    Html,
    /// Original body was plain text (`\fromtext`).
    Text,
}

impl ContentType {
    /// Lowercase name, matching the `content_type` strings callers expect.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Html => "html",
            ContentType::Text => "text",
        }
    }
}

/// Document-level character set keyword (`\ansi`, `\mac`, `\pc`, `\pca`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterSet {
    /// ANSI (Windows-1252)
    #[default]
    Ansi,
    /// Mac Roman
    Mac,
    /// DOS CP437
    Pc,
    /// DOS CP850
    Pca,
}

impl CharacterSet {
    /// The codepage this keyword names.
    #[inline]
    pub fn codepage(&self) -> u32 {
        match self {
            CharacterSet::Ansi => 1252,
            CharacterSet::Mac => 10000,
            CharacterSet::Pc => 437,
            CharacterSet::Pca => 850,
        }
    }
}

/// Validated header facts the rest of the pipeline decodes against.
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    pub content_type: ContentType,
    pub charset: CharacterSet,
    /// `\ansicpgN`, already checked against the codepage registry.
    pub ansi_codepage: Option<u32>,
    /// `\deffN` default font number.
    pub default_font: Option<i32>,
}

/// Validate the encapsulation header and extract decoding defaults.
pub fn validate(root: &Group, options: &DeEncapsulationOptions) -> Result<HeaderInfo> {
    let window = significant_prefix(root, MARKER_WINDOW);

    let Some(first) = window.first() else {
        return Err(Error::MalformedRtf("empty document group".to_string()));
    };
    match first.control_word() {
        Some(("rtf", Some(1))) => {},
        _ => {
            return Err(Error::malformed_at(
                first.offset,
                "document group must open with \\rtf1",
            ));
        },
    }

    let mut content_type = None;
    for token in &window[1..] {
        let Some((name, param)) = token.control_word() else {
            continue;
        };
        match name {
            "fromhtml" if param == Some(1) => {
                set_content_type(&mut content_type, ContentType::Html, token)?;
            },
            "fromtext" => {
                set_content_type(&mut content_type, ContentType::Text, token)?;
            },
            "fonttbl" if content_type.is_none() => {
                return Err(Error::NotEncapsulatedRtf(
                    "font table precedes any \\fromhtml1 or \\fromtext marker".to_string(),
                ));
            },
            _ => {},
        }
    }
    let Some(content_type) = content_type else {
        return Err(Error::NotEncapsulatedRtf(format!(
            "no \\fromhtml1 or \\fromtext within the first {} tokens",
            MARKER_WINDOW
        )));
    };

    let (charset, ansi_codepage, default_font) = scan_header_prefix(root, options)?;
    log::debug!(
        "validated encapsulation header: content_type={}, charset={:?}, ansicpg={:?}, deff={:?}",
        content_type.as_str(),
        charset,
        ansi_codepage,
        default_font
    );

    Ok(HeaderInfo {
        content_type,
        charset,
        ansi_codepage,
        default_font,
    })
}

fn set_content_type(
    slot: &mut Option<ContentType>,
    value: ContentType,
    token: &Token,
) -> Result<()> {
    if slot.is_some() {
        return Err(Error::MalformedEncapsulatedRtf(format!(
            "duplicate encapsulation marker at byte offset {}",
            token.offset
        )));
    }
    *slot = Some(value);
    Ok(())
}

/// Collect the first `limit` significant tokens in document order,
/// descending into groups, skipping layout newlines.
fn significant_prefix(root: &Group, limit: usize) -> Vec<&Token> {
    let mut collected = Vec::with_capacity(limit);
    let mut stack: Vec<(&Group, usize)> = vec![(root, 0)];

    while let Some((group, index)) = stack.pop() {
        if collected.len() == limit {
            break;
        }
        let Some(node) = group.children.get(index) else {
            continue;
        };
        stack.push((group, index + 1));
        match node {
            Node::Token(tok) if !matches!(tok.kind, TokenKind::Newline) => collected.push(tok),
            Node::Group(child) => stack.push((child, 0)),
            _ => {},
        }
    }
    collected
}

/// Scan the header control-word prefix: the tokens preceding the first
/// interior group. Yields the charset keyword, the validated `\ansicpg`
/// codepage, and the default font number.
fn scan_header_prefix(
    root: &Group,
    options: &DeEncapsulationOptions,
) -> Result<(CharacterSet, Option<u32>, Option<i32>)> {
    let mut charset = None;
    let mut ansi_codepage = None;
    let mut default_font = None;

    for node in &root.children {
        let token = match node {
            Node::Group(_) => break,
            Node::Token(tok) => tok,
            Node::Bytes(_) => continue,
        };
        let Some((name, param)) = token.control_word() else {
            continue;
        };
        match name {
            "ansi" => {
                charset.get_or_insert(CharacterSet::Ansi);
            },
            "mac" => {
                charset.get_or_insert(CharacterSet::Mac);
            },
            "pc" => {
                charset.get_or_insert(CharacterSet::Pc);
            },
            "pca" => {
                charset.get_or_insert(CharacterSet::Pca);
            },
            "ansicpg" => {
                let codepage = param.filter(|&n| n >= 0).map(|n| n as u32).ok_or_else(|| {
                    Error::malformed_at(token.offset, "\\ansicpg without a valid codepage")
                })?;
                if codepage_to_encoding(codepage).is_none() {
                    return Err(Error::malformed_at(
                        token.offset,
                        format!("unregistered codepage {}", codepage),
                    ));
                }
                ansi_codepage = Some(codepage);
            },
            "deff" => default_font = param,
            _ => {},
        }
    }

    let charset = match charset {
        Some(cs) => cs,
        None if options.fallback_to_default_charset => {
            log::debug!("missing charset keyword, falling back to \\ansi");
            CharacterSet::default()
        },
        None => {
            return Err(Error::MalformedRtf(
                "missing charset keyword (\\ansi, \\mac, \\pc or \\pca)".to_string(),
            ));
        },
    };

    Ok((charset, ansi_codepage, default_font))
}
