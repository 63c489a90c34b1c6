//! Tree transformation passes that turn the decoded tree into final bytes.
//!
//! Three sequential passes:
//!
//! 1. **Non-visible group stripper** — every group that is not the document
//!    root and does not open with `\*\htmltag` is discarded whole. This
//!    removes `\fonttbl`, `\colortbl`, `\stylesheet`, `\info`, `\*\mhtmltag`
//!    and every other destination in one sweep.
//! 2. **Control-word stripper** — surviving leaf tokens are control words
//!    and symbols with no textual decoding; they vanish. Their delimiter
//!    space was already consumed by the lexer, so none leaks into the text.
//! 3. **Joiner** — surviving byte runs concatenate in document order.

use crate::tree::{Destination, Group, Node};

/// Discard every non-visible group.
///
/// With `keep_fontdef` the font-table groups stay in the tree for
/// diagnostics; the joiner still emits nothing for them.
pub fn strip_non_visible(group: &mut Group, keep_fontdef: bool) {
    group.children.retain_mut(|node| {
        let Node::Group(child) = node else {
            return true;
        };
        match child.destination() {
            Destination::HtmlTag => {
                strip_non_visible(child, keep_fontdef);
                true
            },
            Destination::FontTable if keep_fontdef => true,
            kind => {
                log::debug!(
                    "stripping non-visible {:?} group at byte offset {}",
                    kind,
                    child.open_offset
                );
                false
            },
        }
    });
}

/// Drop the leaf tokens that survived decoding; none of them render.
///
/// Font-definition groups retained for diagnostics keep their tokens: the
/// `\fonttbl` marker is what lets the joiner recognize and skip them.
pub fn strip_control_artifacts(group: &mut Group) {
    group.children.retain_mut(|node| match node {
        Node::Token(_) => false,
        Node::Group(child) => {
            if child.destination() != Destination::FontTable {
                strip_control_artifacts(child);
            }
            true
        },
        Node::Bytes(_) => true,
    });
}

/// Concatenate all surviving byte runs in document order.
pub fn join(group: &Group) -> Vec<u8> {
    let mut output = Vec::new();
    join_into(group, &mut output);
    output
}

fn join_into(group: &Group, output: &mut Vec<u8>) {
    for node in &group.children {
        match node {
            Node::Bytes(bytes) => output.extend_from_slice(bytes),
            Node::Group(child) => {
                // Font definitions retained for diagnostics never render.
                if child.destination() != Destination::FontTable {
                    join_into(child, output);
                }
            },
            Node::Token(_) => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DeEncapsulationOptions;
    use crate::error::Result;
    use crate::header::validate;
    use crate::lexer::Lexer;
    use crate::tree::build_tree;

    fn render(input: &[u8], keep_fontdef: bool) -> Result<Vec<u8>> {
        let options = DeEncapsulationOptions {
            keep_fontdef,
            ..Default::default()
        };
        let root = build_tree(Lexer::new(input).tokenize()?)?;
        let header = validate(&root, &options)?;
        let fonts = crate::fonts::parse_font_table(&root, &header);
        let doomed = crate::suppress::scan(&root);
        let root = crate::suppress::delete_tokens(root, &doomed);
        let mut root = crate::decode::decode_tree(root, &fonts, &header, &options)?;
        strip_non_visible(&mut root, options.keep_fontdef);
        strip_control_artifacts(&mut root);
        Ok(join(&root))
    }

    #[test]
    fn test_htmltag_group_retained() {
        let out = render(br"{\rtf1\ansi\ansicpg1252\fromhtml1{\*\htmltag <p>hi</p>}}", false)
            .unwrap();
        assert_eq!(out, b"<p>hi</p>");
    }

    #[test]
    fn test_plain_groups_stripped() {
        let out = render(
            br"{\rtf1\ansi\fromhtml1{\*\htmltag <b>x</b>}{\colortbl;\red0\green0\blue0;}{\info stuff}}",
            false,
        )
        .unwrap();
        assert_eq!(out, b"<b>x</b>");
    }

    #[test]
    fn test_mhtmltag_discarded() {
        let out = render(
            br"{\rtf1\ansi\fromhtml1{\*\mhtmltag64 <a href=x>}{\*\htmltag64 <a href=y>}}",
            false,
        )
        .unwrap();
        assert_eq!(out, b"<a href=y>");
    }

    #[test]
    fn test_fonttbl_stripped_by_default() {
        let out = render(
            br"{\rtf1\ansi\fromtext{\fonttbl{\f0 Arial;}}body}",
            false,
        )
        .unwrap();
        assert_eq!(out, b"body");
    }

    #[test]
    fn test_keep_fontdef_still_renders_nothing() {
        let out = render(
            br"{\rtf1\ansi\fromtext{\fonttbl{\f0 Arial;}}body}",
            true,
        )
        .unwrap();
        assert_eq!(out, b"body");
    }

    #[test]
    fn test_control_words_render_nothing() {
        let out = render(br"{\rtf1\ansi\fromtext\pard\plain hello\b0}", false).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_root_level_text_survives() {
        let out = render(br"{\rtf1\ansi\fromtext hello\par world}", false).unwrap();
        assert_eq!(out, b"hello\nworld");
    }
}
