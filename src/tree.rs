//! Token tree built from the flat token stream.
//!
//! Groups nest strictly; leaves are typed tokens. The decoder later rewrites
//! leaf runs into raw byte nodes, so the node type carries all three shapes.

use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A leaf token from the lexer.
    Token(Token),
    /// A nested group.
    Group(Group),
    /// Decoded output bytes, produced by the text decoder.
    Bytes(Vec<u8>),
}

/// Destination kind of a group, read off its leading tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// `{\*\htmltag ...}` — carries literal HTML payload, retained
    HtmlTag,
    /// `{\*\mhtmltag ...}` — MHTML counterpart, discarded whole
    MHtmlTag,
    /// `{\fonttbl ...}` — font definitions
    FontTable,
    /// Any other `{\*\... }` destination
    Starred,
    /// A plain group with no destination marker
    Other,
}

/// An ordered group of child nodes delimited by `{` and `}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Group {
    /// Byte offset of the opening brace.
    pub open_offset: usize,
    /// Byte offset of the closing brace.
    pub close_offset: usize,
    /// Children in document order.
    pub children: Vec<Node>,
}

impl Group {
    /// Leaf tokens in order, skipping layout newlines. Does not descend.
    pub fn significant_tokens(&self) -> impl Iterator<Item = &Token> {
        self.children.iter().filter_map(|node| match node {
            Node::Token(tok) if !matches!(tok.kind, TokenKind::Newline) => Some(tok),
            _ => None,
        })
    }

    /// Classify this group by its leading tokens.
    pub fn destination(&self) -> Destination {
        let mut tokens = self.significant_tokens();
        match tokens.next() {
            Some(tok) if matches!(tok.kind, TokenKind::ControlSymbol(b'*')) => {
                match tokens.next().and_then(Token::control_word) {
                    Some(("htmltag", _)) => Destination::HtmlTag,
                    Some(("mhtmltag", _)) => Destination::MHtmlTag,
                    _ => Destination::Starred,
                }
            },
            Some(tok) if tok.is_control_word("fonttbl") => Destination::FontTable,
            _ => Destination::Other,
        }
    }
}

/// Build the document tree from a token stream.
///
/// The stream must consist of exactly one balanced top-level group, with
/// nothing but layout newlines before or after it.
pub fn build_tree(tokens: Vec<Token>) -> Result<Group> {
    let mut stack: Vec<Group> = Vec::new();
    let mut root: Option<Group> = None;
    let mut last_offset = 0;

    for token in tokens {
        last_offset = token.offset;
        match token.kind {
            TokenKind::GroupOpen => {
                if root.is_some() {
                    return Err(Error::malformed_at(
                        token.offset,
                        "content after the document group",
                    ));
                }
                stack.push(Group {
                    open_offset: token.offset,
                    close_offset: 0,
                    children: Vec::new(),
                });
            },
            TokenKind::GroupClose => {
                let Some(mut group) = stack.pop() else {
                    return Err(Error::malformed_at(token.offset, "unmatched closing brace"));
                };
                group.close_offset = token.offset;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Group(group)),
                    None => root = Some(group),
                }
            },
            TokenKind::Newline => {
                // Layout outside the document group is tolerated; inside, it
                // stays in the tree so offsets remain contiguous.
                if let Some(top) = stack.last_mut() {
                    top.children.push(Node::Token(token));
                }
            },
            _ => match stack.last_mut() {
                Some(top) => top.children.push(Node::Token(token)),
                None => {
                    return Err(Error::malformed_at(
                        token.offset,
                        if root.is_some() {
                            "content after the document group"
                        } else {
                            "content before the document group"
                        },
                    ));
                },
            },
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::malformed_at(open.open_offset, "unbalanced group"));
    }
    root.ok_or_else(|| Error::malformed_at(last_offset, "no document group"))
}

/// One step of a depth-first traversal.
#[derive(Debug, Clone, Copy)]
pub enum Visit<'a> {
    /// Entering a group (its `{`).
    GroupEnter(&'a Group),
    /// A leaf token.
    Token(&'a Token),
    /// Leaving a group (its `}`).
    GroupLeave(&'a Group),
}

/// Depth-first traversal driver.
///
/// Iterative with an explicit stack so that pathological nesting depth never
/// threatens the call stack. The visitor is a single function over [`Visit`]
/// steps; passes that need scoped state push on `GroupEnter` and pop on
/// `GroupLeave`.
pub fn walk<'a, F: FnMut(Visit<'a>)>(root: &'a Group, visit: &mut F) {
    let mut stack: Vec<(&'a Group, usize)> = vec![(root, 0)];
    visit(Visit::GroupEnter(root));

    loop {
        let Some(top) = stack.last_mut() else {
            break;
        };
        let group: &'a Group = top.0;
        let index = top.1;
        if index < group.children.len() {
            top.1 += 1;
            match &group.children[index] {
                Node::Token(tok) => visit(Visit::Token(tok)),
                Node::Group(child) => {
                    visit(Visit::GroupEnter(child));
                    stack.push((child, 0));
                },
                Node::Bytes(_) => {},
            }
        } else {
            visit(Visit::GroupLeave(group));
            stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use proptest::prelude::*;

    fn tree(input: &[u8]) -> Result<Group> {
        build_tree(Lexer::new(input).tokenize()?)
    }

    #[test]
    fn test_nested_groups() {
        let root = tree(br"{\rtf1{\fonttbl{\f0 Arial;}}}").unwrap();
        assert_eq!(root.open_offset, 0);
        assert_eq!(root.children.len(), 2);
        let Node::Group(fonttbl) = &root.children[1] else {
            panic!("expected nested group");
        };
        assert_eq!(fonttbl.destination(), Destination::FontTable);
    }

    #[test]
    fn test_unbalanced_open() {
        let err = tree(br"{\rtf1{\b bold}").unwrap_err();
        assert!(err.to_string().contains("unbalanced group"));
    }

    #[test]
    fn test_unmatched_close() {
        let err = tree(br"{\rtf1}}").unwrap_err();
        assert!(err.to_string().contains("after the document group") || err.to_string().contains("unmatched"));
    }

    #[test]
    fn test_trailing_newline_tolerated() {
        assert!(tree(b"{\\rtf1}\r\n").is_ok());
    }

    #[test]
    fn test_content_before_root_rejected() {
        assert!(tree(b"junk{\\rtf1}").is_err());
    }

    #[test]
    fn test_destination_detection() {
        let root = tree(br"{\rtf1{\*\htmltag64 <p>}{\*\mhtmltag64 x}{\*\generator y}{\b z}}").unwrap();
        let kinds: Vec<Destination> = root
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Group(g) => Some(g.destination()),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                Destination::HtmlTag,
                Destination::MHtmlTag,
                Destination::Starred,
                Destination::Other
            ]
        );
    }

    #[test]
    fn test_walk_enter_leave_pairing() {
        let root = tree(br"{\rtf1{\b x{\i y}}z}").unwrap();
        let mut depth = 0usize;
        let mut max_depth = 0usize;
        walk(&root, &mut |step| match step {
            Visit::GroupEnter(_) => {
                depth += 1;
                max_depth = max_depth.max(depth);
            },
            Visit::GroupLeave(_) => depth -= 1,
            Visit::Token(_) => {},
        });
        assert_eq!(depth, 0);
        assert_eq!(max_depth, 3);
    }

    proptest! {
        /// Every accepted input has as many opening as closing braces.
        #[test]
        fn prop_bracket_balance(input in "[{}a-z\\\\ ]{0,64}") {
            let Ok(tokens) = Lexer::new(input.as_bytes()).tokenize() else {
                return Ok(());
            };
            let opens = tokens.iter().filter(|t| matches!(t.kind, TokenKind::GroupOpen)).count();
            let closes = tokens.iter().filter(|t| matches!(t.kind, TokenKind::GroupClose)).count();
            if build_tree(tokens).is_ok() {
                prop_assert_eq!(opens, closes);
            }
        }
    }
}
