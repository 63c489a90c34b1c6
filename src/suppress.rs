//! HTMLRTF suppression scanning.
//!
//! Per [MS-OXRTFEX], `\htmlrtf` (no argument or `1`) marks the start of RTF
//! the encapsulator injected for pretty-printing and `\htmlrtf0` marks its
//! end. The state is scoped: child groups inherit it, and closing a group
//! restores whatever held at its opening brace.
//!
//! The scanner walks the tree with an explicit boolean stack and collects
//! the identities of every token to remove. Matching is by identity (offset
//! plus variant), never by value: the stream is full of identical `\par`s.
//! Exempt are the `\htmlrtf...` words themselves (they keep driving the
//! state machine) and everything inside an `\*\htmltag` destination, which
//! is literal HTML payload.

use std::collections::HashSet;

use crate::lexer::TokenId;
use crate::tree::{Destination, Group, Node, Visit, walk};

/// Compute the set of token identities suppressed by `\htmlrtf` regions.
pub fn scan(root: &Group) -> HashSet<TokenId> {
    let mut doomed = HashSet::new();
    let mut states: Vec<bool> = vec![false];
    let mut htmltag_depth = 0usize;

    walk(root, &mut |step| match step {
        Visit::GroupEnter(group) => {
            if group as *const Group != root as *const Group {
                let inherited = *states.last().expect("state stack is never empty");
                states.push(inherited);
            }
            if group.destination() == Destination::HtmlTag {
                htmltag_depth += 1;
            }
        },
        Visit::GroupLeave(group) => {
            if group.destination() == Destination::HtmlTag {
                htmltag_depth -= 1;
            }
            if group as *const Group != root as *const Group {
                states.pop();
            }
        },
        Visit::Token(token) => {
            if htmltag_depth > 0 {
                return;
            }
            match token.control_word() {
                Some(("htmlrtf", param)) => {
                    let state = states.last_mut().expect("state stack is never empty");
                    *state = param.unwrap_or(1) != 0;
                },
                _ => {
                    if *states.last().expect("state stack is never empty") {
                        doomed.insert(token.id());
                    }
                },
            }
        },
    });

    debug_assert_eq!(states.len(), 1, "suppression state must restore per group");
    if !doomed.is_empty() {
        log::debug!("marked {} token(s) for htmlrtf suppression", doomed.len());
    }
    doomed
}

/// Remove every marked token from the tree. Groups stay in place even when
/// emptied; the non-visible group stripper deals with them later.
pub fn delete_tokens(group: Group, doomed: &HashSet<TokenId>) -> Group {
    Group {
        open_offset: group.open_offset,
        close_offset: group.close_offset,
        children: group
            .children
            .into_iter()
            .filter_map(|node| match node {
                Node::Token(tok) if doomed.contains(&tok.id()) => None,
                Node::Token(tok) => Some(Node::Token(tok)),
                Node::Group(child) => Some(Node::Group(delete_tokens(child, doomed))),
                Node::Bytes(bytes) => Some(Node::Bytes(bytes)),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::tree::build_tree;
    use proptest::prelude::*;

    fn scan_str(input: &[u8]) -> (Group, HashSet<TokenId>) {
        let root = build_tree(Lexer::new(input).tokenize().unwrap()).unwrap();
        let doomed = scan(&root);
        (root, doomed)
    }

    /// Collect surviving literal bytes in document order.
    fn surviving_literals(root: &Group, doomed: &HashSet<TokenId>) -> Vec<u8> {
        let mut out = Vec::new();
        walk(root, &mut |step| {
            if let Visit::Token(tok) = step
                && !doomed.contains(&tok.id())
                && let crate::lexer::TokenKind::Literal(bytes) = &tok.kind
            {
                out.extend_from_slice(bytes);
            }
        });
        out
    }

    #[test]
    fn test_flat_suppression() {
        let (root, doomed) = scan_str(br"{\rtf1\ansi\fromhtml1\htmlrtf junk\htmlrtf0 keep}");
        assert_eq!(surviving_literals(&root, &doomed), b"keep");
    }

    #[test]
    fn test_state_inherited_by_child_group() {
        let (root, doomed) = scan_str(br"{\rtf1\htmlrtf{\b hidden}\htmlrtf0 shown}");
        assert_eq!(surviving_literals(&root, &doomed), b"shown");
    }

    #[test]
    fn test_state_restored_on_group_close() {
        // htmlrtf0 inside the group must not leak out of it.
        let (root, doomed) = scan_str(br"{\rtf1\htmlrtf{\htmlrtf0 shown}hidden\htmlrtf0 tail}");
        assert_eq!(surviving_literals(&root, &doomed), b"showntail");
    }

    #[test]
    fn test_htmlrtf1_turns_suppression_on() {
        let (root, doomed) = scan_str(br"{\rtf1\htmlrtf1 gone\htmlrtf0 kept}");
        assert_eq!(surviving_literals(&root, &doomed), b"kept");
    }

    #[test]
    fn test_htmltag_contents_exempt() {
        let (root, doomed) =
            scan_str(br"{\rtf1\htmlrtf{\*\htmltag64 <b>x</b>}junk\htmlrtf0 ok}");
        assert_eq!(surviving_literals(&root, &doomed), b"<b>x</b>ok");
    }

    #[test]
    fn test_delete_tokens_removes_only_marked() {
        let (root, doomed) = scan_str(br"{\rtf1\htmlrtf junk\htmlrtf0 keep}");
        let pruned = delete_tokens(root, &doomed);
        let none = HashSet::new();
        assert_eq!(surviving_literals(&pruned, &none), b"keep");
    }

    #[test]
    fn test_restoration_property_nested() {
        // State after every group close equals state before its open; the
        // scanner debug-asserts the stack unwinds to exactly one entry.
        let (_, doomed) = scan_str(br"{\rtf1{\htmlrtf{\b a}}{\i b}c}");
        // The htmlrtf only suppresses within its own group: {\b a} is doomed,
        // {\i b} and c are not.
        assert!(!doomed.is_empty());
    }

    /// Script for building random htmlrtf streams: toggles and text at any
    /// nesting depth.
    #[derive(Debug, Clone)]
    enum Item {
        On,
        Off,
        Text,
        Group(Vec<Item>),
    }

    fn scripts() -> impl Strategy<Value = Vec<Item>> {
        let leaf = prop_oneof![Just(Item::On), Just(Item::Off), Just(Item::Text)];
        let item = leaf.prop_recursive(3, 24, 5, |inner| {
            proptest::collection::vec(inner, 0..5).prop_map(Item::Group)
        });
        proptest::collection::vec(item, 0..8)
    }

    fn render(items: &[Item], groups: bool, out: &mut Vec<u8>) {
        for item in items {
            match item {
                Item::On => out.extend_from_slice(b"\\htmlrtf "),
                Item::Off => out.extend_from_slice(b"\\htmlrtf0 "),
                Item::Text => out.extend_from_slice(b"t "),
                Item::Group(children) => {
                    if groups {
                        out.push(b'{');
                        render(children, true, out);
                        out.push(b'}');
                    }
                },
            }
        }
    }

    proptest! {
        /// State restores at every group close: whether trailing root-level
        /// text survives cannot depend on toggles inside sibling groups, so
        /// dropping every group whole must not change the outcome. The
        /// scanner's own debug assertion additionally checks the state stack
        /// unwinds to exactly one entry on each generated input.
        #[test]
        fn prop_state_restoration(script in scripts()) {
            let survives_end = |input: &[u8]| {
                let root = build_tree(Lexer::new(input).tokenize().unwrap()).unwrap();
                let doomed = scan(&root);
                surviving_literals(&root, &doomed)
                    .windows(3)
                    .any(|w| w == b"END")
            };

            let mut with_groups = b"{\\rtf1 ".to_vec();
            render(&script, true, &mut with_groups);
            with_groups.extend_from_slice(b"END}");

            let mut without_groups = b"{\\rtf1 ".to_vec();
            render(&script, false, &mut without_groups);
            without_groups.extend_from_slice(b"END}");

            prop_assert_eq!(survives_end(&with_groups), survives_end(&without_groups));
        }
    }
}
