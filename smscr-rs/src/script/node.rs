//! Document tree.
//!
//! The tree is built once by the parser and only read afterwards, so a parsed
//! document can be shared between any number of concurrent executions.
//!
//! Nesting depth is bounded only by the input, so nothing here walks the tree
//! recursively, dropping included.

use std::mem;

use super::token::Token;

/// A node of the parsed document.  Parents own their children.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// The root; the only node kind besides [`Node::ForLoop`] with children.
    Document { children: Vec<Node> },
    /// Literal text, already unescaped.
    Text(String),
    /// `{$= … $}`: tokens evaluated on the echo stack.
    Echo(Vec<Token>),
    ForLoop(ForLoop),
}

/// `{$FOR var start end [step]$} … {$END$}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub variable: String,
    pub start: Token,
    pub end: Token,
    /// Absent means a step of `1`, applied at execution time.
    pub step: Option<Token>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn document(children: Vec<Node>) -> Self {
        Node::Document { children }
    }

    /// Child nodes in order; empty for leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document { children } => children,
            Node::ForLoop(l) => &l.children,
            Node::Text(_) | Node::Echo(_) => &[],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Document { .. } => "document",
            Node::Text(_) => "text",
            Node::Echo(_) => "echo",
            Node::ForLoop(_) => "for",
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Document { children } => Some(children),
            Node::ForLoop(l) => Some(&mut l.children),
            Node::Text(_) | Node::Echo(_) => None,
        }
    }

    /// Number of nodes in this subtree, `self` included.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.children());
        }
        count
    }

    /// Deepest `FOR` nesting in this subtree.
    pub fn loop_depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 0)];
        while let Some((node, above)) = pending.pop() {
            let depth = match node {
                Node::ForLoop(_) => above + 1,
                _ => above,
            };
            deepest = deepest.max(depth);
            pending.extend(node.children().iter().map(|c| (c, depth)));
        }
        deepest
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let Some(children) = self.children_mut() else { return };
        let mut pending = mem::take(children);
        while let Some(mut node) = pending.pop() {
            if let Some(grandchildren) = node.children_mut() {
                pending.append(grandchildren);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn for_loop(children: Vec<Node>) -> Node {
        Node::ForLoop(ForLoop {
            variable: "i".into(),
            start: Token::Int(1),
            end: Token::Int(3),
            step: None,
            children,
        })
    }

    #[test]
    fn counts_and_depth() {
        let doc = Node::document(vec![
            Node::Text("a".into()),
            for_loop(vec![for_loop(vec![Node::Echo(vec![Token::Variable("i".into())])])]),
        ]);
        assert_eq!(doc.node_count(), 5);
        assert_eq!(doc.loop_depth(), 2);
        assert_eq!(doc.children().len(), 2);
        assert_eq!(doc.children()[1].kind(), "for");
    }

    fn nested(depth: usize) -> Node {
        let mut node = Node::Echo(vec![]);
        for _ in 0..depth {
            node = for_loop(vec![node]);
        }
        Node::document(vec![node])
    }

    #[test]
    fn deep_trees_are_walked_and_dropped_without_recursion() {
        let doc = nested(200_000);
        assert_eq!(doc.node_count(), 200_002);
        assert_eq!(doc.loop_depth(), 200_000);
        drop(doc);
    }

    #[test]
    fn loop_depth_takes_the_deepest_branch() {
        let doc = Node::document(vec![
            for_loop(vec![]),
            for_loop(vec![Node::Text("x".into()), for_loop(vec![for_loop(vec![])])]),
            Node::Text("y".into()),
        ]);
        assert_eq!(doc.loop_depth(), 3);
        assert_eq!(doc.node_count(), 7);
    }

    #[test]
    fn leaves_have_no_children() {
        assert!(Node::Text("x".into()).children().is_empty());
        assert!(Node::Echo(vec![]).children().is_empty());
    }
}
