//! ID Generation - render-time allocation and clone-time regeneration
//!
//! Ids are `<kind>_<suffix>`. During a render the suffix is a counter so the
//! output stays reproducible; when a block is cloned every id is replaced by
//! a random suffix so original and clone can share a page.

use log::debug;
use std::collections::HashSet;
use uuid::Uuid;

use crate::node::{Document, Node, NodeKind};

/// Prefix derived from the kind slug, restricted to selector-safe characters.
pub fn kind_prefix(kind: &NodeKind) -> String {
    let prefix: String = kind
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect();
    if prefix.is_empty() || prefix.starts_with(|c: char| c.is_ascii_digit()) {
        format!("el{}", prefix)
    } else {
        prefix
    }
}

fn random_suffix() -> String {
    let mut simple = Uuid::new_v4().simple().to_string();
    simple.truncate(8);
    simple
}

/// Fresh random id for a kind. Not checked against anything.
pub fn generate_id(kind: &NodeKind) -> String {
    format!("{}_{}", kind_prefix(kind), random_suffix())
}

/// Tracks claimed ids for one render and hands out deterministic new ones.
///
/// Reserved ids belong to authored nodes that have not been rendered yet.
/// Generated ids never take them.
#[derive(Debug, Default)]
pub struct IdAllocator {
    used: HashSet<String>,
    reserved: HashSet<String>,
    counter: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, authored: &str) {
        let authored = authored.trim();
        if !authored.is_empty() {
            self.reserved.insert(authored.to_string());
        }
    }

    /// Keeps the authored id when it is present and still free, otherwise
    /// allocates `<kind>_<n>`.
    pub fn claim(&mut self, kind: &NodeKind, authored: &str) -> String {
        let authored = authored.trim();
        if !authored.is_empty() {
            if self.used.insert(authored.to_string()) {
                return authored.to_string();
            }
            debug!(
                "event=duplicate_id module=ids id={} kind={} action=regenerate",
                authored, kind
            );
        }

        let prefix = kind_prefix(kind);
        loop {
            self.counter += 1;
            let candidate = format!("{}_{}", prefix, self.counter);
            if !self.reserved.contains(&candidate) && self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn regenerate(node: &mut Node, taken: &mut HashSet<String>) {
    let mut id = generate_id(&node.kind);
    while !taken.insert(id.clone()) {
        id = generate_id(&node.kind);
    }
    node.id = id;
    for child in &mut node.children {
        regenerate(child, taken);
    }
}

/// Deep copy of `nodes` with every id regenerated. `reserved` holds ids the
/// copy must not reuse, typically those of the document it will join.
pub fn clone_nodes(nodes: &[Node], reserved: &HashSet<String>) -> Vec<Node> {
    let mut taken = reserved.clone();
    let mut nodes = nodes.to_vec();
    for node in &mut nodes {
        regenerate(node, &mut taken);
    }
    nodes
}

/// Clones a document, reserving all of its own ids so the clone can be
/// compiled next to the original without selector collisions.
pub fn clone_document(doc: &Document) -> Document {
    let reserved: HashSet<String> = doc.ids().into_iter().map(str::to_string).collect();
    Document::new(doc.version.clone(), clone_nodes(&doc.content, &reserved))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new(
            "1.0.0",
            vec![Node::section("section_a").with_child(
                Node::row("row_a").with_child(
                    Node::column("column_a")
                        .with_child(Node::module("heading", "heading_a"))
                        .with_child(Node::module("fullwidth header", "x")),
                ),
            )],
        )
    }

    #[test]
    fn test_claim_keeps_authored_and_fixes_duplicates() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.claim(&NodeKind::Row, "row_1"), "row_1");
        assert_eq!(ids.claim(&NodeKind::Row, "row_1"), "row_2");
        assert_eq!(ids.claim(&NodeKind::Row, ""), "row_3");
    }

    #[test]
    fn test_claim_skips_taken_generated_names() {
        let mut ids = IdAllocator::new();
        ids.claim(&NodeKind::Column, "column_1");
        assert_eq!(ids.claim(&NodeKind::Column, ""), "column_2");
    }

    #[test]
    fn test_generated_ids_skip_reserved_names() {
        let mut ids = IdAllocator::new();
        ids.reserve("row_1");
        ids.reserve("  ");
        assert_eq!(ids.claim(&NodeKind::Row, ""), "row_2");
        assert_eq!(ids.claim(&NodeKind::Row, "row_1"), "row_1");
        assert_eq!(ids.claim(&NodeKind::Row, "row_1"), "row_3");
    }

    #[test]
    fn test_clone_regenerates_every_id_with_kind_prefix() {
        let doc = sample();
        let clone = clone_document(&doc);

        let original: HashSet<&str> = doc.ids().into_iter().collect();
        for (old, new) in doc.ids().iter().zip(clone.ids()) {
            assert_ne!(*old, new);
            assert!(!original.contains(new));
        }
        let kinds: Vec<String> = {
            let mut v = vec![];
            clone.walk(|n| v.push(format!("{}_", kind_prefix(&n.kind))));
            v
        };
        for (id, prefix) in clone.ids().iter().zip(kinds) {
            assert!(id.starts_with(&prefix), "{} should start with {}", id, prefix);
        }
        assert!(!clone.ids().contains(&"x"));
    }

    #[test]
    fn test_kind_prefix_is_selector_safe() {
        assert_eq!(kind_prefix(&NodeKind::module("fullwidth header")), "fullwidth-header");
        assert_eq!(kind_prefix(&NodeKind::module("3col")), "el3col");
        assert_eq!(kind_prefix(&NodeKind::Section), "section");
    }
}
