//! Node Model - the layout tree every other module speaks
//!
//! A document is a list of sections; sections hold rows, rows hold columns,
//! columns hold content modules. The grammar itself is enforced by
//! [`crate::validation`], the shape lives here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub type NodeId = String;

/// Declared attributes of a node. Keys may carry `__tablet`, `__phone` or
/// `__hover` suffixes; [`crate::style`] splits them into variants.
pub type Attributes = BTreeMap<String, Value>;

/// Discriminator of a node's role in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Section,
    Row,
    Column,
    /// Content module, resolved through the module registry by slug.
    Module(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Section => "section",
            NodeKind::Row => "row",
            NodeKind::Column => "column",
            NodeKind::Module(slug) => slug,
        }
    }

    pub fn is_structural(&self) -> bool {
        !matches!(self, NodeKind::Module(_))
    }

    pub fn module(slug: impl Into<String>) -> Self {
        NodeKind::from(slug.into())
    }
}

impl From<String> for NodeKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "section" => NodeKind::Section,
            "row" => NodeKind::Row,
            "column" => NodeKind::Column,
            _ => NodeKind::Module(value),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(value: &str) -> Self {
        NodeKind::from(value.to_string())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Module(slug) => slug,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type", alias = "kind")]
    pub kind: NodeKind,
    #[serde(default)]
    pub id: NodeId,
    #[serde(default)]
    pub attrs: Attributes,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: impl Into<NodeKind>, id: impl Into<NodeId>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attrs: Attributes::new(),
            children: vec![],
        }
    }

    pub fn section(id: impl Into<NodeId>) -> Self {
        Self::new(NodeKind::Section, id)
    }

    pub fn row(id: impl Into<NodeId>) -> Self {
        Self::new(NodeKind::Row, id)
    }

    pub fn column(id: impl Into<NodeId>) -> Self {
        Self::new(NodeKind::Column, id)
    }

    pub fn module(slug: &str, id: impl Into<NodeId>) -> Self {
        Self::new(NodeKind::module(slug), id)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Pre-order visit of this node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// A full page or template body: version plus top-level sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub version: String,
    pub content: Vec<Node>,
}

impl Document {
    pub fn new(version: impl Into<String>, content: Vec<Node>) -> Self {
        Self {
            version: version.into(),
            content,
        }
    }

    pub fn empty() -> Self {
        Self::new(crate::DOCUMENT_FORMAT_VERSION, vec![])
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a Node)) {
        for node in &self.content {
            node.walk(&mut visit);
        }
    }

    /// All ids in pre-order, empty ids included.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids = vec![];
        self.walk(|node| ids.push(node.id.as_str()));
        ids
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_| count += 1);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_type_field() {
        let node: Node = serde_json::from_value(json!({
            "type": "section",
            "id": "section_1",
            "children": [{"type": "row", "id": "row_1"}]
        }))
        .unwrap();

        assert_eq!(node.kind, NodeKind::Section);
        assert_eq!(node.children[0].kind, NodeKind::Row);

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["type"], "section");
    }

    #[test]
    fn test_kind_alias_and_module_slug() {
        let node: Node = serde_json::from_value(json!({"kind": "fullwidth_header", "id": "m"})).unwrap();
        assert_eq!(node.kind, NodeKind::Module("fullwidth_header".to_string()));
        assert!(!node.kind.is_structural());
    }

    #[test]
    fn test_walk_is_pre_order() {
        let doc = Document::new(
            "1.0.0",
            vec![Node::section("s").with_child(
                Node::row("r")
                    .with_child(Node::column("c1").with_child(Node::module("text", "t")))
                    .with_child(Node::column("c2")),
            )],
        );
        assert_eq!(doc.ids(), vec!["s", "r", "c1", "t", "c2"]);
        assert_eq!(doc.node_count(), 5);
    }
}
