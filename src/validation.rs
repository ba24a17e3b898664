//! Validation System - structural grammar of a document
//!
//! Rules run in order and the first failure wins. An invalid document is
//! rejected whole; nothing downstream ever sees a partially valid tree.

use log::warn;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use crate::node::{Document, Node, NodeKind};
use crate::registry::ModuleLookup;

/// Why and where a document was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{rule} at {path}{}: {message}", describe_node(.kind, .id))]
pub struct ValidationError {
    pub rule: &'static str,
    pub path: String,
    pub kind: Option<String>,
    pub id: Option<String>,
    pub message: String,
}

fn describe_node(kind: &Option<String>, id: &Option<String>) -> String {
    match (kind, id) {
        (Some(kind), Some(id)) => format!(" ({} #{})", kind, id),
        (Some(kind), None) => format!(" ({})", kind),
        (None, Some(id)) => format!(" (#{})", id),
        (None, None) => String::new(),
    }
}

impl ValidationError {
    fn document(rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            rule,
            path: "document".to_string(),
            kind: None,
            id: None,
            message: message.into(),
        }
    }

    fn node(rule: &'static str, path: &str, node: &Node, message: impl Into<String>) -> Self {
        let id = node.id.trim();
        Self {
            rule,
            path: path.to_string(),
            kind: Some(node.kind.to_string()),
            id: (!id.is_empty()).then(|| id.to_string()),
            message: message.into(),
        }
    }
}

/// One structural rule. Returns the first violation it finds.
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn check(&self, doc: &Document, modules: &dyn ModuleLookup) -> Result<(), ValidationError>;
}

// --- Concrete Rules ---

pub struct DocumentShapeRule;

impl ValidationRule for DocumentShapeRule {
    fn name(&self) -> &'static str {
        "document_shape"
    }

    fn check(&self, doc: &Document, _modules: &dyn ModuleLookup) -> Result<(), ValidationError> {
        if doc.version.trim().is_empty() {
            return Err(ValidationError::document(
                self.name(),
                "document must declare a version",
            ));
        }
        Ok(())
    }
}

pub struct TopLevelSectionRule;

impl ValidationRule for TopLevelSectionRule {
    fn name(&self) -> &'static str {
        "top_level_section"
    }

    fn check(&self, doc: &Document, _modules: &dyn ModuleLookup) -> Result<(), ValidationError> {
        for (i, node) in doc.content.iter().enumerate() {
            let path = format!("content[{}]", i);
            if node.kind != NodeKind::Section {
                return Err(ValidationError::node(
                    self.name(),
                    &path,
                    node,
                    format!("top-level node must be a section, found `{}`", node.kind),
                ));
            }
            if node.id.trim().is_empty() {
                return Err(ValidationError::node(
                    self.name(),
                    &path,
                    node,
                    "section must have a non-empty id",
                ));
            }
        }
        Ok(())
    }
}

/// section > row > column > module, recursively. Columns may also nest rows;
/// modules may only hold other registered modules.
pub struct GrammarRule;

impl GrammarRule {
    fn check_children(
        &self,
        parent: &Node,
        path: &str,
        modules: &dyn ModuleLookup,
    ) -> Result<(), ValidationError> {
        for (i, child) in parent.children.iter().enumerate() {
            let child_path = format!("{}.children[{}]", path, i);
            self.check_child(parent, child, &child_path, modules)?;
            self.check_children(child, &child_path, modules)?;
        }
        Ok(())
    }

    fn check_child(
        &self,
        parent: &Node,
        child: &Node,
        path: &str,
        modules: &dyn ModuleLookup,
    ) -> Result<(), ValidationError> {
        let expected = match parent.kind {
            NodeKind::Section => Some(NodeKind::Row),
            NodeKind::Row => Some(NodeKind::Column),
            NodeKind::Column | NodeKind::Module(_) => None,
        };

        if let Some(expected) = expected {
            if child.kind != expected {
                return Err(ValidationError::node(
                    self.name(),
                    path,
                    child,
                    format!(
                        "a {}'s children must be {}s, found `{}`",
                        parent.kind, expected, child.kind
                    ),
                ));
            }
            return Ok(());
        }

        if child.id.trim().is_empty() {
            return Err(ValidationError::node(
                self.name(),
                path,
                child,
                format!("node inside a {} must have a non-empty id", parent.kind),
            ));
        }

        match (&parent.kind, &child.kind) {
            (NodeKind::Column, NodeKind::Row) => Ok(()),
            (_, NodeKind::Module(slug)) if modules.exists(slug) => Ok(()),
            (_, NodeKind::Module(slug)) => Err(ValidationError::node(
                self.name(),
                path,
                child,
                format!("module kind `{}` is not registered", slug),
            )),
            (_, structural) => Err(ValidationError::node(
                self.name(),
                path,
                child,
                format!("`{}` is not allowed inside a {}", structural, parent.kind),
            )),
        }
    }
}

impl ValidationRule for GrammarRule {
    fn name(&self) -> &'static str {
        "grammar"
    }

    fn check(&self, doc: &Document, modules: &dyn ModuleLookup) -> Result<(), ValidationError> {
        for (i, section) in doc.content.iter().enumerate() {
            self.check_children(section, &format!("content[{}]", i), modules)?;
        }
        Ok(())
    }
}

pub struct UniqueIdRule;

impl ValidationRule for UniqueIdRule {
    fn name(&self) -> &'static str {
        "unique_ids"
    }

    fn check(&self, doc: &Document, _modules: &dyn ModuleLookup) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        let mut duplicate = None;
        doc.walk(|node| {
            let id = node.id.trim();
            if duplicate.is_none() && !id.is_empty() && !seen.insert(id) {
                duplicate = Some(node);
            }
        });
        match duplicate {
            Some(node) => Err(ValidationError::node(
                self.name(),
                "document",
                node,
                format!("id `{}` is used more than once", node.id.trim()),
            )),
            None => Ok(()),
        }
    }
}

/// Validator orchestrates rules in a fixed order
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(DocumentShapeRule),
                Box::new(TopLevelSectionRule),
                Box::new(GrammarRule),
                Box::new(UniqueIdRule),
            ],
        }
    }

    pub fn validate(&self, doc: &Document, modules: &dyn ModuleLookup) -> Result<(), ValidationError> {
        for rule in &self.rules {
            if let Err(err) = rule.check(doc, modules) {
                warn!(
                    "event=validation_rejected module=validation rule={} path={}",
                    err.rule, err.path
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// Checks the raw shape (`version` string, array `content`) before typed
    /// deserialization, then runs the rules.
    pub fn validate_value(
        &self,
        value: &Value,
        modules: &dyn ModuleLookup,
    ) -> Result<Document, ValidationError> {
        let shape = DocumentShapeRule.name();
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::document(shape, "document must be an object"))?;

        match object.get("version") {
            Some(Value::String(v)) if !v.trim().is_empty() => {}
            _ => {
                return Err(ValidationError::document(
                    shape,
                    "document must declare a version",
                ))
            }
        }
        if !object.get("content").is_some_and(Value::is_array) {
            return Err(ValidationError::document(
                shape,
                "document content must be an array",
            ));
        }

        let doc: Document = serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::document(shape, format!("malformed node: {}", e)))?;
        self.validate(&doc, modules)?;
        Ok(doc)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
