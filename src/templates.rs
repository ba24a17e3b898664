//! Template System - header/footer/body layouts with their conditions

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::node::Document;
use crate::selection::{Condition, PageType};

pub type TemplateId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Header,
    Footer,
    Body,
}

impl TemplateType {
    pub const ALL: [TemplateType; 3] = [TemplateType::Header, TemplateType::Body, TemplateType::Footer];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateType::Header => "header",
            TemplateType::Footer => "footer",
            TemplateType::Body => "body",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub content: Document,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_true() -> bool { true }
fn default_priority() -> i32 { 10 }

impl Template {
    pub fn new(id: impl Into<TemplateId>, template_type: TemplateType, content: Document) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            template_type,
            content,
            priority: default_priority(),
            is_default: false,
            is_active: true,
            conditions: vec![],
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template id already registered: {0}")]
    DuplicateId(String),

    #[error("A default {template_type} template already exists: {existing}")]
    DuplicateDefault {
        template_type: TemplateType,
        existing: String,
    },

    #[error("Invalid condition on {template_id}: {reason}")]
    InvalidCondition { template_id: String, reason: String },

    #[error("Duplicate condition on {template_id}: {label}")]
    DuplicateCondition { template_id: String, label: String },

    #[error("Malformed template file {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Human readable condition, e.g. `Single Post #42`.
pub fn condition_label(condition: &Condition) -> String {
    condition.label()
}

fn check_condition(template_id: &str, condition: &Condition) -> Result<(), TemplateError> {
    let invalid = |reason: String| TemplateError::InvalidCondition {
        template_id: template_id.to_string(),
        reason,
    };
    if condition.page_type == PageType::Unknown {
        return Err(invalid("`unknown` cannot be targeted by a condition".to_string()));
    }
    if condition.object_id.is_some() && !condition.page_type.has_objects() {
        return Err(invalid(format!(
            "page type `{}` does not carry object ids",
            condition.page_type
        )));
    }
    Ok(())
}

/// Validated conditions with duplicates rejected and owner filled in.
fn normalize_conditions(
    template_id: &str,
    conditions: Vec<Condition>,
) -> Result<Vec<Condition>, TemplateError> {
    let mut normalized: Vec<Condition> = Vec::with_capacity(conditions.len());
    for mut condition in conditions {
        check_condition(template_id, &condition)?;
        if normalized.iter().any(|c| c.same_rule(&condition)) {
            return Err(TemplateError::DuplicateCondition {
                template_id: template_id.to_string(),
                label: condition.label(),
            });
        }
        condition.template_id = template_id.to_string();
        normalized.push(condition);
    }
    Ok(normalized)
}

fn read_template(path: &Path) -> Result<Template, TemplateError> {
    let malformed = |reason: String| TemplateError::Malformed {
        path: path.display().to_string(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))
}

/// Registered templates in registration order, which is also the tie-break
/// order of selection.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: Vec<Template>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self { templates: vec![] }
    }

    /// Loads every `*.json` template in `dir`, sorted by file name. Files that
    /// fail to parse or register are skipped.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut set = Self::new();
        if !dir.exists() {
            return Ok(set);
        }

        let mut paths = vec![];
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let loaded = read_template(&path).and_then(|template| set.register(template));
            if let Err(e) = loaded {
                warn!(
                    "event=template_skipped module=templates path={} reason={}",
                    path.display(),
                    e
                );
            }
        }
        Ok(set)
    }

    pub fn register(&mut self, mut template: Template) -> Result<(), TemplateError> {
        if self.get(&template.id).is_some() {
            return Err(TemplateError::DuplicateId(template.id));
        }
        if template.is_default {
            if let Some(existing) = self.default_for(template.template_type) {
                return Err(TemplateError::DuplicateDefault {
                    template_type: template.template_type,
                    existing: existing.id.clone(),
                });
            }
        }
        template.conditions = normalize_conditions(&template.id, template.conditions)?;
        self.templates.push(template);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Template, TemplateError> {
        self.templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// Highest stored priority first, registration order within a priority.
    pub fn list(&self) -> Vec<&Template> {
        let mut list: Vec<&Template> = self.templates.iter().collect();
        list.sort_by(|a, b| b.priority.cmp(&a.priority));
        list
    }

    pub fn of_type(&self, template_type: TemplateType) -> impl Iterator<Item = &Template> {
        self.templates
            .iter()
            .filter(move |t| t.template_type == template_type)
    }

    pub fn default_for(&self, template_type: TemplateType) -> Option<&Template> {
        self.of_type(template_type).find(|t| t.is_default && t.is_active)
    }

    /// Removes a template together with its conditions.
    pub fn remove_template(&mut self, id: &str) -> Option<Template> {
        let index = self.templates.iter().position(|t| t.id == id)?;
        Some(self.templates.remove(index))
    }

    pub fn add_condition(&mut self, template_id: &str, condition: Condition) -> Result<(), TemplateError> {
        let template = self.get_mut(template_id)?;
        let mut conditions = template.conditions.clone();
        conditions.push(condition);
        template.conditions = normalize_conditions(template_id, conditions)?;
        Ok(())
    }

    pub fn remove_condition(&mut self, template_id: &str, condition: &Condition) -> Result<bool, TemplateError> {
        let template = self.get_mut(template_id)?;
        let before = template.conditions.len();
        template.conditions.retain(|c| !c.same_rule(condition));
        Ok(template.conditions.len() != before)
    }

    /// Replaces all conditions of a template.
    pub fn set_conditions(&mut self, template_id: &str, conditions: Vec<Condition>) -> Result<(), TemplateError> {
        let normalized = normalize_conditions(template_id, conditions)?;
        self.get_mut(template_id)?.conditions = normalized;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
