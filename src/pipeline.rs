//! Engine - single entry point over validation, compilation and selection
//!
//! Persistence goes through `save_json`, which ALWAYS validates before it
//! compiles or commits. Rendering trusts already stored documents and
//! degrades per node instead of failing.

use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

use crate::compiler::{CompiledPage, Compiler, Diagnostic, RenderContext, RenderMode};
use crate::config::{ConfigError, EngineConfig, ThemeDefaults};
use crate::node::Document;
use crate::registry::ModuleRegistry;
use crate::selection::{select, RequestContext, TemplateSelection};
use crate::store::{DocumentStore, PageId, SaveOutcome, StoreError, StoredRecord};
use crate::templates::{Template, TemplateError, TemplateSet, TemplateType};
use crate::validation::{ValidationError, Validator};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Document version {version} is not supported (max major {max_major})")]
    UnsupportedDocumentVersion { version: String, max_major: u64 },

    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A full page: header, body and footer compiled in one render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPage {
    pub html: String,
    pub css: String,
    pub diagnostics: Vec<Diagnostic>,
    pub header_template: Option<String>,
    pub body_template: Option<String>,
    pub footer_template: Option<String>,
}

impl RenderedPage {
    pub fn fingerprint(&self) -> String {
        crate::hashing::compute_page_fingerprint(&self.html, &self.css)
    }
}

/// Parses `1`, `1.2` or `1.2.3` style versions, padding missing parts.
pub fn normalize_version(raw: &str) -> Option<semver::Version> {
    let raw = raw.trim();
    if let Ok(version) = semver::Version::parse(raw) {
        return Some(version);
    }
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    Some(semver::Version::new(numbers[0], numbers[1], numbers[2]))
}

pub struct Engine {
    config: EngineConfig,
    theme: ThemeDefaults,
    modules: ModuleRegistry,
    templates: TemplateSet,
    validator: Validator,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        theme: ThemeDefaults,
        modules: ModuleRegistry,
        templates: TemplateSet,
    ) -> Self {
        Self {
            config,
            theme,
            modules,
            templates,
            validator: Validator::new(),
        }
    }

    /// Loads optional config, theme and template sources from disk and
    /// registers the built-in modules.
    pub fn load(
        config_path: Option<&Path>,
        theme_path: Option<&Path>,
        templates_dir: Option<&Path>,
    ) -> Result<Self, PipelineError> {
        let config = match config_path {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        let theme = match theme_path {
            Some(path) => ThemeDefaults::load(path)?,
            None => ThemeDefaults::new(),
        };
        let templates = match templates_dir {
            Some(dir) => TemplateSet::load_from_dir(dir)?,
            None => TemplateSet::new(),
        };
        info!(
            "event=engine_loaded module=pipeline templates={} theme_file={}",
            templates.len(),
            theme_path.is_some()
        );
        Ok(Self::new(config, theme, crate::modules::builtin_registry(), templates))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.modules
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateSet {
        &mut self.templates
    }

    /// List all templates, highest stored priority first
    pub fn list_templates(&self) -> Vec<&Template> {
        self.templates.list()
    }

    fn compiler(&self) -> Compiler<'_> {
        Compiler::new(&self.modules, &self.theme, &self.config)
    }

    fn check_version(&self, doc: &Document) -> Result<(), PipelineError> {
        let max_major = self.config.max_document_major;
        match normalize_version(&doc.version) {
            Some(version) if version.major <= max_major => Ok(()),
            _ => Err(PipelineError::UnsupportedDocumentVersion {
                version: doc.version.clone(),
                max_major,
            }),
        }
    }

    /// Grammar plus format version.
    pub fn validate_document(&self, doc: &Document) -> Result<(), PipelineError> {
        self.validator.validate(doc, &self.modules)?;
        self.check_version(doc)
    }

    /// Parses and validates raw document JSON.
    pub fn validate_json(&self, json: &str) -> Result<Document, PipelineError> {
        let value: Value = serde_json::from_str(json)?;
        let doc = self.validator.validate_value(&value, &self.modules)?;
        self.check_version(&doc)?;
        Ok(doc)
    }

    /// Compiles without validating; unresolved modules become diagnostics.
    pub fn compile_document(&self, doc: &Document, mode: RenderMode) -> CompiledPage {
        self.compiler().compile(doc, mode)
    }

    /// Editor preview of unsaved JSON: validate, then compile.
    pub fn preview_json(&self, json: &str, mode: RenderMode) -> Result<CompiledPage, PipelineError> {
        let doc = self.validate_json(json)?;
        Ok(self.compile_document(&doc, mode))
    }

    pub fn select_templates(&self, ctx: &RequestContext) -> TemplateSelection<'_> {
        select(&self.templates, ctx)
    }

    /// Compiles header, body and footer into one page. `body` replaces the
    /// selected body template when given.
    pub fn render_page(
        &self,
        ctx: &RequestContext,
        body: Option<&Document>,
        mode: RenderMode,
    ) -> RenderedPage {
        let selection = self.select_templates(ctx);
        let compiler = self.compiler();
        let mut render = RenderContext::new(mode);
        let p = &self.config.class_prefix;

        let mut html = String::new();
        for template_type in TemplateType::ALL {
            let tag = match template_type {
                TemplateType::Header => "header",
                TemplateType::Body => "main",
                TemplateType::Footer => "footer",
            };
            let doc = match (template_type, body) {
                (TemplateType::Body, Some(doc)) => Some(doc),
                _ => selection.get(template_type).map(|t| &t.content),
            };
            let Some(doc) = doc else {
                continue;
            };
            let inner = compiler.render_document(doc, &mut render);
            html.push_str(&format!(
                "<{} class=\"{}-theme-{}\">{}</{}>",
                tag, p, template_type, inner, tag
            ));
        }

        let template_id = |t: TemplateType| selection.get(t).map(|t| t.id.clone());
        let body_template = if body.is_some() { None } else { template_id(TemplateType::Body) };
        let header_template = template_id(TemplateType::Header);
        let footer_template = template_id(TemplateType::Footer);

        if !render.diagnostics().is_empty() {
            warn!(
                "event=page_degraded module=pipeline page_type={} unresolved={}",
                ctx.page_type,
                render.diagnostics().len()
            );
        }

        let page = render.finish(html);
        RenderedPage {
            html: page.html,
            css: page.css,
            diagnostics: page.diagnostics,
            header_template,
            body_template,
            footer_template,
        }
    }

    /// Renders a stored `{content: ...}` record; malformed records render as
    /// if the page had no content of its own.
    pub fn render_stored(&self, ctx: &RequestContext, record: &str, mode: RenderMode) -> RenderedPage {
        let stored = StoredRecord::parse(record);
        self.render_page(ctx, stored.as_ref().map(|r| &r.content), mode)
    }

    /// Validates, compiles and commits. On any failure the previously stored
    /// record is left as it was.
    pub fn save_json(
        &self,
        store: &mut DocumentStore,
        page_id: PageId,
        json: &str,
    ) -> Result<SaveOutcome, PipelineError> {
        let result = self.prepare_save(page_id, json).and_then(|(doc, compiled)| {
            store.commit(page_id, doc, &compiled).map_err(PipelineError::from)
        });
        if let Err(e) = &result {
            warn!(
                "event=store_save_rejected module=pipeline page_id={} reason={}",
                page_id, e
            );
        }
        result
    }

    fn prepare_save(&self, page_id: PageId, json: &str) -> Result<(Document, CompiledPage), PipelineError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|source| StoreError::Malformed { page_id, source })?;
        let doc = self
            .validator
            .validate_value(&value, &self.modules)
            .map_err(StoreError::Rejected)?;
        self.check_version(&doc)?;
        let compiled = self.compile_document(&doc, RenderMode::Preview);
        Ok((doc, compiled))
    }

    /// Cached stylesheet of a stored page, recompiled and re-cached when the
    /// cache was invalidated.
    pub fn page_css(&self, store: &mut DocumentStore, page_id: PageId) -> Result<String, PipelineError> {
        if let Some(css) = store.cached_css(page_id) {
            return Ok(css.to_string());
        }
        let doc = store.document(page_id).ok_or(StoreError::NotFound(page_id))?;
        let css = self.compile_document(doc, RenderMode::Preview).css;
        store.set_css_cache(page_id, css.clone())?;
        Ok(css)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(
            EngineConfig::default(),
            ThemeDefaults::new(),
            crate::modules::builtin_registry(),
            TemplateSet::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("1.0"), Some(semver::Version::new(1, 0, 0)));
        assert_eq!(normalize_version("2"), Some(semver::Version::new(2, 0, 0)));
        assert_eq!(normalize_version("1.2.3"), Some(semver::Version::new(1, 2, 3)));
        assert_eq!(normalize_version("one"), None);
        assert_eq!(normalize_version("1.2.3.4"), None);
    }

    #[test]
    fn test_newer_major_rejected() {
        let engine = Engine::default();
        let err = engine
            .validate_json(r#"{"version": "2.0", "content": []}"#)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedDocumentVersion { .. }));
        assert!(engine.validate_json(r#"{"version": "1.0", "content": []}"#).is_ok());
    }
}
