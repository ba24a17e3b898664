//! Document Compiler - depth-first walk to HTML plus one stylesheet
//!
//! All mutable render state (stylesheet, claimed ids, diagnostics) lives in a
//! [`RenderContext`] owned by the caller of a single render. Compiling the
//! same document twice yields byte-identical output.

use html_escape::{encode_double_quoted_attribute, encode_text};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::css::{id_selector, node_rules, Stylesheet};
use crate::hashing::compute_page_fingerprint;
use crate::ids::IdAllocator;
use crate::node::{Document, Node, NodeKind};
use crate::registry::{ModuleLookup, ModuleRenderInput};
use crate::style::{EffectiveAttrs, StyleResolver, ThemeDefaultsProvider};

/// Editor canvas or live output. Only presentational wrapping differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Canvas,
    #[default]
    Preview,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "canvas" | "editor" => Ok(RenderMode::Canvas),
            "preview" | "frontend" => Ok(RenderMode::Preview),
            other => Err(format!("unknown render mode `{}`", other)),
        }
    }
}

/// Non-fatal problem found while rendering, e.g. an unresolved module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub node_id: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPage {
    pub html: String,
    pub css: String,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledPage {
    pub fn fingerprint(&self) -> String {
        compute_page_fingerprint(&self.html, &self.css)
    }
}

/// Per-render state threaded through every recursive call.
#[derive(Debug)]
pub struct RenderContext {
    mode: RenderMode,
    stylesheet: Stylesheet,
    ids: IdAllocator,
    diagnostics: Vec<Diagnostic>,
}

impl RenderContext {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            stylesheet: Stylesheet::new(),
            ids: IdAllocator::new(),
            diagnostics: vec![],
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn finish(self, html: String) -> CompiledPage {
        CompiledPage {
            html,
            css: self.stylesheet.into_string(),
            diagnostics: self.diagnostics,
        }
    }
}

pub struct Compiler<'a> {
    modules: &'a dyn ModuleLookup,
    resolver: StyleResolver<'a>,
    config: &'a EngineConfig,
}

impl<'a> Compiler<'a> {
    pub fn new(
        modules: &'a dyn ModuleLookup,
        theme: &'a dyn ThemeDefaultsProvider,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            modules,
            resolver: StyleResolver::new(modules, theme),
            config,
        }
    }

    pub fn compile(&self, doc: &Document, mode: RenderMode) -> CompiledPage {
        let mut ctx = RenderContext::new(mode);
        let html = self.render_document(doc, &mut ctx);
        ctx.finish(html)
    }

    /// Renders into an existing context so several documents can share ids
    /// and one stylesheet.
    pub fn render_document(&self, doc: &Document, ctx: &mut RenderContext) -> String {
        for id in doc.ids() {
            ctx.ids.reserve(id);
        }
        let mut html = String::new();
        for node in &doc.content {
            html.push_str(&self.render_node(node, ctx));
        }
        html
    }

    fn render_node(&self, node: &Node, ctx: &mut RenderContext) -> String {
        if let NodeKind::Module(slug) = &node.kind {
            if !self.modules.exists(slug) {
                return self.render_unresolved(node, slug, ctx);
            }
        }

        let attrs = self.resolver.resolve(&node.kind, &node.attrs);
        let id = ctx.ids.claim(&node.kind, &node.id);
        let selector = id_selector(&id);
        for rule in node_rules(&selector, &attrs, self.config.breakpoints()) {
            ctx.stylesheet.push(&rule);
        }
        let module = match &node.kind {
            NodeKind::Module(slug) => self.modules.lookup(slug),
            _ => None,
        };
        if let Some(module) = module {
            for rule in module.render_css(&selector, &attrs) {
                ctx.stylesheet.push(&rule);
            }
        }

        let mut content = String::new();
        for child in &node.children {
            content.push_str(&self.render_node(child, ctx));
        }

        let classes = class_list(&self.config.class_prefix, &node.kind, &attrs);
        match &node.kind {
            NodeKind::Section => {
                let p = &self.config.class_prefix;
                let inner = format!("<div class=\"{}-section-inner\">{}</div>", p, content);
                open_element("section", &id, &classes, &attrs) + &inner + "</section>"
            }
            NodeKind::Row | NodeKind::Column => {
                open_element("div", &id, &classes, &attrs) + &content + "</div>"
            }
            NodeKind::Module(slug) => {
                let Some(module) = module else {
                    return self.render_unresolved(node, slug, ctx);
                };
                let fragment = module.render(&ModuleRenderInput {
                    id: &id,
                    kind: slug,
                    attrs: &attrs,
                    class_prefix: &self.config.class_prefix,
                    content: &content,
                });
                let wrapped = open_element("div", &id, &classes, &attrs) + &fragment + "</div>";
                self.canvas_wrap(ctx, &id, slug, wrapped)
            }
        }
    }

    fn render_unresolved(&self, node: &Node, slug: &str, ctx: &mut RenderContext) -> String {
        let id = ctx.ids.claim(&node.kind, &node.id);
        warn!(
            "event=module_unresolved module=compiler kind={} id={}",
            slug, id
        );
        ctx.diagnostics.push(Diagnostic {
            node_id: id.clone(),
            kind: slug.to_string(),
            message: format!("no module registered for kind `{}`", slug),
        });

        let p = &self.config.class_prefix;
        let comment_safe = slug.replace("--", "- -").replace('>', "&gt;");
        let fragment = format!(
            "<!-- unresolved module: {} --><div class=\"{}-unresolved\" data-{}-id=\"{}\" data-{}-kind=\"{}\">Unknown module: {}</div>",
            comment_safe,
            p,
            p,
            encode_double_quoted_attribute(&id),
            p,
            encode_double_quoted_attribute(slug),
            encode_text(slug),
        );
        self.canvas_wrap(ctx, &id, slug, fragment)
    }

    fn canvas_wrap(&self, ctx: &RenderContext, id: &str, kind: &str, fragment: String) -> String {
        if ctx.mode != RenderMode::Canvas {
            return fragment;
        }
        let p = &self.config.class_prefix;
        debug!("event=canvas_wrap module=compiler id={} kind={}", id, kind);
        format!(
            "<div class=\"{}-canvas-module\" data-{}-id=\"{}\" data-{}-kind=\"{}\">{}</div>",
            p,
            p,
            encode_double_quoted_attribute(id),
            p,
            encode_double_quoted_attribute(kind),
            fragment
        )
    }
}

fn open_element(tag: &str, id: &str, classes: &[String], attrs: &EffectiveAttrs) -> String {
    let mut out = format!(
        "<{} id=\"{}\" class=\"{}\"",
        tag,
        encode_double_quoted_attribute(id),
        classes.join(" ")
    );
    for (name, value) in data_attributes(attrs) {
        let _ = write!(out, " {}=\"{}\"", name, encode_double_quoted_attribute(&value));
    }
    out.push('>');
    out
}

fn has_animation(attrs: &EffectiveAttrs) -> bool {
    attrs.str("animation_style").is_some_and(|s| s != "none")
}

fn data_attributes(attrs: &EffectiveAttrs) -> Vec<(&'static str, String)> {
    let mut data = vec![];
    if has_animation(attrs) {
        for (attr, name) in [
            ("animation_duration", "data-animation-duration"),
            ("animation_delay", "data-animation-delay"),
            ("animation_intensity", "data-animation-intensity"),
        ] {
            if let Some(value) = attrs.text(attr) {
                data.push((name, value));
            }
        }
        if attrs.flag("animation_repeat") {
            data.push(("data-animation-repeat", "true".to_string()));
        }
    }
    data
}

fn class_token(raw: &str) -> Option<String> {
    let token: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!token.is_empty()).then_some(token)
}

fn string_list(attrs: &EffectiveAttrs, name: &str) -> Vec<String> {
    match attrs.get(name) {
        Some(serde_json::Value::String(s)) => s.split_whitespace().filter_map(class_token).collect(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter_map(class_token)
            .collect(),
        _ => vec![],
    }
}

/// Class list in a fixed order: structural class, visibility per
/// breakpoint, animation, intent tags, then author classes.
pub fn class_list(prefix: &str, kind: &NodeKind, attrs: &EffectiveAttrs) -> Vec<String> {
    let mut classes = match kind {
        NodeKind::Module(slug) => {
            let slug = class_token(slug).unwrap_or_else(|| "unknown".to_string());
            vec![format!("{}-module", prefix), format!("{}-module-{}", prefix, slug)]
        }
        structural => vec![format!("{}-{}", prefix, structural)],
    };

    for device in ["desktop", "tablet", "phone"] {
        if attrs.flag(&format!("disable_on_{}", device)) {
            classes.push(format!("{}-hide-{}", prefix, device));
        }
    }

    if has_animation(attrs) {
        classes.push(format!("{}-animated", prefix));
        for name in ["animation_style", "animation_direction"] {
            if let Some(token) = attrs.str(name).and_then(class_token) {
                classes.push(format!("{}-animation-{}", prefix, token));
            }
        }
    }

    for intent in string_list(attrs, "intent") {
        classes.push(format!("{}-intent-{}", prefix, intent));
    }

    classes.extend(string_list(attrs, "css_class"));
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attributes;
    use serde_json::json;

    fn effective(value: serde_json::Value) -> EffectiveAttrs {
        let attrs: Attributes = serde_json::from_value(value).unwrap();
        EffectiveAttrs::from_attributes(&attrs)
    }

    #[test]
    fn test_class_order_is_fixed() {
        let attrs = effective(json!({
            "css_class": "hero big",
            "intent": ["cta"],
            "animation_style": "fade",
            "animation_direction": "left",
            "disable_on_phone": true,
            "disable_on_desktop": "on"
        }));
        assert_eq!(
            class_list("pf", &NodeKind::module("button"), &attrs),
            vec![
                "pf-module",
                "pf-module-button",
                "pf-hide-desktop",
                "pf-hide-phone",
                "pf-animated",
                "pf-animation-fade",
                "pf-animation-left",
                "pf-intent-cta",
                "hero",
                "big",
            ]
        );
    }

    #[test]
    fn test_animation_none_adds_nothing() {
        let attrs = effective(json!({"animation_style": "none", "animation_duration": 300}));
        assert_eq!(class_list("pf", &NodeKind::Row, &attrs), vec!["pf-row"]);
        assert!(data_attributes(&attrs).is_empty());
    }

    #[test]
    fn test_class_tokens_are_sanitized() {
        let attrs = effective(json!({"css_class": "ok \"><script> x"}));
        assert_eq!(
            class_list("pf", &NodeKind::Column, &attrs),
            vec!["pf-column", "ok", "script", "x"]
        );
    }

    #[test]
    fn test_render_mode_parse() {
        assert_eq!("canvas".parse::<RenderMode>(), Ok(RenderMode::Canvas));
        assert_eq!("Frontend".parse::<RenderMode>(), Ok(RenderMode::Preview));
        assert!("print".parse::<RenderMode>().is_err());
    }
}
