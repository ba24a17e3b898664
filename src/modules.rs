//! Built-in content modules: heading, text, button, divider
//!
//! Small reference set used by the CLI and tests. The compiler only ever sees
//! them through [`ModuleLookup`](crate::registry::ModuleLookup).

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde_json::{json, Value};

use crate::css::{plain_value, px_value, CssRule, Declaration};
use crate::node::Attributes;
use crate::registry::{ModuleCapability, ModuleRegistry, ModuleRenderInput};
use crate::style::EffectiveAttrs;

fn defaults(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Attributes::new(),
    }
}

/// Link targets that cannot run script; anything else becomes `#`.
fn safe_href(raw: &str) -> &str {
    let lowered = raw.trim().to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("data:") || lowered.starts_with("vbscript:") {
        "#"
    } else {
        raw.trim()
    }
}

pub struct HeadingModule;

impl ModuleCapability for HeadingModule {
    fn slug(&self) -> &str {
        "heading"
    }

    fn name(&self) -> &str {
        "Heading"
    }

    fn defaults(&self) -> Attributes {
        defaults(json!({"title": "Heading", "level": "h2"}))
    }

    fn render(&self, input: &ModuleRenderInput<'_>) -> String {
        let level = match input.attrs.str("level") {
            Some(l @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6")) => l,
            _ => "h2",
        };
        let title = input.attrs.text("title").unwrap_or_default();
        let inner = match input.attrs.str("link_url") {
            Some(url) => format!(
                "<a href=\"{}\">{}</a>",
                encode_double_quoted_attribute(safe_href(url)),
                encode_text(&title)
            ),
            None => encode_text(&title).into_owned(),
        };
        format!(
            "<{} class=\"{}-heading\">{}</{}>{}",
            level, input.class_prefix, inner, level, input.content
        )
    }
}

pub struct TextModule;

impl ModuleCapability for TextModule {
    fn slug(&self) -> &str {
        "text"
    }

    fn name(&self) -> &str {
        "Text"
    }

    /// Blank-line separated paragraphs, escaped.
    fn render(&self, input: &ModuleRenderInput<'_>) -> String {
        let body = input.attrs.text("content").unwrap_or_default();
        let paragraphs: String = body
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| format!("<p>{}</p>", encode_text(p).replace('\n', "<br>")))
            .collect();
        format!(
            "<div class=\"{}-text\">{}{}</div>",
            input.class_prefix, paragraphs, input.content
        )
    }
}

pub struct ButtonModule;

impl ModuleCapability for ButtonModule {
    fn slug(&self) -> &str {
        "button"
    }

    fn name(&self) -> &str {
        "Button"
    }

    fn defaults(&self) -> Attributes {
        defaults(json!({
            "text": "Click Here",
            "link_url": "#",
            "link_target": false,
        }))
    }

    fn render(&self, input: &ModuleRenderInput<'_>) -> String {
        let text = input.attrs.text("text").unwrap_or_default();
        let href = input.attrs.str("link_url").map(safe_href).unwrap_or("#");
        let target = if input.attrs.flag("link_target") {
            " target=\"_blank\" rel=\"noopener\""
        } else {
            ""
        };
        format!(
            "<a class=\"{}-button\" href=\"{}\"{}>{}</a>",
            input.class_prefix,
            encode_double_quoted_attribute(href),
            target,
            encode_text(&text)
        )
    }

    fn render_css(&self, selector: &str, attrs: &EffectiveAttrs) -> Vec<CssRule> {
        let mut rules = vec![];
        if let Some(align) = attrs.get("align").and_then(|v| plain_value("align", v)) {
            rules.push(CssRule::new(selector, vec![Declaration::new("text-align", align)]));
        }

        let mut link = vec![];
        if let Some(color) = attrs.get("button_text_color").and_then(|v| plain_value("button_text_color", v)) {
            link.push(Declaration::new("color", color));
        }
        if let Some(bg) = attrs.get("button_bg_color").and_then(|v| plain_value("button_bg_color", v)) {
            link.push(Declaration::new("background-color", bg));
        }
        rules.push(CssRule::new(format!("{} a", selector), link));

        let mut hover = vec![];
        if let Some(style) = attrs.style_value("button_text_color") {
            if let Some(color) = style.hover.as_ref().and_then(|v| plain_value("button_text_color", v)) {
                hover.push(Declaration::new("color", color));
            }
        }
        if let Some(style) = attrs.style_value("button_bg_color") {
            if let Some(bg) = style.hover.as_ref().and_then(|v| plain_value("button_bg_color", v)) {
                hover.push(Declaration::new("background-color", bg));
            }
        }
        rules.push(CssRule::new(format!("{} a:hover", selector), hover));

        rules.retain(|r| !r.declarations.is_empty());
        rules
    }
}

pub struct DividerModule;

impl ModuleCapability for DividerModule {
    fn slug(&self) -> &str {
        "divider"
    }

    fn name(&self) -> &str {
        "Divider"
    }

    fn defaults(&self) -> Attributes {
        defaults(json!({
            "show_divider": true,
            "divider_color": "#e5e5e5",
            "divider_style": "solid",
            "divider_weight": 1,
        }))
    }

    fn render(&self, input: &ModuleRenderInput<'_>) -> String {
        if !input.attrs.flag("show_divider") {
            return String::new();
        }
        format!("<hr class=\"{}-divider\">", input.class_prefix)
    }

    fn render_css(&self, selector: &str, attrs: &EffectiveAttrs) -> Vec<CssRule> {
        if !attrs.flag("show_divider") {
            return vec![];
        }
        let weight = attrs
            .get("divider_weight")
            .and_then(|v| px_value("divider_weight", v))
            .unwrap_or_else(|| "1px".to_string());
        let style = attrs
            .get("divider_style")
            .and_then(|v| plain_value("divider_style", v))
            .unwrap_or_else(|| "solid".to_string());
        let color = attrs
            .get("divider_color")
            .and_then(|v| plain_value("divider_color", v))
            .unwrap_or_else(|| "currentColor".to_string());
        vec![CssRule::new(
            format!("{} hr", selector),
            vec![
                Declaration::new("border", "0"),
                Declaration::new("border-top", format!("{} {} {}", weight, style, color)),
            ],
        )]
    }
}

/// Registers every built-in module.
pub fn register_builtin_modules(registry: &mut ModuleRegistry) {
    registry.register(HeadingModule);
    registry.register(TextModule);
    registry.register(ButtonModule);
    registry.register(DividerModule);
}

/// Registry holding only the built-in modules.
pub fn builtin_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    register_builtin_modules(&mut registry);
    registry
}
