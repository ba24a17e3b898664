//! CSS Emission - per-node rule blocks and the stylesheet buffer
//!
//! Every node's rules are scoped by its `#id` selector. Within one node the
//! order is fixed: base rule, `:hover` rule, pseudo-element rules, then the
//! tablet and phone media blocks. Later breakpoint rules therefore always
//! follow the base rule they override.

use log::warn;
use serde_json::Value;
use std::fmt::Write;

use crate::style::{EffectiveAttrs, Variant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// A rule a module capability contributes on top of the generic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssRule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
    /// `max-width` breakpoint in px when the rule is media-scoped.
    pub max_width: Option<u32>,
}

impl CssRule {
    pub fn new(selector: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        Self {
            selector: selector.into(),
            declarations,
            max_width: None,
        }
    }

    pub fn within_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoints {
    pub tablet: u32,
    pub phone: u32,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            tablet: 980,
            phone: 767,
        }
    }
}

/// Accumulated stylesheet for one render. Owned by the render context, never
/// shared between renders.
#[derive(Debug, Default)]
pub struct Stylesheet {
    out: String,
}

impl Stylesheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rule(&mut self, selector: &str, declarations: &[Declaration]) {
        if declarations.is_empty() {
            return;
        }
        let _ = writeln!(self.out, "{} {{ {} }}", selector, join(declarations));
    }

    pub fn push_media(&mut self, max_width: u32, selector: &str, declarations: &[Declaration]) {
        if declarations.is_empty() {
            return;
        }
        let _ = writeln!(self.out, "@media (max-width: {}px) {{", max_width);
        let _ = writeln!(self.out, "  {} {{ {} }}", selector, join(declarations));
        self.out.push_str("}\n");
    }

    pub fn push(&mut self, rule: &CssRule) {
        match rule.max_width {
            Some(max_width) => self.push_media(max_width, &rule.selector, &rule.declarations),
            None => self.push_rule(&rule.selector, &rule.declarations),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

fn join(declarations: &[Declaration]) -> String {
    let mut out = String::new();
    for decl in declarations {
        let _ = write!(out, "{}: {}; ", decl.property, decl.value);
    }
    out.truncate(out.trim_end().len());
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Px,
    Em,
    None,
}

impl Unit {
    fn as_str(self) -> &'static str {
        match self {
            Unit::Px => "px",
            Unit::Em => "em",
            Unit::None => "",
        }
    }
}

/// Scalar attribute families, in emission order.
const SCALAR_PROPERTIES: &[(&str, &str, Unit)] = &[
    ("width", "width", Unit::Px),
    ("max_width", "max-width", Unit::Px),
    ("min_height", "min-height", Unit::Px),
    ("column_gap", "column-gap", Unit::Px),
    ("row_gap", "row-gap", Unit::Px),
    ("font_family", "font-family", Unit::None),
    ("font_size", "font-size", Unit::Px),
    ("font_weight", "font-weight", Unit::None),
    ("font_style", "font-style", Unit::None),
    ("line_height", "line-height", Unit::Em),
    ("letter_spacing", "letter-spacing", Unit::Px),
    ("text_color", "color", Unit::None),
    ("text_align", "text-align", Unit::None),
    ("text_transform", "text-transform", Unit::None),
    ("text_decoration", "text-decoration", Unit::None),
    ("background_color", "background-color", Unit::None),
    ("border_style", "border-style", Unit::None),
    ("border_color", "border-color", Unit::None),
    ("opacity", "opacity", Unit::None),
    ("z_index", "z-index", Unit::None),
];

/// Box attributes: `{top, right, bottom, left}` style objects.
const BOX_PROPERTIES: &[(&str, &str, [&str; 4])] = &[
    ("margin", "margin", ["top", "right", "bottom", "left"]),
    ("padding", "padding", ["top", "right", "bottom", "left"]),
    ("border_width", "border-width", ["top", "right", "bottom", "left"]),
    (
        "border_radius",
        "border-radius",
        ["top_left", "top_right", "bottom_right", "bottom_left"],
    ),
];

const SHADOW_PRESETS: &[(&str, &str)] = &[
    ("preset1", "0 2px 4px rgba(0,0,0,0.1)"),
    ("preset2", "0 4px 12px rgba(0,0,0,0.15)"),
    ("preset3", "0 8px 24px rgba(0,0,0,0.2)"),
];

/// Rejects values that could close the declaration block, open a comment or
/// start an escape sequence.
fn is_safe(value: &str) -> bool {
    !value.contains(['{', '}', '<', ';', '\\']) && !value.contains("/*") && !value.contains("*/")
}

fn format_value(attr: &str, value: &Value, unit: Unit) -> Option<String> {
    let formatted = match value {
        Value::Number(n) => format!("{}{}", n, unit.as_str()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if unit != Unit::None && s.parse::<f64>().is_ok() {
                format!("{}{}", s, unit.as_str())
            } else {
                s.to_string()
            }
        }
        _ => return None,
    };
    if !is_safe(&formatted) {
        warn!(
            "event=css_value_dropped module=css attr={} reason=unsafe_characters",
            attr
        );
        return None;
    }
    Some(formatted)
}

/// Formats a module-specific length; bare numbers get `px`.
pub fn px_value(attr: &str, value: &Value) -> Option<String> {
    format_value(attr, value, Unit::Px)
}

/// Formats a module-specific value verbatim, unsafe values dropped.
pub fn plain_value(attr: &str, value: &Value) -> Option<String> {
    format_value(attr, value, Unit::None)
}

fn format_box(attr: &str, value: &Value, sides: &[&str; 4]) -> Option<String> {
    match value {
        Value::Object(map) => {
            let parts: Vec<Option<String>> = sides
                .iter()
                .map(|side| map.get(*side).and_then(|v| format_value(attr, v, Unit::Px)))
                .collect();
            if parts.iter().all(Option::is_none) {
                return None;
            }
            let parts: Vec<String> = parts
                .into_iter()
                .map(|part| part.unwrap_or_else(|| "0px".to_string()))
                .collect();
            Some(parts.join(" "))
        }
        other => format_value(attr, other, Unit::Px),
    }
}

fn variant_declarations(attrs: &EffectiveAttrs, variant: Variant) -> Vec<Declaration> {
    let mut decls = vec![];

    for (attr, property, sides) in BOX_PROPERTIES {
        if let Some(value) = attrs.variant(attr, variant) {
            if let Some(formatted) = format_box(attr, value, sides) {
                decls.push(Declaration::new(*property, formatted));
            }
        }
    }

    for (attr, property, unit) in SCALAR_PROPERTIES {
        if let Some(value) = attrs.variant(attr, variant) {
            if let Some(formatted) = format_value(attr, value, *unit) {
                decls.push(Declaration::new(*property, formatted));
            }
        }
    }

    if let Some(image) = background_image(attrs, variant) {
        decls.push(Declaration::new("background-image", image));
    }

    decls
}

fn background_image(attrs: &EffectiveAttrs, variant: Variant) -> Option<String> {
    if let Some(Value::String(url)) = attrs.variant("background_image", variant) {
        let url = url.trim();
        if !url.is_empty() && is_safe(url) && !url.contains(['"', ')', '\\']) {
            return Some(format!("url(\"{}\")", url));
        }
        warn!("event=css_value_dropped module=css attr=background_image reason=unsafe_url");
    }
    attrs
        .variant("background_gradient", variant)
        .and_then(|v| format_value("background_gradient", v, Unit::None))
}

fn box_shadow(attrs: &EffectiveAttrs) -> Option<String> {
    let style = attrs.str("box_shadow_style")?;
    if let Some((_, shadow)) = SHADOW_PRESETS.iter().find(|(name, _)| *name == style) {
        return Some(shadow.to_string());
    }
    if style != "custom" {
        return None;
    }
    let px = |name: &str| {
        attrs
            .get(name)
            .and_then(|v| format_value(name, v, Unit::Px))
            .unwrap_or_else(|| "0px".to_string())
    };
    let color = attrs
        .get("box_shadow_color")
        .and_then(|v| format_value("box_shadow_color", v, Unit::None))
        .unwrap_or_else(|| "rgba(0,0,0,0.3)".to_string());
    Some(format!(
        "{} {} {} {} {}",
        px("box_shadow_horizontal"),
        px("box_shadow_vertical"),
        px("box_shadow_blur"),
        px("box_shadow_spread"),
        color
    ))
}

/// Parses `color: red; margin: 0` into declarations, dropping anything that
/// is not a plain `property: value` pair.
pub fn parse_declarations(raw: &str) -> Vec<Declaration> {
    raw.split(';')
        .filter_map(|piece| {
            let (property, value) = piece.split_once(':')?;
            let property = property.trim();
            let value = value.trim();
            let valid_property = !property.is_empty()
                && property
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid_property || value.is_empty() || !is_safe(value) {
                return None;
            }
            Some(Declaration::new(property, value))
        })
        .collect()
}

fn custom_declarations(attrs: &EffectiveAttrs, name: &str) -> Vec<Declaration> {
    attrs.str(name).map(parse_declarations).unwrap_or_default()
}

/// Generic rule block for one node, in cascade order.
pub fn node_rules(selector: &str, attrs: &EffectiveAttrs, breakpoints: Breakpoints) -> Vec<CssRule> {
    let mut rules = vec![];

    let mut base = variant_declarations(attrs, Variant::Base);
    if let Some(shadow) = box_shadow(attrs) {
        base.push(Declaration::new("box-shadow", shadow));
    }
    base.extend(custom_declarations(attrs, "custom_css_main"));
    rules.push(CssRule::new(selector, base));

    rules.push(CssRule::new(
        format!("{}:hover", selector),
        variant_declarations(attrs, Variant::Hover),
    ));
    rules.push(CssRule::new(
        format!("{}::before", selector),
        custom_declarations(attrs, "custom_css_before"),
    ));
    rules.push(CssRule::new(
        format!("{}::after", selector),
        custom_declarations(attrs, "custom_css_after"),
    ));

    rules.push(
        CssRule::new(selector, variant_declarations(attrs, Variant::Tablet))
            .within_max_width(breakpoints.tablet),
    );
    rules.push(
        CssRule::new(selector, variant_declarations(attrs, Variant::Phone))
            .within_max_width(breakpoints.phone),
    );

    rules.retain(|rule| !rule.declarations.is_empty());
    rules
}

/// `#id` selector. Characters outside `[A-Za-z0-9_-]` are escaped, as are
/// a leading digit and a digit right after a leading `-`.
pub fn id_selector(id: &str) -> String {
    let mut selector = String::with_capacity(id.len() + 1);
    selector.push('#');
    if id == "-" {
        selector.push_str("\\-");
        return selector;
    }
    let leading_hyphen = id.starts_with('-');
    for (i, c) in id.chars().enumerate() {
        let leading_digit = c.is_ascii_digit() && (i == 0 || (i == 1 && leading_hyphen));
        if c == '\0' {
            selector.push('\u{FFFD}');
        } else if c.is_control() {
            let _ = write!(selector, "\\{:x} ", c as u32);
        } else if leading_digit {
            let _ = write!(selector, "\\3{} ", c);
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            selector.push(c);
        } else {
            selector.push('\\');
            selector.push(c);
        }
    }
    selector
}
