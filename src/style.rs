//! Style Resolver - defaults cascade and variant side-channels
//!
//! Precedence, lowest to highest: built-in kind defaults, theme defaults for
//! the kind, declared node attributes. Each layer is merged per variant slot,
//! so a declared base value never erases a default phone value.

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::node::{Attributes, NodeKind};
use crate::registry::ModuleLookup;

/// Responsive or state slot of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variant {
    Base,
    Hover,
    Tablet,
    Phone,
}

impl Variant {
    pub const ALL: [Variant; 4] = [Variant::Base, Variant::Hover, Variant::Tablet, Variant::Phone];

    pub fn suffix(self) -> &'static str {
        match self {
            Variant::Base => "",
            Variant::Hover => "__hover",
            Variant::Tablet => "__tablet",
            Variant::Phone => "__phone",
        }
    }

    /// Splits `font_size__phone` into (`font_size`, Phone).
    pub fn split_key(key: &str) -> (&str, Variant) {
        for variant in [Variant::Hover, Variant::Tablet, Variant::Phone] {
            if let Some(name) = key.strip_suffix(variant.suffix()) {
                if !name.is_empty() {
                    return (name, variant);
                }
            }
        }
        (key, Variant::Base)
    }
}

/// One attribute with its variant slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleValue {
    pub base: Option<Value>,
    pub hover: Option<Value>,
    pub tablet: Option<Value>,
    pub phone: Option<Value>,
}

impl StyleValue {
    pub fn get(&self, variant: Variant) -> Option<&Value> {
        match variant {
            Variant::Base => self.base.as_ref(),
            Variant::Hover => self.hover.as_ref(),
            Variant::Tablet => self.tablet.as_ref(),
            Variant::Phone => self.phone.as_ref(),
        }
    }

    pub fn set(&mut self, variant: Variant, value: Value) {
        let slot = match variant {
            Variant::Base => &mut self.base,
            Variant::Hover => &mut self.hover,
            Variant::Tablet => &mut self.tablet,
            Variant::Phone => &mut self.phone,
        };
        *slot = Some(value);
    }

    fn overlay(&mut self, other: &StyleValue) {
        for variant in Variant::ALL {
            if let Some(value) = other.get(variant) {
                self.set(variant, value.clone());
            }
        }
    }
}

/// Final attribute set of a node after the defaults cascade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveAttrs {
    values: BTreeMap<String, StyleValue>,
}

impl EffectiveAttrs {
    /// Splits suffixed keys into variant slots. Null and blank values are
    /// treated as absent.
    pub fn from_attributes(attrs: &Attributes) -> Self {
        let mut values: BTreeMap<String, StyleValue> = BTreeMap::new();
        for (key, value) in attrs {
            if !is_present(value) {
                continue;
            }
            let (name, variant) = Variant::split_key(key);
            values
                .entry(name.to_string())
                .or_default()
                .set(variant, value.clone());
        }
        Self { values }
    }

    /// Layers `other` on top; its slots win.
    pub fn overlay(&mut self, other: &EffectiveAttrs) {
        for (name, value) in &other.values {
            self.values.entry(name.clone()).or_default().overlay(value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variant(name, Variant::Base)
    }

    pub fn variant(&self, name: &str, variant: Variant) -> Option<&Value> {
        self.values.get(name).and_then(|v| v.get(variant))
    }

    pub fn style_value(&self, name: &str) -> Option<&StyleValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str).map(str::trim)
    }

    /// Base value rendered as plain text, numbers included.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(is_truthy)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StyleValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(s.trim(), "" | "0" | "false" | "off" | "no"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Theme Defaults Provider: kind-level defaults configured for a site.
pub trait ThemeDefaultsProvider {
    fn defaults_for(&self, kind: &NodeKind) -> Option<&Attributes>;
}

/// Provider with no theme defaults at all.
pub struct NoThemeDefaults;

impl ThemeDefaultsProvider for NoThemeDefaults {
    fn defaults_for(&self, _kind: &NodeKind) -> Option<&Attributes> {
        None
    }
}

fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Attributes::new(),
    }
}

static STRUCTURAL_DEFAULTS: Lazy<BTreeMap<&'static str, Attributes>> = Lazy::new(|| {
    let mut defaults = BTreeMap::new();
    defaults.insert(
        "section",
        attrs(json!({
            "padding": {"top": 80, "right": 0, "bottom": 80, "left": 0},
            "padding__tablet": {"top": 60, "right": 0, "bottom": 60, "left": 0},
            "padding__phone": {"top": 40, "right": 0, "bottom": 40, "left": 0},
        })),
    );
    defaults.insert(
        "row",
        attrs(json!({
            "column_gap": 30,
            "max_width": 1200,
        })),
    );
    defaults.insert("column", Attributes::new());
    defaults
});

/// Built-in defaults for the structural kinds.
pub fn structural_defaults(kind: &NodeKind) -> Option<&'static Attributes> {
    if !kind.is_structural() {
        return None;
    }
    STRUCTURAL_DEFAULTS.get(kind.as_str())
}

pub struct StyleResolver<'a> {
    modules: &'a dyn ModuleLookup,
    theme: &'a dyn ThemeDefaultsProvider,
}

impl<'a> StyleResolver<'a> {
    pub fn new(modules: &'a dyn ModuleLookup, theme: &'a dyn ThemeDefaultsProvider) -> Self {
        Self { modules, theme }
    }

    pub fn resolve(&self, kind: &NodeKind, declared: &Attributes) -> EffectiveAttrs {
        let mut effective = match kind {
            NodeKind::Module(slug) => self
                .modules
                .lookup(slug)
                .map(|module| EffectiveAttrs::from_attributes(&module.defaults()))
                .unwrap_or_default(),
            _ => structural_defaults(kind)
                .map(EffectiveAttrs::from_attributes)
                .unwrap_or_default(),
        };

        if let Some(theme) = self.theme.defaults_for(kind) {
            effective.overlay(&EffectiveAttrs::from_attributes(theme));
        }

        effective.overlay(&EffectiveAttrs::from_attributes(declared));
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModuleRegistry;
    use std::collections::HashMap;

    struct MapTheme(HashMap<NodeKind, Attributes>);

    impl ThemeDefaultsProvider for MapTheme {
        fn defaults_for(&self, kind: &NodeKind) -> Option<&Attributes> {
            self.0.get(kind)
        }
    }

    #[test]
    fn test_split_key() {
        assert_eq!(Variant::split_key("font_size"), ("font_size", Variant::Base));
        assert_eq!(Variant::split_key("font_size__phone"), ("font_size", Variant::Phone));
        assert_eq!(Variant::split_key("text_color__hover"), ("text_color", Variant::Hover));
        assert_eq!(Variant::split_key("__tablet"), ("__tablet", Variant::Base));
    }

    #[test]
    fn test_declared_beats_theme_beats_builtin() {
        let registry = ModuleRegistry::new();
        let mut theme = HashMap::new();
        theme.insert(
            NodeKind::Row,
            attrs(json!({"max_width": 960, "column_gap": 20})),
        );
        let theme = MapTheme(theme);
        let resolver = StyleResolver::new(&registry, &theme);

        let declared = attrs(json!({"column_gap": 10}));
        let effective = resolver.resolve(&NodeKind::Row, &declared);

        assert_eq!(effective.get("max_width"), Some(&json!(960)));
        assert_eq!(effective.get("column_gap"), Some(&json!(10)));
    }

    #[test]
    fn test_declared_base_keeps_default_variants() {
        let registry = ModuleRegistry::new();
        let resolver = StyleResolver::new(&registry, &NoThemeDefaults);

        let declared = attrs(json!({"padding": {"top": 10, "right": 0, "bottom": 10, "left": 0}}));
        let effective = resolver.resolve(&NodeKind::Section, &declared);

        assert_eq!(effective.get("padding").unwrap()["top"], 10);
        assert_eq!(effective.variant("padding", Variant::Phone).unwrap()["top"], 40);
    }

    #[test]
    fn test_blank_values_are_absent() {
        let effective = EffectiveAttrs::from_attributes(&attrs(json!({
            "text_color": "",
            "font_size": null,
            "css_class": "  ",
            "font_weight": "700"
        })));
        assert!(effective.get("text_color").is_none());
        assert!(effective.get("font_size").is_none());
        assert!(effective.get("css_class").is_none());
        assert_eq!(effective.str("font_weight"), Some("700"));
    }

    #[test]
    fn test_unknown_module_resolves_declared_only() {
        let registry = ModuleRegistry::new();
        let resolver = StyleResolver::new(&registry, &NoThemeDefaults);
        let effective = resolver.resolve(&NodeKind::module("ghost"), &attrs(json!({"a": 1})));
        assert_eq!(effective.get("a"), Some(&json!(1)));
        assert_eq!(effective.iter().count(), 1);
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!("on")));
        assert!(!is_truthy(&json!("off")));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!(true)));
    }
}
