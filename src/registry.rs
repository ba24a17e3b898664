//! Module Registry - capability lookup for content module kinds
//!
//! The compiler and validator only see [`ModuleLookup`]; concrete modules
//! register themselves into a [`ModuleRegistry`].

use std::collections::BTreeMap;

use crate::css::CssRule;
use crate::node::Attributes;
use crate::style::EffectiveAttrs;

/// What a module receives when asked for its markup.
#[derive(Debug, Clone, Copy)]
pub struct ModuleRenderInput<'a> {
    pub id: &'a str,
    pub kind: &'a str,
    pub attrs: &'a EffectiveAttrs,
    pub class_prefix: &'a str,
    /// Pre-rendered markup of the module's children, opaque to the module.
    pub content: &'a str,
}

/// Behavior a content module kind must provide.
pub trait ModuleCapability: Send + Sync {
    fn slug(&self) -> &str;

    fn name(&self) -> &str {
        self.slug()
    }

    fn defaults(&self) -> Attributes {
        Attributes::new()
    }

    /// Inner markup fragment; the compiler adds the wrapper element.
    fn render(&self, input: &ModuleRenderInput<'_>) -> String;

    /// Rules beyond the generic attribute block, appended after it.
    fn render_css(&self, _selector: &str, _attrs: &EffectiveAttrs) -> Vec<CssRule> {
        vec![]
    }
}

pub trait ModuleLookup {
    fn lookup(&self, kind: &str) -> Option<&dyn ModuleCapability>;

    fn exists(&self, kind: &str) -> bool {
        self.lookup(kind).is_some()
    }
}

#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Box<dyn ModuleCapability>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module under its slug, replacing any previous one.
    pub fn register<M: ModuleCapability + 'static>(&mut self, module: M) {
        self.modules.insert(module.slug().to_string(), Box::new(module));
    }

    pub fn unregister(&mut self, slug: &str) -> bool {
        self.modules.remove(slug).is_some()
    }

    pub fn slugs(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleLookup for ModuleRegistry {
    fn lookup(&self, kind: &str) -> Option<&dyn ModuleCapability> {
        self.modules.get(kind).map(|m| m.as_ref())
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.slugs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ModuleCapability for Echo {
        fn slug(&self) -> &str {
            "echo"
        }

        fn render(&self, input: &ModuleRenderInput<'_>) -> String {
            format!("<p>{}</p>", input.content)
        }
    }

    #[test]
    fn test_lookup_and_exists() {
        let mut registry = ModuleRegistry::new();
        assert!(!registry.exists("echo"));

        registry.register(Echo);
        assert!(registry.exists("echo"));
        assert_eq!(registry.lookup("echo").map(|m| m.name()), Some("echo"));
        assert!(registry.lookup("section").is_none());

        assert!(registry.unregister("echo"));
        assert!(registry.is_empty());
    }
}
