//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees of compilation and
//! template selection.

use pageforge_core::{
    ids::clone_document,
    modules::builtin_registry,
    Compiler, Condition, Document, Engine, EngineConfig, PageType, RenderContext, RenderMode,
    RequestContext, Template, TemplateSet, TemplateType, ThemeDefaults, Validator,
};
use serde_json::json;
use std::collections::HashSet;

fn doc(value: serde_json::Value) -> Document {
    serde_json::from_value(value).unwrap()
}

fn landing_page() -> Document {
    doc(json!({
        "version": "1.0.0",
        "content": [{
            "type": "section",
            "id": "s1",
            "attrs": {"background_color": "#fafafa"},
            "children": [{
                "type": "row",
                "children": [
                    {"type": "column", "children": [
                        {"type": "heading", "id": "h1", "attrs": {"title": "Welcome", "font_size": 32}},
                        {"type": "text", "id": "t1", "attrs": {"content": "Hello there"}}
                    ]},
                    {"type": "column", "children": [
                        {"type": "button", "id": "b1", "attrs": {"text": "Go", "link_url": "/start"}},
                        {"type": "divider", "id": "d1"}
                    ]}
                ]
            }]
        }]
    }))
}

/// Every `id="..."` attribute value in document order.
fn html_ids(html: &str) -> Vec<String> {
    html.match_indices(" id=\"")
        .map(|(start, pattern)| {
            let rest = &html[start + pattern.len()..];
            rest[..rest.find('"').unwrap()].to_string()
        })
        .collect()
}

fn body_template(id: &str) -> Template {
    Template::new(id, TemplateType::Body, Document::empty())
}

#[test]
fn invariant_compile_is_idempotent() {
    let engine = Engine::default();
    let page = landing_page();

    let first = engine.compile_document(&page, RenderMode::Preview);
    let second = engine.compile_document(&page, RenderMode::Preview);

    assert_eq!(first.html, second.html);
    assert_eq!(first.css, second.css);
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert!(first.diagnostics.is_empty());
}

#[test]
fn invariant_renders_do_not_leak_state() {
    let engine = Engine::default();
    let other = doc(json!({
        "version": "1.0.0",
        "content": [{"type": "section", "id": "other", "attrs": {"text_color": "red"}}]
    }));

    let before = engine.compile_document(&landing_page(), RenderMode::Preview);
    engine.compile_document(&other, RenderMode::Canvas);
    let after = engine.compile_document(&landing_page(), RenderMode::Preview);

    assert_eq!(before, after);
    assert!(!after.css.contains("#other"));
}

#[test]
fn invariant_row_at_document_root_rejected() {
    let engine = Engine::default();
    let json = json!({
        "version": "1.0.0",
        "content": [{
            "type": "row",
            "id": "r1",
            "children": [{"type": "column", "id": "c1", "children": [
                {"type": "heading", "id": "h1"}
            ]}]
        }]
    });

    let err = Validator::new()
        .validate_value(&json, engine.modules())
        .unwrap_err();
    assert_eq!(err.rule, "top_level_section");
    assert_eq!(err.path, "content[0]");
    assert_eq!(err.kind.as_deref(), Some("row"));
    assert_eq!(err.id.as_deref(), Some("r1"));

    assert!(engine.validate_json(&json.to_string()).is_err());
}

#[test]
fn invariant_unregistered_module_rejected_by_validator() {
    let engine = Engine::default();
    let json = json!({
        "version": "1.0.0",
        "content": [{"type": "section", "id": "s", "children": [
            {"type": "row", "children": [{"type": "column", "children": [
                {"type": "carousel", "id": "x1"}
            ]}]}
        ]}]
    });
    let err = engine.validate_json(&json.to_string()).unwrap_err();
    assert!(err.to_string().contains("carousel"));
    assert!(err.to_string().contains("content[0].children[0].children[0].children[0]"));
}

#[test]
fn invariant_clone_compiles_next_to_original_without_duplicate_ids() {
    let engine = Engine::default();
    let original = landing_page();
    let clone = clone_document(&original);

    let original_ids: HashSet<&str> = original.ids().into_iter().filter(|id| !id.is_empty()).collect();
    for id in clone.ids() {
        assert!(!original_ids.contains(id), "clone reused id {}", id);
    }

    let mut content = original.content.clone();
    content.extend(clone.content.clone());
    let combined = Document::new("1.0.0", content);
    engine.validate_document(&combined).unwrap();

    let page = engine.compile_document(&combined, RenderMode::Preview);
    let ids = html_ids(&page.html);
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len());
    assert_eq!(ids.len(), combined.node_count());
}

#[test]
fn invariant_shared_context_keeps_ids_unique() {
    let modules = builtin_registry();
    let theme = ThemeDefaults::new();
    let config = EngineConfig::default();
    let compiler = Compiler::new(&modules, &theme, &config);

    let mut ctx = RenderContext::new(RenderMode::Preview);
    let mut html = compiler.render_document(&landing_page(), &mut ctx);
    html.push_str(&compiler.render_document(&landing_page(), &mut ctx));
    let page = ctx.finish(html);

    let ids = html_ids(&page.html);
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len());
    assert!(ids.contains(&"s1".to_string()));
}

#[test]
fn invariant_generated_ids_never_take_authored_ids() {
    let engine = Engine::default();
    let page = doc(json!({
        "version": "1.0.0",
        "content": [
            {"type": "section", "id": "s1", "children": [{"type": "row"}]},
            {"type": "section", "id": "s2", "children": [
                {"type": "row", "id": "row_1", "attrs": {"text_color": "red"}}
            ]}
        ]
    }));
    engine.validate_document(&page).unwrap();

    let compiled = engine.compile_document(&page, RenderMode::Preview);
    let ids = html_ids(&compiled.html);
    assert_eq!(ids[0], "s1");
    assert_ne!(ids[1], "row_1");
    assert_eq!(&ids[2..], ["s2", "row_1"]);
    let red: Vec<&str> = compiled.css.lines().filter(|l| l.contains("color: red")).collect();
    assert_eq!(red.len(), 1);
    assert!(red[0].starts_with("#row_1 {"));
}

#[test]
fn invariant_responsive_rule_follows_base_rule() {
    let engine = Engine::default();
    let page = doc(json!({
        "version": "1.0.0",
        "content": [{"type": "section", "id": "s1", "children": [
            {"type": "row", "id": "r1", "children": [{"type": "column", "id": "c1", "children": [
                {"type": "heading", "id": "h1", "attrs": {"font_size": 20, "font_size__phone": "14"}}
            ]}]}
        ]}]
    }));

    let css = engine.compile_document(&page, RenderMode::Preview).css;
    let base = css.find("#h1 { font-size: 20px; }").unwrap();
    let phone = css
        .find("@media (max-width: 767px) {\n  #h1 { font-size: 14px; }\n}")
        .unwrap();
    assert!(base < phone);

    // Ancestors come first.
    let section = css.find("#s1 {").unwrap();
    let row = css.find("#r1 {").unwrap();
    assert!(section < row && row < base);
}

#[test]
fn invariant_object_specific_template_wins() {
    let mut templates = TemplateSet::new();
    templates
        .register(body_template("everywhere").as_default().with_condition(Condition::include(PageType::All, None)))
        .unwrap();
    templates
        .register(body_template("post-42").with_condition(Condition::include(PageType::SinglePost, Some(42))))
        .unwrap();

    let engine = Engine::new(EngineConfig::default(), ThemeDefaults::new(), builtin_registry(), templates);

    let for_42 = engine.select_templates(&RequestContext::with_object(PageType::SinglePost, 42));
    assert_eq!(for_42.body.map(|t| t.id.as_str()), Some("post-42"));

    let for_7 = engine.select_templates(&RequestContext::with_object(PageType::SinglePost, 7));
    assert_eq!(for_7.body.map(|t| t.id.as_str()), Some("everywhere"));
}

#[test]
fn invariant_object_specific_template_without_fallback() {
    let mut templates = TemplateSet::new();
    templates
        .register(body_template("post-42").with_condition(Condition::include(PageType::SinglePost, Some(42))))
        .unwrap();

    let selection = pageforge_core::selection::select(
        &templates,
        &RequestContext::with_object(PageType::SinglePost, 7),
    );
    assert!(selection.is_empty());
}

#[test]
fn invariant_exclude_beats_include() {
    let mut templates = TemplateSet::new();
    templates
        .register(
            body_template("not-home")
                .with_condition(Condition::include(PageType::All, None))
                .with_condition(Condition::exclude(PageType::Homepage, None)),
        )
        .unwrap();

    let home = pageforge_core::selection::select(&templates, &RequestContext::new(PageType::Homepage));
    assert!(home.body.is_none());

    let search = pageforge_core::selection::select(&templates, &RequestContext::new(PageType::Search));
    assert_eq!(search.body.map(|t| t.id.as_str()), Some("not-home"));
}

#[test]
fn invariant_excluded_default_is_not_a_fallback() {
    let mut templates = TemplateSet::new();
    templates
        .register(body_template("fallback").as_default().with_condition(Condition::exclude(PageType::NotFound, None)))
        .unwrap();

    let missing = pageforge_core::selection::select(&templates, &RequestContext::new(PageType::NotFound));
    assert!(missing.body.is_none());

    let archive = pageforge_core::selection::select(&templates, &RequestContext::new(PageType::Archive));
    assert_eq!(archive.body.map(|t| t.id.as_str()), Some("fallback"));
}

#[test]
fn invariant_equal_scores_go_to_first_registered() {
    let ctx = RequestContext::with_object(PageType::SinglePost, 3);
    let ids = ["first", "second"];

    for order in [[0, 1], [1, 0]] {
        let mut templates = TemplateSet::new();
        for i in order {
            templates
                .register(body_template(ids[i]).with_condition(Condition::include(PageType::SinglePost, None)))
                .unwrap();
        }
        let selection = pageforge_core::selection::select(&templates, &ctx);
        assert_eq!(selection.body.map(|t| t.id.as_str()), Some(ids[order[0]]));
    }
}

#[test]
fn invariant_unresolved_module_degrades_gracefully() {
    let engine = Engine::default();
    let page = doc(json!({
        "version": "1.0.0",
        "content": [{"type": "section", "id": "s1", "children": [
            {"type": "row", "children": [{"type": "column", "children": [
                {"type": "button", "id": "b1", "attrs": {"text": "Before"}},
                {"type": "countdown", "id": "cd1"},
                {"type": "heading", "id": "h1", "attrs": {"title": "After"}}
            ]}]}
        ]}]
    }));

    let compiled = engine.compile_document(&page, RenderMode::Preview);
    assert!(compiled.html.contains("Before"));
    assert!(compiled.html.contains("After"));
    assert!(compiled.html.contains("pf-unresolved"));
    assert!(compiled.html.contains("Unknown module: countdown"));
    assert_eq!(compiled.diagnostics.len(), 1);
    assert_eq!(compiled.diagnostics[0].kind, "countdown");
    assert_eq!(compiled.diagnostics[0].node_id, "cd1");
}

#[test]
fn invariant_canvas_wrapping_is_additive() {
    let engine = Engine::default();
    let page = doc(json!({
        "version": "1.0.0",
        "content": [{"type": "section", "id": "s1", "children": [
            {"type": "row", "id": "r1", "children": [{"type": "column", "id": "c1", "children": [
                {"type": "button", "id": "b1"}
            ]}]}
        ]}]
    }));

    let preview = engine.compile_document(&page, RenderMode::Preview);
    let canvas = engine.compile_document(&page, RenderMode::Canvas);

    let module = "<div id=\"b1\" class=\"pf-module pf-module-button\"><a class=\"pf-button\" href=\"#\">Click Here</a></div>";
    assert!(preview.html.contains(module));
    let wrapped = format!(
        "<div class=\"pf-canvas-module\" data-pf-id=\"b1\" data-pf-kind=\"button\">{}</div>",
        module
    );
    assert_eq!(canvas.html, preview.html.replace(module, &wrapped));
    assert_eq!(canvas.css, preview.css);
}
