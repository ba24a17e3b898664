//! Template Selection Engine - include/exclude rules with specificity
//!
//! Per slot: candidates are templates with a matching include and no matching
//! exclude. The highest score wins; equal scores go to the template
//! registered first. With no candidate the slot falls back to its default.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::templates::{Template, TemplateSet, TemplateType};

/// Added to a condition's score when it names a concrete object.
pub const OBJECT_SPECIFIC_BONUS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    All,
    Homepage,
    SinglePost,
    SinglePage,
    Archive,
    Category,
    Tag,
    #[serde(rename = "404")]
    NotFound,
    Search,
    Author,
    /// Request context only; no condition may target it.
    Unknown,
}

impl PageType {
    pub const CONDITION_TYPES: [PageType; 10] = [
        PageType::All,
        PageType::Homepage,
        PageType::SinglePost,
        PageType::SinglePage,
        PageType::Archive,
        PageType::Category,
        PageType::Tag,
        PageType::NotFound,
        PageType::Search,
        PageType::Author,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PageType::All => "all",
            PageType::Homepage => "homepage",
            PageType::SinglePost => "single_post",
            PageType::SinglePage => "single_page",
            PageType::Archive => "archive",
            PageType::Category => "category",
            PageType::Tag => "tag",
            PageType::NotFound => "404",
            PageType::Search => "search",
            PageType::Author => "author",
            PageType::Unknown => "unknown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PageType::All => "All Pages",
            PageType::Homepage => "Homepage",
            PageType::SinglePost => "Single Post",
            PageType::SinglePage => "Single Page",
            PageType::Archive => "Archive Pages",
            PageType::Category => "Category Archive",
            PageType::Tag => "Tag Archive",
            PageType::NotFound => "404 Error Page",
            PageType::Search => "Search Results",
            PageType::Author => "Author Archive",
            PageType::Unknown => "Unknown",
        }
    }

    /// Whether conditions of this type may name a concrete object.
    pub fn has_objects(self) -> bool {
        matches!(
            self,
            PageType::SinglePost
                | PageType::SinglePage
                | PageType::Category
                | PageType::Tag
                | PageType::Author
        )
    }

    pub fn base_priority(self) -> u32 {
        match self {
            PageType::All => 1,
            PageType::Archive => 5,
            PageType::Homepage => 10,
            PageType::Category | PageType::Tag | PageType::Author => 15,
            PageType::SinglePost | PageType::SinglePage => 20,
            PageType::NotFound | PageType::Search => 50,
            PageType::Unknown => 0,
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        PageType::CONDITION_TYPES
            .iter()
            .chain(std::iter::once(&PageType::Unknown))
            .find(|t| t.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("unknown page type `{}`", normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionMode {
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Owning template; filled in when the template is registered.
    #[serde(default)]
    pub template_id: String,
    pub mode: ConditionMode,
    pub page_type: PageType,
    #[serde(default)]
    pub object_id: Option<i64>,
}

impl Condition {
    pub fn include(page_type: PageType, object_id: Option<i64>) -> Self {
        Self {
            template_id: String::new(),
            mode: ConditionMode::Include,
            page_type,
            object_id,
        }
    }

    pub fn exclude(page_type: PageType, object_id: Option<i64>) -> Self {
        Self {
            mode: ConditionMode::Exclude,
            ..Self::include(page_type, object_id)
        }
    }

    /// Same rule regardless of owner.
    pub fn same_rule(&self, other: &Condition) -> bool {
        self.mode == other.mode && self.page_type == other.page_type && self.object_id == other.object_id
    }

    pub fn matches(&self, ctx: &RequestContext) -> bool {
        if self.page_type == PageType::All {
            return true;
        }
        if self.page_type != ctx.page_type {
            return false;
        }
        match self.object_id {
            Some(object_id) => ctx.object_id == Some(object_id),
            None => true,
        }
    }

    pub fn priority(&self) -> u32 {
        let bonus = if self.object_id.is_some() { OBJECT_SPECIFIC_BONUS } else { 0 };
        self.page_type.base_priority() + bonus
    }

    pub fn label(&self) -> String {
        match self.object_id {
            Some(object_id) => format!("{} #{}", self.page_type.label(), object_id),
            None => self.page_type.label().to_string(),
        }
    }
}

/// Normalized description of the page being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub page_type: PageType,
    #[serde(default)]
    pub object_id: Option<i64>,
}

impl RequestContext {
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            object_id: None,
        }
    }

    pub fn with_object(page_type: PageType, object_id: i64) -> Self {
        Self {
            page_type,
            object_id: Some(object_id),
        }
    }
}

fn is_excluded(template: &Template, ctx: &RequestContext) -> bool {
    template
        .conditions
        .iter()
        .any(|c| c.mode == ConditionMode::Exclude && c.matches(ctx))
}

/// Score of the best matching include, or `None` when the template does not
/// apply to `ctx` by rule.
pub fn match_score(template: &Template, ctx: &RequestContext) -> Option<u32> {
    if !template.is_active || is_excluded(template, ctx) {
        return None;
    }
    template
        .conditions
        .iter()
        .filter(|c| c.mode == ConditionMode::Include && c.matches(ctx))
        .map(Condition::priority)
        .max()
}

/// Why a slot got the template it got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Rule { score: u32 },
    Default,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotSelection<'a> {
    pub template: &'a Template,
    pub source: SelectionSource,
}

pub fn select_slot<'a>(
    templates: &'a TemplateSet,
    template_type: TemplateType,
    ctx: &RequestContext,
) -> Option<SlotSelection<'a>> {
    let mut best: Option<(&Template, u32)> = None;
    for template in templates.of_type(template_type) {
        let Some(score) = match_score(template, ctx) else {
            continue;
        };
        // Strictly greater: on a tie the earlier registration stays.
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((template, score));
        }
    }

    let selection = match best {
        Some((template, score)) => Some(SlotSelection {
            template,
            source: SelectionSource::Rule { score },
        }),
        None => templates
            .default_for(template_type)
            .filter(|t| !is_excluded(t, ctx))
            .map(|template| SlotSelection {
                template,
                source: SelectionSource::Default,
            }),
    };

    debug!(
        "event=template_selected module=selection slot={} page_type={} object_id={:?} template={:?} source={:?}",
        template_type,
        ctx.page_type,
        ctx.object_id,
        selection.map(|s| s.template.id.as_str()),
        selection.map(|s| s.source),
    );
    selection
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSelection<'a> {
    pub header: Option<&'a Template>,
    pub footer: Option<&'a Template>,
    pub body: Option<&'a Template>,
}

impl<'a> TemplateSelection<'a> {
    pub fn get(&self, template_type: TemplateType) -> Option<&'a Template> {
        match template_type {
            TemplateType::Header => self.header,
            TemplateType::Footer => self.footer,
            TemplateType::Body => self.body,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.footer.is_none() && self.body.is_none()
    }
}

pub fn select<'a>(templates: &'a TemplateSet, ctx: &RequestContext) -> TemplateSelection<'a> {
    let pick = |t| select_slot(templates, t, ctx).map(|s| s.template);
    TemplateSelection {
        header: pick(TemplateType::Header),
        footer: pick(TemplateType::Footer),
        body: pick(TemplateType::Body),
    }
}
