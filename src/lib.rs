//! PageForge Core - Page Layout Compiler
//!
//! # Guarantees
//! 1. Documents Are Trees: section > row > column > module, nothing else
//! 2. Validation Guards Persistence: invalid documents are never stored
//! 3. Deterministic Output: same document, same HTML and CSS
//! 4. Renders Are Isolated: all render state lives in one context value
//! 5. Selection Is Total: ties resolve by registration order, never an error

pub mod node;
pub mod style;
pub mod css;
pub mod registry;
pub mod modules;
pub mod ids;
pub mod validation;
pub mod compiler;
pub mod selection;
pub mod templates;
pub mod config;
pub mod hashing;
pub mod store;
pub mod logging;
pub mod pipeline;

pub use node::{Attributes, Document, Node, NodeId, NodeKind};
pub use style::{EffectiveAttrs, StyleResolver, StyleValue, ThemeDefaultsProvider, Variant};
pub use registry::{ModuleCapability, ModuleLookup, ModuleRegistry, ModuleRenderInput};
pub use validation::{ValidationError, ValidationRule, Validator};
pub use compiler::{CompiledPage, Compiler, Diagnostic, RenderContext, RenderMode};
pub use selection::{Condition, ConditionMode, PageType, RequestContext, TemplateSelection};
pub use templates::{Template, TemplateError, TemplateId, TemplateSet, TemplateType};
pub use config::{EngineConfig, ThemeDefaults};
pub use hashing::{canonical_json, compute_document_hash};
pub use store::{DocumentStore, SaveOutcome, StoreError, StoredRecord};
pub use pipeline::{Engine, PipelineError, RenderedPage};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DOCUMENT_FORMAT_VERSION: &str = "1.0.0";
