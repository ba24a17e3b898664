//! PageForge CLI - bridge interface for the hosting CMS
//!
//! Commands: templates, validate, compile, select, render, clone
//! Outputs JSON to stdout
//! Exit 2 on validation failure, 1 on any other error

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pageforge_core::{
    ids::clone_document, logging::init_logging, templates::condition_label, Document, Engine,
    PageType, PipelineError, RenderMode, RequestContext, StoreError,
};

#[derive(Parser)]
#[command(name = "pageforge-cli")]
#[command(about = "PageForge CLI - Page Layout Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to templates directory
    #[arg(short, long, global = true, default_value = "templates")]
    templates_dir: PathBuf,

    /// Engine config JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Theme defaults JSON
    #[arg(long, global = true)]
    theme: Option<PathBuf>,

    /// trace|debug|info|warn|error|off
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    Templates,

    /// Validate a document
    Validate {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Validate and compile a document
    Compile {
        #[arg(short, long)]
        file: PathBuf,

        /// canvas | preview (defaults to the configured mode)
        #[arg(short, long)]
        mode: Option<RenderMode>,
    },

    /// Select header/body/footer templates for a request
    Select {
        #[arg(short, long)]
        page_type: PageType,

        #[arg(short, long)]
        object_id: Option<i64>,
    },

    /// Render a full page from a stored `{content: ...}` record
    Render {
        #[arg(short, long)]
        page_type: PageType,

        #[arg(short, long)]
        object_id: Option<i64>,

        /// Stored page record; the body template is used when omitted
        #[arg(short, long)]
        record: Option<PathBuf>,

        #[arg(short, long)]
        mode: Option<RenderMode>,
    },

    /// Clone a document with regenerated ids
    Clone {
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&format!("Failed to serialize output: {}", e)),
    }
}

fn fail(message: &str) -> ExitCode {
    println!("{}", json!({"success": false, "error": message}));
    ExitCode::FAILURE
}

fn read_file(path: &Path) -> Result<String, ExitCode> {
    fs::read_to_string(path).map_err(|e| fail(&format!("Failed to read {}: {}", path.display(), e)))
}

fn exit_for(error: &PipelineError) -> ExitCode {
    match error {
        PipelineError::Validation(_)
        | PipelineError::UnsupportedDocumentVersion { .. }
        | PipelineError::Store(StoreError::Rejected(_)) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn request(page_type: PageType, object_id: Option<i64>) -> RequestContext {
    match object_id {
        Some(id) => RequestContext::with_object(page_type, id),
        None => RequestContext::new(page_type),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        return fail(&e);
    }

    let engine = match Engine::load(cli.config.as_deref(), cli.theme.as_deref(), Some(&cli.templates_dir)) {
        Ok(engine) => engine,
        Err(e) => return fail(&format!("Failed to load engine: {}", e)),
    };

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = engine
                .list_templates()
                .iter()
                .map(|t| {
                    let conditions: Vec<_> = t
                        .conditions
                        .iter()
                        .map(|c| json!({"mode": c.mode, "label": condition_label(c)}))
                        .collect();
                    json!({
                        "id": t.id,
                        "name": t.name,
                        "type": t.template_type,
                        "priority": t.priority,
                        "isDefault": t.is_default,
                        "isActive": t.is_active,
                        "conditions": conditions,
                    })
                })
                .collect();
            print_json(&templates)
        }

        Commands::Validate { file } => {
            let text = match read_file(&file) {
                Ok(text) => text,
                Err(code) => return code,
            };
            match engine.validate_json(&text) {
                Ok(doc) => print_json(&json!({"valid": true, "nodes": doc.node_count()})),
                Err(e) => {
                    println!("{}", json!({"valid": false, "error": e.to_string()}));
                    exit_for(&e)
                }
            }
        }

        Commands::Compile { file, mode } => {
            let text = match read_file(&file) {
                Ok(text) => text,
                Err(code) => return code,
            };
            let mode = mode.unwrap_or(engine.config().default_render_mode);
            match engine.preview_json(&text, mode) {
                Ok(page) => print_json(&json!({
                    "success": true,
                    "fingerprint": page.fingerprint(),
                    "page": page,
                })),
                Err(e) => {
                    println!("{}", json!({"success": false, "error": e.to_string()}));
                    exit_for(&e)
                }
            }
        }

        Commands::Select { page_type, object_id } => {
            let selection = engine.select_templates(&request(page_type, object_id));
            print_json(&json!({
                "header": selection.header.map(|t| &t.id),
                "body": selection.body.map(|t| &t.id),
                "footer": selection.footer.map(|t| &t.id),
            }))
        }

        Commands::Render { page_type, object_id, record, mode } => {
            let ctx = request(page_type, object_id);
            let mode = mode.unwrap_or(engine.config().default_render_mode);
            let page = match record {
                Some(path) => match read_file(&path) {
                    Ok(text) => engine.render_stored(&ctx, &text, mode),
                    Err(code) => return code,
                },
                None => engine.render_page(&ctx, None, mode),
            };
            print_json(&json!({
                "success": true,
                "fingerprint": page.fingerprint(),
                "page": page,
            }))
        }

        Commands::Clone { file } => {
            let text = match read_file(&file) {
                Ok(text) => text,
                Err(code) => return code,
            };
            match Document::from_json_str(&text) {
                Ok(doc) => print_json(&clone_document(&doc)),
                Err(e) => fail(&format!("Invalid document: {}", e)),
            }
        }
    }
}
