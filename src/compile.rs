//! Compilation pipeline.
//!
//! Turns a fetched source body into an executable module body, one compiler
//! per [`SourceKind`]. The typed-script transpiler and the single-file
//! component toolkit are external collaborators consumed through the
//! [`Transpiler`] and [`ComponentToolkit`] traits; the pipeline depends on
//! nothing but those contracts.
//!
//! The pipeline never touches cache storage. Component compilation does
//! register its script/template sub-modules in the [`VirtualModuleRegistry`].

pub mod builtin;
pub mod component;
pub mod escape;
pub mod rewrite;
pub mod style;

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::classify::SourceKind;
use crate::config::InterceptorConfig;
use crate::registry::VirtualModuleRegistry;
use crate::{InterceptError, Result};

use self::rewrite::FrameworkRewriter;

// ---------------------------------------------------------------------------
// CompileError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("script compile error: {0}")]
    Script(String),

    #[error("template compile errors: {}", .errors.join("; "))]
    Template { errors: Vec<String> },

    #[error("style compile errors: {}", .errors.join("; "))]
    Style { errors: Vec<String> },

    #[error("transpile error: {0}")]
    Transpile(String),

    #[error("invalid JSON module: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} is not available")]
    Unavailable(&'static str),
}

// ---------------------------------------------------------------------------
// Typed-script transpiler contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Es2015,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptTarget {
    Es2019,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOptions {
    pub module: ModuleKind,
    pub target: ScriptTarget,
    pub inline_source_map: bool,
    pub resolve_json_module: bool,
    pub es_module_interop: bool,
}

impl TranspileOptions {
    /// The fixed configuration every typed script is transpiled with.
    pub const fn modules() -> Self {
        Self {
            module: ModuleKind::Es2015,
            target: ScriptTarget::Es2019,
            inline_source_map: true,
            resolve_json_module: true,
            es_module_interop: true,
        }
    }
}

/// `compile(source, options, filename) -> code`.
pub trait Transpiler: Send + Sync {
    fn transpile(
        &self,
        source: &str,
        options: &TranspileOptions,
        file_name: &str,
    ) -> std::result::Result<String, CompileError>;
}

// ---------------------------------------------------------------------------
// Single-file component toolkit contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SfcBlock {
    pub content: String,
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleBlock {
    pub content: String,
    pub lang: Option<String>,
    pub scoped: bool,
}

/// A parsed component: its template, script(s), and style sections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SfcDescriptor {
    pub filename: String,
    pub template: Option<SfcBlock>,
    pub script: Option<SfcBlock>,
    pub script_setup: Option<SfcBlock>,
    pub styles: Vec<StyleBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub filename: String,
    pub source_map: bool,
}

/// Scoping applied to template output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TemplateScoping {
    pub scoped: bool,
    /// Set only when `scoped`.
    pub scope_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCompileOptions {
    pub id: String,
    pub inline_template: bool,
    pub template: TemplateScoping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    pub content: String,
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCompileOptions {
    pub source: String,
    pub filename: String,
    pub id: String,
    pub scoping: TemplateScoping,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledTemplate {
    pub code: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleCompileOptions {
    pub source: String,
    pub filename: String,
    pub id: String,
    pub scoped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledStyle {
    pub code: String,
    pub errors: Vec<String>,
}

pub trait ComponentToolkit: Send + Sync {
    fn parse(
        &self,
        source: &str,
        options: &ParseOptions,
    ) -> std::result::Result<SfcDescriptor, CompileError>;

    fn compile_script(
        &self,
        descriptor: &SfcDescriptor,
        options: &ScriptCompileOptions,
    ) -> std::result::Result<CompiledScript, CompileError>;

    fn compile_template(
        &self,
        options: &TemplateCompileOptions,
    ) -> std::result::Result<CompiledTemplate, CompileError>;

    fn compile_style(
        &self,
        options: &StyleCompileOptions,
    ) -> std::result::Result<CompiledStyle, CompileError>;

    /// Turn `export default <expr>` into `const <as_name> = <expr>`.
    fn rewrite_default(&self, code: &str, as_name: &str) -> std::result::Result<String, CompileError>;
}

/// Stand-in used when no external compiler is wired. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl Transpiler for Unavailable {
    fn transpile(
        &self,
        _source: &str,
        _options: &TranspileOptions,
        _file_name: &str,
    ) -> std::result::Result<String, CompileError> {
        Err(CompileError::Unavailable("typed-script transpiler"))
    }
}

impl ComponentToolkit for Unavailable {
    fn parse(
        &self,
        _source: &str,
        _options: &ParseOptions,
    ) -> std::result::Result<SfcDescriptor, CompileError> {
        Err(CompileError::Unavailable("component toolkit"))
    }

    fn compile_script(
        &self,
        _descriptor: &SfcDescriptor,
        _options: &ScriptCompileOptions,
    ) -> std::result::Result<CompiledScript, CompileError> {
        Err(CompileError::Unavailable("component toolkit"))
    }

    fn compile_template(
        &self,
        _options: &TemplateCompileOptions,
    ) -> std::result::Result<CompiledTemplate, CompileError> {
        Err(CompileError::Unavailable("component toolkit"))
    }

    fn compile_style(
        &self,
        _options: &StyleCompileOptions,
    ) -> std::result::Result<CompiledStyle, CompileError> {
        Err(CompileError::Unavailable("component toolkit"))
    }

    fn rewrite_default(&self, _code: &str, _as_name: &str) -> std::result::Result<String, CompileError> {
        Err(CompileError::Unavailable("component toolkit"))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Millisecond timestamp used to derive scope and diagnostic identifiers.
pub fn timestamp_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

pub struct Pipeline {
    transpiler: Arc<dyn Transpiler>,
    toolkit: Arc<dyn ComponentToolkit>,
    rewriter: FrameworkRewriter,
    anchor_segment: String,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("rewriter", &self.rewriter)
            .field("anchor_segment", &self.anchor_segment)
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        config: &InterceptorConfig,
        transpiler: Arc<dyn Transpiler>,
        toolkit: Arc<dyn ComponentToolkit>,
    ) -> Result<Self> {
        let rewriter =
            FrameworkRewriter::new(&config.framework_specifier, &config.framework_local_path)
                .map_err(|e| InterceptError::Config(format!("framework_specifier: {e}")))?;
        Ok(Self {
            transpiler,
            toolkit,
            rewriter,
            anchor_segment: config.anchor_segment.clone(),
        })
    }

    pub fn toolkit(&self) -> &dyn ComponentToolkit {
        self.toolkit.as_ref()
    }

    pub fn rewriter(&self) -> &FrameworkRewriter {
        &self.rewriter
    }

    pub fn anchor_segment(&self) -> &str {
        &self.anchor_segment
    }

    /// Compile `text`, fetched from `url`, into a module body.
    pub fn compile(
        &self,
        kind: SourceKind,
        url: &Url,
        text: &str,
        registry: &VirtualModuleRegistry,
    ) -> std::result::Result<String, CompileError> {
        match kind {
            SourceKind::Json => json_module(text),
            SourceKind::TypedScript => self.transpile(text, url.as_str()),
            SourceKind::Component => {
                component::compile_component(self, url, text, registry).map(|c| c.module)
            }
            SourceKind::Stylesheet => Ok(style::stylesheet_module(text, &timestamp_id())),
        }
    }

    /// Transpile with the fixed module configuration.
    pub fn transpile(&self, source: &str, file_name: &str) -> std::result::Result<String, CompileError> {
        self.transpiler
            .transpile(source, &TranspileOptions::modules(), file_name)
    }
}

/// `export default <json>`, rejecting bodies that are not JSON.
pub fn json_module(text: &str) -> std::result::Result<String, CompileError> {
    serde_json::from_str::<serde_json::Value>(text)?;
    Ok(format!("export default {text}"))
}
