//! Shared fixtures: a scripted origin server, recording compilers, and a
//! harness that wires them into an [`Interceptor`].

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use intercept_loader::compile::{
    CompileError, CompiledScript, CompiledStyle, CompiledTemplate, ComponentToolkit, ParseOptions,
    ScriptCompileOptions, SfcBlock, SfcDescriptor, StyleBlock, StyleCompileOptions,
    TemplateCompileOptions, TranspileOptions, Transpiler,
};
use intercept_loader::storage::MemoryCacheStorage;
use intercept_loader::{
    CacheError, CacheStorage, FetchError, Interceptor, InterceptorConfig, Network, Request,
    Response, WorkerContext,
};

pub const SCOPE: &str = "https://app.test/";

// ---------------------------------------------------------------------------
// Origin server
// ---------------------------------------------------------------------------

/// Serves fixed bodies by origin + path; the query string is ignored.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    seen: Mutex<Vec<Request>>,
}

impl ScriptedNetwork {
    pub fn serve(&self, url: &str, body: &str) {
        self.serve_response(url, Response::ok(body.to_string()));
    }

    pub fn serve_response(&self, url: &str, response: Response) {
        let url = Url::parse(url).unwrap();
        self.routes.lock().unwrap().insert(route_key(&url), response);
    }

    /// Make every fetch of `url` fail with a transport error.
    pub fn fail(&self, url: &str) {
        let url = Url::parse(url).unwrap();
        self.failing.lock().unwrap().insert(route_key(&url));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.seen.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

fn route_key(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Offline);
        }
        self.seen.lock().unwrap().push(request.clone());
        if self.failing.lock().unwrap().contains(&route_key(&request.url)) {
            return Err(FetchError::Failed("connection reset".into()));
        }
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&route_key(&request.url))
            .cloned()
            .unwrap_or_else(Response::not_found))
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// A cache backend where every operation fails.
#[derive(Default)]
pub struct BrokenStorage;

fn broken() -> CacheError {
    CacheError::Corrupt("storage unavailable".into())
}

#[async_trait]
impl CacheStorage for BrokenStorage {
    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Err(broken())
    }

    async fn has(&self, _name: &str) -> Result<bool, CacheError> {
        Err(broken())
    }

    async fn delete(&self, _name: &str) -> Result<bool, CacheError> {
        Err(broken())
    }

    async fn put(&self, _name: &str, _key: &str, _response: &Response) -> Result<(), CacheError> {
        Err(broken())
    }

    async fn lookup(&self, _name: &str, _key: &str) -> Result<Option<Response>, CacheError> {
        Err(broken())
    }
}

// ---------------------------------------------------------------------------
// Compilers
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingTranspiler {
    pub calls: Mutex<Vec<(TranspileOptions, String)>>,
}

impl Transpiler for RecordingTranspiler {
    fn transpile(
        &self,
        source: &str,
        options: &TranspileOptions,
        file_name: &str,
    ) -> Result<String, CompileError> {
        self.calls
            .lock()
            .unwrap()
            .push((options.clone(), file_name.to_string()));
        Ok(format!("/* transpiled */\n{}", source.replace(": number", "")))
    }
}

/// Splits components with regexes and records every option it receives.
#[derive(Default)]
pub struct FakeToolkit {
    pub scripts: Mutex<Vec<ScriptCompileOptions>>,
    pub templates: Mutex<Vec<TemplateCompileOptions>>,
    pub styles: Mutex<Vec<StyleCompileOptions>>,
}

impl ComponentToolkit for FakeToolkit {
    fn parse(&self, source: &str, options: &ParseOptions) -> Result<SfcDescriptor, CompileError> {
        let template = Regex::new(r"(?s)<template>(.*?)</template>").unwrap();
        let script = Regex::new(r#"(?s)<script(?:\s+lang="(\w+)")?>(.*?)</script>"#).unwrap();
        let style = Regex::new(r"(?s)<style(\s+scoped)?>(.*?)</style>").unwrap();

        if !source.contains('<') {
            return Err(CompileError::Parse("not a component".into()));
        }

        Ok(SfcDescriptor {
            filename: options.filename.clone(),
            template: template.captures(source).map(|caps| SfcBlock {
                content: caps[1].trim().to_string(),
                lang: None,
            }),
            script: script.captures(source).map(|caps| SfcBlock {
                content: caps[2].trim().to_string(),
                lang: caps.get(1).map(|m| m.as_str().to_string()),
            }),
            script_setup: None,
            styles: style
                .captures_iter(source)
                .map(|caps| StyleBlock {
                    content: caps[2].trim().to_string(),
                    lang: None,
                    scoped: caps.get(1).is_some(),
                })
                .collect(),
        })
    }

    fn compile_script(
        &self,
        descriptor: &SfcDescriptor,
        options: &ScriptCompileOptions,
    ) -> Result<CompiledScript, CompileError> {
        self.scripts.lock().unwrap().push(options.clone());
        let block = descriptor.script.clone().unwrap_or(SfcBlock {
            content: "export default {}".into(),
            lang: None,
        });
        Ok(CompiledScript {
            content: block.content,
            lang: block.lang,
        })
    }

    fn compile_template(
        &self,
        options: &TemplateCompileOptions,
    ) -> Result<CompiledTemplate, CompileError> {
        self.templates.lock().unwrap().push(options.clone());
        let errors = if options.source.contains("{{ broken") {
            vec!["unterminated interpolation".to_string()]
        } else {
            Vec::new()
        };
        Ok(CompiledTemplate {
            code: format!(
                "import {{ h }} from \"vue\";\nexport function render() {{ return h({:?}); }}",
                options.source
            ),
            errors,
        })
    }

    fn compile_style(&self, options: &StyleCompileOptions) -> Result<CompiledStyle, CompileError> {
        self.styles.lock().unwrap().push(options.clone());
        let code = if options.scoped {
            options.source.replace(" {", &format!("[{}] {{", options.id))
        } else {
            options.source.clone()
        };
        Ok(CompiledStyle {
            code,
            errors: Vec::new(),
        })
    }

    fn rewrite_default(&self, code: &str, as_name: &str) -> Result<String, CompileError> {
        Ok(code.replacen("export default", &format!("const {as_name} ="), 1))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub interceptor: Interceptor,
    pub network: Arc<ScriptedNetwork>,
    pub storage: MemoryCacheStorage,
    pub transpiler: Arc<RecordingTranspiler>,
    pub toolkit: Arc<FakeToolkit>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(InterceptorConfig::default())
    }

    pub fn with_config(config: InterceptorConfig) -> Self {
        Self::with_storage(config, MemoryCacheStorage::new())
    }

    pub fn with_storage(config: InterceptorConfig, storage: MemoryCacheStorage) -> Self {
        Self::assemble(config, Arc::new(storage.clone()), storage)
    }

    /// Every cache operation fails; `storage` stays empty and unused.
    pub fn with_broken_storage() -> Self {
        Self::assemble(
            InterceptorConfig::default(),
            Arc::new(BrokenStorage),
            MemoryCacheStorage::new(),
        )
    }

    fn assemble(
        config: InterceptorConfig,
        backend: Arc<dyn CacheStorage>,
        storage: MemoryCacheStorage,
    ) -> Self {
        let network = Arc::new(ScriptedNetwork::default());
        network.serve("https://app.test/", "<!doctype html><title>app</title>");
        network.serve(
            "https://app.test/version.json",
            r#"{"version": "1.2", "extVersion": "3"}"#,
        );

        let transpiler = Arc::new(RecordingTranspiler::default());
        let toolkit = Arc::new(FakeToolkit::default());
        let ctx = WorkerContext::builder(
            config,
            Url::parse(SCOPE).unwrap(),
            network.clone(),
            backend,
        )
        .with_transpiler(transpiler.clone())
        .with_component_toolkit(toolkit.clone())
        .build()
        .unwrap();

        Self {
            interceptor: Interceptor::new(ctx),
            network,
            storage,
            transpiler,
            toolkit,
        }
    }

    pub fn set_manifest(&self, version: &str, ext_version: &str) {
        self.network.serve(
            "https://app.test/version.json",
            &format!(r#"{{"version": "{version}", "extVersion": "{ext_version}"}}"#),
        );
    }

    pub async fn get(&self, url: &str) -> Response {
        self.interceptor
            .handle(Request::parse(url).unwrap())
            .await
            .unwrap()
    }

    pub async fn get_cross_origin(&self, url: &str) -> Response {
        let request = Request::parse(url).unwrap().with_header(
            http::header::ORIGIN,
            http::HeaderValue::from_static("https://page.test"),
        );
        self.interceptor.handle(request).await.unwrap()
    }
}
