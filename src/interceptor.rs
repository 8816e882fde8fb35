//! Request interception and worker lifecycle.
//!
//! Every request goes through two rule tables. The entry table decides
//! between offline passthrough, registration-root handling, deferral, and
//! plain static caching. Deferred requests are re-tagged with the current
//! version and classified again to pick a virtual module, a versioned asset,
//! a builtin wrapper, or a compilation.

use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::HeaderValue;
use tracing::{debug, error, info, warn};

use crate::classify::{
    classify_deferred, classify_entry, DeferredFacts, DeferredRoute, EntryFacts, EntryRoute,
    SourceKind,
};
use crate::compile::builtin;
use crate::compile::rewrite::{set_query_param, virtual_module_key, VERSION_PARAM};
use crate::context::WorkerContext;
use crate::exchange::{RedirectPolicy, Request, RequestMode, Response};
use crate::fetch::{fetch_and_cache, fetch_and_cache_offline};
use crate::generations::{self, VersionCheck};
use crate::kv::ROOT_URL_KEY;
use crate::version::Version;
use crate::{InterceptError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub version: Version,
    pub precached: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub version: Option<Version>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Interceptor {
    ctx: Arc<WorkerContext>,
}

impl Interceptor {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Resolve the version and warm the versioned generation with the
    /// configured precache list. Individual precache failures are logged.
    pub async fn install(&self) -> Result<InstallReport> {
        let check = generations::resolve_version(&self.ctx).await?;
        let generation = self.ctx.names().versioned(&check.version);

        let mut precached = 0;
        for path in &self.ctx.config().precache {
            let request = Request::get(self.ctx.scope().join(path)?);
            match self.ctx.network().fetch(&request).await {
                Ok(response) if response.is_success() => {
                    match self
                        .ctx
                        .storage()
                        .put(&generation, request.cache_key(), &response)
                        .await
                    {
                        Ok(()) => precached += 1,
                        Err(e) => warn!(url = %request.url, error = %e, "precache store failed"),
                    }
                }
                Ok(response) => {
                    warn!(url = %request.url, status = %response.status, "precache skipped")
                }
                Err(e) => warn!(url = %request.url, error = %e, "precache fetch failed"),
            }
        }

        info!(version = %check.version, precached, "installed");
        Ok(InstallReport {
            version: check.version,
            precached,
        })
    }

    /// Resolve the version, then sweep for whatever version is current.
    pub async fn activate(&self) -> ActivationReport {
        let mut deleted = match generations::resolve_version(&self.ctx).await {
            Ok(check) => check.deleted,
            Err(e) => {
                warn!(error = %e, "version resolution failed during activation");
                Vec::new()
            }
        };

        let version = self.ctx.current_version();
        match &version {
            Some(version) => deleted.extend(generations::sweep(&self.ctx, version).await),
            None => warn!("no version known, skipping activation sweep"),
        }

        info!(deleted = deleted.len(), "activated");
        ActivationReport { version, deleted }
    }

    pub fn message(&self, payload: &serde_json::Value) {
        info!(payload = %payload, "message received");
    }

    pub async fn check_version(&self) -> Result<Version> {
        generations::check_version(&self.ctx).await
    }

    pub async fn resolve_version(&self) -> Result<VersionCheck> {
        generations::resolve_version(&self.ctx).await
    }

    pub fn current_version(&self) -> Option<Version> {
        self.ctx.current_version()
    }

    // -----------------------------------------------------------------------
    // Fetch
    // -----------------------------------------------------------------------

    pub async fn handle(&self, request: Request) -> Result<Response> {
        let decision = classify_entry(&EntryFacts::inspect(&request, self.ctx.scope()));
        debug!(url = %request.url, rule = decision.rule, "entry");

        match decision.route {
            EntryRoute::OfflinePassthrough => fetch_and_cache_offline(&self.ctx, &request).await,
            EntryRoute::RegistrationRoot => self.handle_root(request).await,
            EntryRoute::Deferred => self.handle_deferred(request).await,
            EntryRoute::StaticAsset => {
                let version = self.ctx.current_version();
                fetch_and_cache(&self.ctx, &request, version.as_ref()).await
            }
        }
    }

    async fn handle_root(&self, request: Request) -> Result<Response> {
        if let Err(e) = self
            .ctx
            .kv()
            .write(ROOT_URL_KEY, request.url.as_str().to_owned())
            .await
        {
            warn!(error = %e, "failed to record root URL");
        }

        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            if let Err(e) = generations::resolve_version(&ctx).await {
                warn!(error = %e, "background version resolution failed");
            }
        });

        fetch_and_cache_offline(&self.ctx, &request).await
    }

    async fn handle_deferred(&self, request: Request) -> Result<Response> {
        let cross_origin = request.has_origin_header();
        let version = self.ctx.current_version();

        let mut url = request.url.clone();
        if let Some(version) = &version {
            set_query_param(&mut url, VERSION_PARAM, version.as_str());
        }
        let mut tagged = Request::new(request.method.clone(), url);
        tagged.headers = request.headers.clone();
        tagged.credentials = request.credentials;
        tagged.mode = RequestMode::SameOrigin;
        tagged.redirect = RedirectPolicy::Manual;

        let virtual_source = self.ctx.registry().get(&virtual_module_key(&tagged.url));
        let facts = DeferredFacts::inspect(
            &tagged,
            self.ctx.scope(),
            &self.ctx.config().builtin_namespace,
            cross_origin,
            virtual_source.is_some(),
        );
        let decision = classify_deferred(&facts);
        debug!(url = %tagged.url, rule = decision.rule, "deferred");

        match decision.route {
            DeferredRoute::VirtualModule => Ok(Response::javascript(
                virtual_source.as_deref().unwrap_or_default(),
            )),
            DeferredRoute::VersionedAsset => {
                fetch_and_cache(&self.ctx, &tagged, version.as_ref()).await
            }
            DeferredRoute::BuiltinModule => {
                let namespace = &self.ctx.config().builtin_namespace;
                match builtin::module_name(tagged.url.path(), namespace) {
                    Some(name) => {
                        info!(module = name, "serving builtin module");
                        Ok(Response::javascript(builtin::wrapper_module(name)))
                    }
                    None => Ok(Response::not_found()),
                }
            }
            DeferredRoute::Compile(kind) => {
                let result = self.compile_source(&tagged, kind).await;
                if let Err(e) = &result {
                    error!(url = %tagged.url, error = %e, "compilation failed");
                }
                result
            }
        }
    }

    async fn compile_source(&self, tagged: &Request, kind: SourceKind) -> Result<Response> {
        let origin_request = Request::new(http::Method::GET, tagged.url.clone())
            .with_mode(RequestMode::NoCors)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let response = fetch_and_cache_offline(&self.ctx, &origin_request).await?;
        if !response.is_success() {
            return Ok(response);
        }

        info!(url = %tagged.url, kind = ?kind, "compiling");
        let module = self
            .ctx
            .pipeline()
            .compile(kind, &tagged.url, &response.text(), self.ctx.registry())
            .map_err(|source| InterceptError::Compile {
                url: tagged.url.to_string(),
                source,
            })?;
        info!(url = %tagged.url, "compiled");

        Ok(Response::javascript(module))
    }
}
