//! Long-lived worker state.
//!
//! One [`WorkerContext`] is built at startup and shared by every request and
//! lifecycle event. It owns the handles (network, storage, compilers), the
//! virtual module registry, and the current version.

use std::num::NonZeroUsize;
use std::sync::{Arc, PoisonError, RwLock};

use url::Url;

use crate::compile::{ComponentToolkit, Pipeline, Transpiler, Unavailable};
use crate::config::InterceptorConfig;
use crate::generations::CacheNames;
use crate::kv::KvStore;
use crate::network::Network;
use crate::registry::VirtualModuleRegistry;
use crate::storage::CacheStorage;
use crate::version::Version;
use crate::{InterceptError, Result};

pub struct WorkerContext {
    config: InterceptorConfig,
    scope: Url,
    names: CacheNames,
    network: Arc<dyn Network>,
    storage: Arc<dyn CacheStorage>,
    kv: KvStore,
    registry: VirtualModuleRegistry,
    pipeline: Pipeline,
    version: RwLock<Option<Version>>,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("scope", &self.scope.as_str())
            .field("names", &self.names)
            .field("version", &self.current_version())
            .field("registry_len", &self.registry.len())
            .finish()
    }
}

impl WorkerContext {
    /// Start building a context for the registration `scope`.
    ///
    /// Compilers default to [`Unavailable`]; wire real ones with
    /// [`WorkerContextBuilder::with_transpiler`] and
    /// [`WorkerContextBuilder::with_component_toolkit`].
    pub fn builder(
        config: InterceptorConfig,
        scope: Url,
        network: Arc<dyn Network>,
        storage: Arc<dyn CacheStorage>,
    ) -> WorkerContextBuilder {
        WorkerContextBuilder {
            config,
            scope,
            network,
            storage,
            transpiler: Arc::new(Unavailable),
            toolkit: Arc::new(Unavailable),
        }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn network(&self) -> &dyn Network {
        self.network.as_ref()
    }

    pub fn storage(&self) -> &dyn CacheStorage {
        self.storage.as_ref()
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    pub fn registry(&self) -> &VirtualModuleRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The version computed by the last explicit version check, if any.
    pub fn current_version(&self) -> Option<Version> {
        self.version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_version(&self, version: Version) {
        *self.version.write().unwrap_or_else(PoisonError::into_inner) = Some(version);
    }
}

pub struct WorkerContextBuilder {
    config: InterceptorConfig,
    scope: Url,
    network: Arc<dyn Network>,
    storage: Arc<dyn CacheStorage>,
    transpiler: Arc<dyn Transpiler>,
    toolkit: Arc<dyn ComponentToolkit>,
}

impl WorkerContextBuilder {
    pub fn with_transpiler(mut self, transpiler: Arc<dyn Transpiler>) -> Self {
        self.transpiler = transpiler;
        self
    }

    pub fn with_component_toolkit(mut self, toolkit: Arc<dyn ComponentToolkit>) -> Self {
        self.toolkit = toolkit;
        self
    }

    pub fn build(self) -> Result<WorkerContext> {
        let capacity = NonZeroUsize::new(self.config.registry_capacity).ok_or_else(|| {
            InterceptError::Config("registry_capacity must be at least 1".into())
        })?;
        let pipeline = Pipeline::new(&self.config, self.transpiler, self.toolkit)?;
        let names = CacheNames::from_config(&self.config);
        let kv = KvStore::new(Arc::clone(&self.storage), names.kv.clone());

        Ok(WorkerContext {
            names,
            kv,
            registry: VirtualModuleRegistry::new(capacity),
            pipeline,
            config: self.config,
            scope: self.scope,
            network: self.network,
            storage: self.storage,
            version: RwLock::new(None),
        })
    }
}
