//! Request classification.
//!
//! Routing is two ordered rule tables evaluated first-match-wins. Each table
//! works on a small `Facts` snapshot taken from the request, so the decision
//! itself is pure and can be tested without any I/O.
//!
//! - [`ENTRY_TABLE`] sees every intercepted request.
//! - [`DEFERRED_TABLE`] sees requests the entry table deferred, after the
//!   version tag has been applied.

use url::Url;

use crate::exchange::Request;

// ---------------------------------------------------------------------------
// File kinds
// ---------------------------------------------------------------------------

/// Kind of resource, derived from the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Script,
    TypedScript,
    /// Type declarations (`.d.ts`). Never compiled.
    Declaration,
    Component,
    Json,
    Stylesheet,
    Other,
}

/// Kinds the compilation pipeline knows how to turn into a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Json,
    TypedScript,
    Component,
    Stylesheet,
}

impl FileKind {
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".d.ts") {
            Self::Declaration
        } else if path.ends_with(".ts") {
            Self::TypedScript
        } else if path.ends_with(".vue") {
            Self::Component
        } else if path.ends_with(".json") {
            Self::Json
        } else if path.ends_with(".css") {
            Self::Stylesheet
        } else if path.ends_with(".js") {
            Self::Script
        } else {
            Self::Other
        }
    }

    pub fn source_kind(self) -> Option<SourceKind> {
        match self {
            Self::TypedScript => Some(SourceKind::TypedScript),
            Self::Component => Some(SourceKind::Component),
            Self::Json => Some(SourceKind::Json),
            Self::Stylesheet => Some(SourceKind::Stylesheet),
            Self::Script | Self::Declaration | Self::Other => None,
        }
    }

    /// Extensions the entry table hands to the deferred table.
    fn is_deferrable(self) -> bool {
        !matches!(self, Self::Other)
    }

    /// Extensions the deferred table considers for compilation.
    fn has_source_extension(self) -> bool {
        matches!(
            self,
            Self::TypedScript | Self::Declaration | Self::Component | Self::Json | Self::Stylesheet
        )
    }
}

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// One predicate → route pair.
pub struct Rule<F, R> {
    pub name: &'static str,
    pub applies: fn(&F) -> bool,
    pub route: fn(&F) -> R,
}

/// Ordered rules plus an unconditional fallback, making the table total.
pub struct RuleTable<F: 'static, R: 'static> {
    pub rules: &'static [Rule<F, R>],
    pub otherwise: Rule<F, R>,
}

/// The route picked for a request and the rule that picked it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision<R> {
    pub rule: &'static str,
    pub route: R,
}

impl<F: 'static, R: 'static> RuleTable<F, R> {
    pub fn decide(&self, facts: &F) -> Decision<R> {
        let rule = self
            .rules
            .iter()
            .find(|rule| (rule.applies)(facts))
            .unwrap_or(&self.otherwise);
        Decision {
            rule: rule.name,
            route: (rule.route)(facts),
        }
    }
}

fn always<F>(_: &F) -> bool {
    true
}

// ---------------------------------------------------------------------------
// Entry classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRoute {
    /// Fetch through the offline fallback cache.
    OfflinePassthrough,
    /// Registration root: record it, refresh the version, then pass through.
    RegistrationRoot,
    /// Hand over to the deferred table.
    Deferred,
    /// Serve or fetch-and-cache as a plain asset.
    StaticAsset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFacts {
    pub network_scheme: bool,
    pub registration_root: bool,
    pub is_get: bool,
    pub has_query: bool,
    pub kind: FileKind,
}

impl EntryFacts {
    pub fn inspect(request: &Request, scope: &Url) -> Self {
        Self {
            network_scheme: request.is_network_scheme(),
            registration_root: request.url.as_str() == scope.as_str(),
            is_get: request.method == http::Method::GET,
            has_query: request.url.query().is_some_and(|q| !q.is_empty()),
            kind: FileKind::from_path(request.url.path()),
        }
    }
}

fn not_network_scheme(f: &EntryFacts) -> bool {
    !f.network_scheme
}

fn is_registration_root(f: &EntryFacts) -> bool {
    f.registration_root
}

fn needs_deferral(f: &EntryFacts) -> bool {
    !f.is_get || f.has_query || f.kind.is_deferrable()
}

pub const ENTRY_TABLE: RuleTable<EntryFacts, EntryRoute> = RuleTable {
    rules: &[
        Rule {
            name: "non-network-scheme",
            applies: not_network_scheme,
            route: |_| EntryRoute::OfflinePassthrough,
        },
        Rule {
            name: "registration-root",
            applies: is_registration_root,
            route: |_| EntryRoute::RegistrationRoot,
        },
        Rule {
            name: "deferred",
            applies: needs_deferral,
            route: |_| EntryRoute::Deferred,
        },
    ],
    otherwise: Rule {
        name: "static-asset",
        applies: always,
        route: |_| EntryRoute::StaticAsset,
    },
};

pub fn classify_entry(facts: &EntryFacts) -> Decision<EntryRoute> {
    ENTRY_TABLE.decide(facts)
}

// ---------------------------------------------------------------------------
// Deferred classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredRoute {
    /// Serve the registered virtual module.
    VirtualModule,
    /// Serve or fetch-and-cache into the current version's generation.
    VersionedAsset,
    /// Synthesize a builtin-module re-export.
    BuiltinModule,
    /// Fetch the origin body and run it through the pipeline.
    Compile(SourceKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredFacts {
    pub virtual_hit: bool,
    pub kind: FileKind,
    pub builtin: bool,
    pub cross_origin: bool,
}

impl DeferredFacts {
    /// `cross_origin` reflects the request as the page issued it.
    pub fn inspect(
        request: &Request,
        scope: &Url,
        builtin_namespace: &str,
        cross_origin: bool,
        virtual_hit: bool,
    ) -> Self {
        let same_origin = request.url.origin() == scope.origin();
        Self {
            virtual_hit,
            kind: FileKind::from_path(request.url.path()),
            builtin: same_origin && request.url.path().starts_with(builtin_namespace),
            cross_origin,
        }
    }
}

fn is_virtual_hit(f: &DeferredFacts) -> bool {
    f.virtual_hit
}

fn is_plain_asset(f: &DeferredFacts) -> bool {
    !f.kind.has_source_extension() && !f.builtin
}

fn is_declaration(f: &DeferredFacts) -> bool {
    f.kind == FileKind::Declaration
}

fn is_same_origin_data(f: &DeferredFacts) -> bool {
    matches!(f.kind, FileKind::Stylesheet | FileKind::Json) && !f.cross_origin
}

fn is_builtin(f: &DeferredFacts) -> bool {
    f.builtin
}

fn compile_route(f: &DeferredFacts) -> DeferredRoute {
    match f.kind.source_kind() {
        Some(kind) => DeferredRoute::Compile(kind),
        None => DeferredRoute::VersionedAsset,
    }
}

pub const DEFERRED_TABLE: RuleTable<DeferredFacts, DeferredRoute> = RuleTable {
    rules: &[
        Rule {
            name: "virtual-module",
            applies: is_virtual_hit,
            route: |_| DeferredRoute::VirtualModule,
        },
        Rule {
            name: "plain-asset",
            applies: is_plain_asset,
            route: |_| DeferredRoute::VersionedAsset,
        },
        Rule {
            name: "type-declaration",
            applies: is_declaration,
            route: |_| DeferredRoute::VersionedAsset,
        },
        Rule {
            name: "same-origin-data",
            applies: is_same_origin_data,
            route: |_| DeferredRoute::VersionedAsset,
        },
        Rule {
            name: "builtin-module",
            applies: is_builtin,
            route: |_| DeferredRoute::BuiltinModule,
        },
    ],
    otherwise: Rule {
        name: "compile",
        applies: always,
        route: compile_route,
    },
};

pub fn classify_deferred(facts: &DeferredFacts) -> Decision<DeferredRoute> {
    DEFERRED_TABLE.decide(facts)
}
