//! Builtin-module wrappers.
//!
//! A request under the builtin namespace is answered with a module that pulls
//! the named module from the host and re-exports it as default. Nothing is
//! fetched.

use super::escape::js_string_literal;

/// Module name addressed by `path`, if it lies under `namespace`.
pub fn module_name<'a>(path: &'a str, namespace: &str) -> Option<&'a str> {
    path.strip_prefix(namespace).filter(|name| !name.is_empty())
}

pub fn wrapper_module(name: &str) -> String {
    format!(
        "const module = require({});\nexport default module;",
        js_string_literal(name)
    )
}
