//! URL and import rewriting for compiled sub-modules.

use regex::{Captures, Regex};
use url::form_urlencoded;
use url::Url;

use crate::registry::VirtualKind;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Cache-busting version tag added to deferred requests.
pub const VERSION_PARAM: &str = "v";

/// Set `name=value` on `url`, replacing the first existing occurrence in
/// place and dropping any later duplicates. Appends when absent.
pub fn set_query_param(url: &mut Url, name: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    match pairs.iter().position(|(key, _)| key == name) {
        Some(first) => {
            pairs[first].1 = value.to_string();
            let mut index = 0;
            pairs.retain(|(key, _)| {
                let keep = key != name || index == first;
                index += 1;
                keep
            });
        }
        None => pairs.push((name.to_string(), value.to_string())),
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();
    url.set_query(Some(&query));
}

/// Address of a component's script or template sub-module: the component URL
/// with `type=<kind>` appended to its query.
pub fn virtual_module_url(url: &Url, kind: VirtualKind) -> Url {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(url.query_pairs())
        .append_pair("type", kind.as_str())
        .finish();
    let mut sub = url.clone();
    sub.set_query(Some(&query));
    sub.set_fragment(None);
    sub
}

/// Registry key for a module URL: the URL without its `v` tag, so a
/// sub-module stays addressable when the version changes between compiling
/// the component and fetching the sub-module.
pub fn virtual_module_key(url: &Url) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(url.query_pairs().filter(|(key, _)| key != VERSION_PARAM))
        .finish();
    let base = format!("{}{}", url.origin().ascii_serialization(), url.path());
    if query.is_empty() {
        base
    } else {
        format!("{base}?{query}")
    }
}

// ---------------------------------------------------------------------------
// Framework import rewriting
// ---------------------------------------------------------------------------

/// Everything in `path` before the first `anchor` segment, with a trailing
/// slash. `/` when the anchor does not occur.
pub fn anchor_base(path: &str, anchor: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    match parts.iter().position(|part| *part == anchor) {
        Some(index) => format!("{}/", parts[..index].join("/")),
        None => "/".to_string(),
    }
}

/// Points bare imports of the UI framework at a path-relative local copy.
#[derive(Debug, Clone)]
pub struct FrameworkRewriter {
    pattern: Regex,
    local_path: String,
}

impl FrameworkRewriter {
    pub fn new(specifier: &str, local_path: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r#"(from\s*)(["']){}["']"#,
            regex::escape(specifier)
        ))?;
        Ok(Self {
            pattern,
            local_path: local_path.trim_start_matches('/').to_string(),
        })
    }

    /// Rewrite `from "<specifier>"` / `from '<specifier>'` to `base + local_path`,
    /// preserving the quote style.
    pub fn rewrite(&self, code: &str, base: &str) -> String {
        let target = format!("{base}{}", self.local_path);
        self.pattern
            .replace_all(code, |caps: &Captures| {
                format!("{}{quote}{target}{quote}", &caps[1], quote = &caps[2])
            })
            .into_owned()
    }
}
