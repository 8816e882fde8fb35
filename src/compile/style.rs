//! Style injection snippets.
//!
//! Styles are not emitted as CSS. The module creates a `<style>` element as a
//! side effect of being evaluated.

use super::escape::{escape_js_template_literal, js_string_literal};

/// Injection statements for the `index`-th style block of a component.
pub fn component_style(index: usize, css: &str) -> String {
    let var = format!("el{index}");
    format!(
        "let {var} = document.createElement('style');\n\
         {var}.textContent = `{}`;\n\
         document.body.append({var});",
        escape_js_template_literal(css)
    )
}

/// Module body for a standalone stylesheet, tagged with `id` for diagnostics.
pub fn stylesheet_module(css: &str, id: &str) -> String {
    format!(
        "const style = document.createElement('style');\n\
         style.setAttribute('type', 'text/css');\n\
         style.setAttribute('data-dev-id', {});\n\
         style.textContent = {};\n\
         document.head.appendChild(style);",
        js_string_literal(&format!("data-v-{id}")),
        js_string_literal(css)
    )
}
