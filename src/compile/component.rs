//! Single-file component decomposition.
//!
//! A component becomes up to three modules:
//! 1. a script sub-module exporting `__sfc_main__` (`?...&type=script`)
//! 2. a template sub-module exporting `render` (`?...&type=template`)
//! 3. the entry module, which imports both, wires them together, exports the
//!    component as default, and injects every style block
//!
//! Order matters: the script is compiled before the template, and both before
//! any style injection is emitted. Sub-modules are registered in the
//! [`VirtualModuleRegistry`] so the follow-up requests for them never reach
//! the network. Nothing is registered unless every section compiles.

use url::Url;

use super::escape::js_string_literal;
use super::rewrite::{anchor_base, virtual_module_key, virtual_module_url};
use super::{
    style, timestamp_id, CompileError, ParseOptions, Pipeline, ScriptCompileOptions,
    StyleCompileOptions, TemplateCompileOptions, TemplateScoping,
};
use crate::registry::{VirtualKind, VirtualModuleRegistry};

/// Name the component's default export is rebound to.
pub const SFC_MAIN: &str = "__sfc_main__";

/// Result of compiling one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentModule {
    /// Entry module body.
    pub module: String,
    /// Identifier shared by the script attachment, template and styles.
    pub scope_id: String,
    pub scoped: bool,
    /// Address the entry module imports the script from.
    pub script_url: String,
    /// `None` when the component has no template section.
    pub template_url: Option<String>,
    /// Registry keys of the sub-modules, script first.
    pub registered: Vec<String>,
    pub style_count: usize,
}

pub fn compile_component(
    pipeline: &Pipeline,
    url: &Url,
    source: &str,
    registry: &VirtualModuleRegistry,
) -> Result<ComponentModule, CompileError> {
    let toolkit = pipeline.toolkit();
    let filename = url.as_str().to_string();

    let descriptor = toolkit.parse(
        source,
        &ParseOptions {
            filename: filename.clone(),
            source_map: true,
        },
    )?;

    let scoped = descriptor.styles.iter().any(|block| block.scoped);
    let scope_id = format!("data-v-{}", timestamp_id());
    let scoping = TemplateScoping {
        scoped,
        scope_id: scoped.then(|| scope_id.clone()),
    };
    let base = anchor_base(url.path(), pipeline.anchor_segment());

    // Script
    let script = toolkit.compile_script(
        &descriptor,
        &ScriptCompileOptions {
            id: scope_id.clone(),
            inline_template: true,
            template: scoping.clone(),
        },
    )?;
    let script_url = virtual_module_url(url, VirtualKind::Script);
    let content = if script.lang.as_deref() == Some("ts") {
        pipeline.transpile(&script.content, script_url.as_str())?
    } else {
        script.content
    };
    let rebound = toolkit.rewrite_default(&content, SFC_MAIN)?;
    let exported = rebound.replacen(
        &format!("const {SFC_MAIN}"),
        &format!("export const {SFC_MAIN}"),
        1,
    );
    let mut sub_modules = vec![(
        virtual_module_key(&script_url),
        pipeline.rewriter().rewrite(&exported, &base),
    )];

    let mut body = vec![
        format!(
            "import {{ {SFC_MAIN} }} from {};",
            js_string_literal(script_url.as_str())
        ),
        format!("{SFC_MAIN}.__scopeId = {};", js_string_literal(&scope_id)),
    ];

    // Template
    let template_url = match &descriptor.template {
        Some(template) => {
            let compiled = toolkit.compile_template(&TemplateCompileOptions {
                source: template.content.clone(),
                filename: filename.clone(),
                id: scope_id.clone(),
                scoping: scoping.clone(),
            })?;
            if !compiled.errors.is_empty() {
                return Err(CompileError::Template {
                    errors: compiled.errors,
                });
            }
            let template_url = virtual_module_url(url, VirtualKind::Template);
            sub_modules.push((
                virtual_module_key(&template_url),
                pipeline.rewriter().rewrite(&compiled.code, &base),
            ));
            body.push(format!(
                "import {{ render }} from {};",
                js_string_literal(template_url.as_str())
            ));
            body.push(format!("{SFC_MAIN}.render = render;"));
            Some(template_url.to_string())
        }
        None => None,
    };

    body.push(format!("export default {SFC_MAIN};"));

    // Styles
    for (index, block) in descriptor.styles.iter().enumerate() {
        let compiled = toolkit.compile_style(&StyleCompileOptions {
            source: block.content.clone(),
            filename: filename.clone(),
            id: scope_id.clone(),
            scoped: block.scoped,
        })?;
        if !compiled.errors.is_empty() {
            return Err(CompileError::Style {
                errors: compiled.errors,
            });
        }
        body.push(style::component_style(index, &compiled.code));
    }

    let registered = sub_modules
        .into_iter()
        .map(|(key, source)| {
            registry.register(key.clone(), source);
            key
        })
        .collect();

    Ok(ComponentModule {
        module: body.join("\n"),
        scope_id,
        scoped,
        script_url: script_url.to_string(),
        template_url,
        registered,
        style_count: descriptor.styles.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::compile::{
        CompiledScript, CompiledStyle, CompiledTemplate, ComponentToolkit, SfcBlock,
        SfcDescriptor, StyleBlock, Unavailable,
    };
    use crate::config::InterceptorConfig;

    /// One script, one template and one style block; the style can be made
    /// to report diagnostics.
    struct FixedToolkit {
        style_errors: Vec<String>,
    }

    impl ComponentToolkit for FixedToolkit {
        fn parse(
            &self,
            _source: &str,
            options: &ParseOptions,
        ) -> Result<SfcDescriptor, CompileError> {
            Ok(SfcDescriptor {
                filename: options.filename.clone(),
                template: Some(SfcBlock {
                    content: "<p/>".into(),
                    lang: None,
                }),
                script: Some(SfcBlock {
                    content: "export default {}".into(),
                    lang: None,
                }),
                script_setup: None,
                styles: vec![StyleBlock {
                    content: "p { margin: 0 }".into(),
                    lang: None,
                    scoped: false,
                }],
            })
        }

        fn compile_script(
            &self,
            descriptor: &SfcDescriptor,
            _options: &ScriptCompileOptions,
        ) -> Result<CompiledScript, CompileError> {
            let block = descriptor.script.clone().unwrap_or(SfcBlock {
                content: String::new(),
                lang: None,
            });
            Ok(CompiledScript {
                content: block.content,
                lang: block.lang,
            })
        }

        fn compile_template(
            &self,
            _options: &TemplateCompileOptions,
        ) -> Result<CompiledTemplate, CompileError> {
            Ok(CompiledTemplate {
                code: "export function render() {}".into(),
                errors: Vec::new(),
            })
        }

        fn compile_style(
            &self,
            options: &StyleCompileOptions,
        ) -> Result<CompiledStyle, CompileError> {
            Ok(CompiledStyle {
                code: options.source.clone(),
                errors: self.style_errors.clone(),
            })
        }

        fn rewrite_default(&self, code: &str, as_name: &str) -> Result<String, CompileError> {
            Ok(code.replacen("export default", &format!("const {as_name} ="), 1))
        }
    }

    fn pipeline(style_errors: Vec<String>) -> Pipeline {
        Pipeline::new(
            &InterceptorConfig::default(),
            Arc::new(Unavailable),
            Arc::new(FixedToolkit { style_errors }),
        )
        .unwrap()
    }

    fn registry() -> VirtualModuleRegistry {
        VirtualModuleRegistry::new(NonZeroUsize::new(8).unwrap())
    }

    #[test]
    fn registers_untagged_keys_after_success() {
        let registry = registry();
        let url = Url::parse("https://app.test/ui/Card.vue?v=1.0.0").unwrap();

        let component = compile_component(&pipeline(Vec::new()), &url, "", &registry).unwrap();

        assert_eq!(
            component.script_url,
            "https://app.test/ui/Card.vue?v=1.0.0&type=script"
        );
        assert_eq!(
            component.template_url.as_deref(),
            Some("https://app.test/ui/Card.vue?v=1.0.0&type=template")
        );
        assert_eq!(
            component.registered,
            vec![
                "https://app.test/ui/Card.vue?type=script".to_string(),
                "https://app.test/ui/Card.vue?type=template".to_string(),
            ]
        );
        assert_eq!(component.style_count, 1);
        assert!(registry.contains("https://app.test/ui/Card.vue?type=script"));
        assert!(registry.contains("https://app.test/ui/Card.vue?type=template"));
    }

    #[test]
    fn style_diagnostics_register_nothing() {
        let registry = registry();
        let url = Url::parse("https://app.test/ui/Card.vue").unwrap();

        let err = compile_component(
            &pipeline(vec!["unclosed block".into()]),
            &url,
            "",
            &registry,
        )
        .unwrap_err();

        assert!(matches!(err, CompileError::Style { .. }));
        assert!(registry.is_empty());
    }
}
