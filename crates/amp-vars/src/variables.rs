use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use regex_lite::Regex;

use crate::config::{AssertionMode, Config};
use crate::element::{ElementContext, ElementMacro};
use crate::encode::encode_vars;
use crate::error::Result;
use crate::expander::MacroExpander;
use crate::name_args::{NameArgs, get_name_args};
use crate::options::ExpansionOptions;
use crate::registry::{Allowlist, Binding, Bindings, MacroRegistry, ParamNum};
use crate::services::{Services, UrlReplacements};
use crate::value::{MacroResult, VarValue};

/// `${...}` spans. A `}` always closes the innermost placeholder.
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("Failed to compile placeholder regex"));

enum Piece<'a> {
    Text(&'a str),
    Placeholder { literal: &'a str, key: &'a str },
}

fn split_placeholders(template: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut last = 0;

    for captures in PLACEHOLDER_REGEX.captures_iter(template) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        if whole.start() > last {
            pieces.push(Piece::Text(&template[last..whole.start()]));
        }
        pieces.push(Piece::Placeholder {
            literal: whole.as_str(),
            key: key.as_str(),
        });
        last = whole.end();
    }

    if last < template.len() {
        pieces.push(Piece::Text(&template[last..]));
    }

    pieces
}

/// Expands `${name}` and `${name(args)}` placeholders in analytics
/// templates.
///
/// The global macro table is built once at construction. Per-document macros
/// are bound to an [`ElementContext`] on every [`VariableService::get_macros`]
/// call.
pub struct VariableService {
    registry: MacroRegistry,
    url_replacements: Arc<dyn UrlReplacements>,
    config: Config,
}

impl VariableService {
    pub fn new(config: Config, url_replacements: Arc<dyn UrlReplacements>) -> Self {
        Self {
            registry: MacroRegistry::with_builtins(config.mode),
            url_replacements,
            config,
        }
    }

    /// Uses [`MacroExpander`] to resolve macro calls.
    pub fn with_defaults(config: Config, services: Services) -> Self {
        let expander = MacroExpander::new(services, config.mode);
        Self::new(config, Arc::new(expander))
    }

    pub fn register(&mut self, name: impl Into<String>, binding: Binding) -> Result<()> {
        self.registry.register(name, binding)
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, num_params: ParamNum, func: F) -> Result<()>
    where
        F: Fn(&[String]) -> Result<MacroResult> + Send + Sync + 'static,
    {
        self.registry.register_fn(name, num_params, func)
    }

    /// The global macros merged with the element's document macros and,
    /// outside embedded documents, its performance macros. Later entries
    /// replace earlier ones.
    pub fn get_macros(&self, element: &Arc<ElementContext>) -> Bindings {
        let mut bindings = self.registry.bindings().clone();

        bindings.extend(
            ElementMacro::document_macros()
                .map(|m| (m.to_string(), Binding::Element(m, Arc::clone(element)))),
        );

        if !element.in_embedded_doc {
            bindings.extend(
                ElementMacro::performance_macros()
                    .map(|m| (m.to_string(), Binding::Element(m, Arc::clone(element)))),
            );
        }

        bindings
    }

    /// Expands every placeholder of `template`.
    ///
    /// `bindings` defaults to [`VariableService::get_macros`] for `element`.
    /// When `allowlist` is given, only the macros it names may be called.
    pub async fn expand_template(
        &self,
        template: &str,
        options: &ExpansionOptions,
        element: &Arc<ElementContext>,
        bindings: Option<&Bindings>,
        allowlist: Option<&Allowlist>,
    ) -> Result<String> {
        let bindings = match bindings {
            Some(bindings) => Cow::Borrowed(bindings),
            None => Cow::Owned(self.get_macros(element)),
        };

        self.expand(template, options, &bindings, allowlist).await
    }

    fn expand<'a>(
        &'a self,
        template: &'a str,
        options: &'a ExpansionOptions,
        bindings: &'a Bindings,
        allowlist: Option<&'a Allowlist>,
    ) -> BoxFuture<'a, Result<String>> {
        async move {
            let pieces = split_placeholders(template);

            let parts = try_join_all(pieces.into_iter().map(|piece| async move {
                match piece {
                    Piece::Text(text) => Ok(text.to_string()),
                    Piece::Placeholder { literal, key } => {
                        let result = self
                            .expand_placeholder(literal, key, options, bindings, allowlist)
                            .await;
                        self.settle(key, result)
                    }
                }
            }))
            .await?;

            Ok(parts.concat())
        }
        .boxed()
    }

    async fn expand_placeholder(
        &self,
        literal: &str,
        key: &str,
        options: &ExpansionOptions,
        bindings: &Bindings,
        allowlist: Option<&Allowlist>,
    ) -> Result<String> {
        if options.iterations < 0 {
            tracing::error!("Maximum depth reached while expanding variables: {}", key);
            return Ok(literal.to_string());
        }

        let NameArgs { name, arg_list } = get_name_args(key)?;

        if name.is_empty() {
            return Ok(String::new());
        }

        if options.is_frozen(&name) {
            return Ok(literal.to_string());
        }

        let nested = options.nested();
        let value = match options.get_var(&name) {
            VarValue::String(raw) => VarValue::String(
                self.expand_value(&raw, &arg_list, &nested, bindings, allowlist)
                    .await?,
            ),
            VarValue::Array(items) => VarValue::Array(
                try_join_all(
                    items
                        .iter()
                        .map(|item| self.expand_value(item, "", &nested, bindings, allowlist)),
                )
                .await?,
            ),
        };

        tracing::debug!("Expanded variable {} to {:?}", key, value);

        if !options.no_encode {
            return Ok(encode_vars(Some(&value)));
        }

        Ok(match value {
            VarValue::String(s) => s,
            VarValue::Array(items) => items.join(","),
        })
    }

    /// Expands a resolved value one level deeper, then resolves the macro
    /// calls it contains.
    async fn expand_value(
        &self,
        raw: &str,
        arg_list: &str,
        options: &ExpansionOptions,
        bindings: &Bindings,
        allowlist: Option<&Allowlist>,
    ) -> Result<String> {
        let expanded = self.expand(raw, options, bindings, allowlist).await?;
        self.url_replacements
            .expand_string_async(&format!("{}{}", expanded, arg_list), bindings, allowlist)
            .await
    }

    fn settle(&self, key: &str, result: Result<String>) -> Result<String> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if self.config.mode == AssertionMode::Production => {
                tracing::error!("Failed to expand variable \"{}\": {}", key, e);
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for VariableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableService")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
