use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};

use crate::config::AssertionMode;
use crate::error::{Error, Result};
use crate::registry::{Allowlist, Bindings};
use crate::services::{Services, UrlReplacements};

#[derive(Debug, Clone, PartialEq)]
struct Arg {
    text: String,
    quoted: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Call { name: String, args: Vec<Arg> },
}

/// Resolves macro calls such as `CLIENT_ID` or `$SUBSTR(CLIENT_ID, 0, 5)`
/// found in a string, looking names up in the given bindings.
#[derive(Debug, Clone)]
pub struct MacroExpander {
    services: Services,
    mode: AssertionMode,
}

impl MacroExpander {
    pub fn new(services: Services, mode: AssertionMode) -> Self {
        Self { services, mode }
    }

    fn expand<'a>(
        &'a self,
        input: &'a str,
        bindings: &'a Bindings,
        allowlist: Option<&'a Allowlist>,
    ) -> BoxFuture<'a, Result<String>> {
        async move {
            let segments = parse_segments(input, |name| {
                bindings.contains_key(name) && allowlist.is_none_or(|allowed| allowed.contains(name))
            });

            let parts = try_join_all(segments.into_iter().map(|segment| async move {
                match segment {
                    Segment::Text(text) => Ok(text),
                    Segment::Call { name, args } => {
                        let result = self.invoke(&name, &args, bindings, allowlist).await;
                        self.settle(&name, result)
                    }
                }
            }))
            .await?;

            Ok(parts.concat())
        }
        .boxed()
    }

    async fn invoke(
        &self,
        name: &str,
        args: &[Arg],
        bindings: &Bindings,
        allowlist: Option<&Allowlist>,
    ) -> Result<String> {
        let args = try_join_all(args.iter().map(|arg| async move {
            if arg.quoted {
                Ok(arg.text.clone())
            } else {
                self.expand(&arg.text, bindings, allowlist).await
            }
        }))
        .await?;

        let binding = bindings
            .get(name)
            .ok_or_else(|| Error::Internal(format!("\"{}\" is not bound", name)))?;
        let output = binding.invoke(name, &self.services, &args)?.resolve().await?;

        tracing::debug!("Expanded macro {}({}) to \"{}\"", name, args.join(","), output);
        Ok(output.to_string())
    }

    fn settle(&self, name: &str, result: Result<String>) -> Result<String> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if self.mode == AssertionMode::Production => {
                tracing::error!("Failed to expand macro \"{}\": {}", name, e);
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl UrlReplacements for MacroExpander {
    async fn expand_string_async(
        &self,
        value: &str,
        bindings: &Bindings,
        allowlist: Option<&Allowlist>,
    ) -> Result<String> {
        self.expand(value, bindings, allowlist).await
    }
}

#[inline(always)]
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn parse_segments(input: &str, is_callable: impl Fn(&str) -> bool) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut pos = 0;

    while let Some(c) = input[pos..].chars().next() {
        if !is_ident_char(c) {
            text.push(c);
            pos += c.len_utf8();
            continue;
        }

        let end = input[pos..]
            .find(|c: char| !is_ident_char(c))
            .map_or(input.len(), |offset| pos + offset);
        let ident = &input[pos..end];

        if !is_callable(ident) {
            text.push_str(ident);
            pos = end;
            continue;
        }

        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }

        match parse_args(input, end) {
            Some((args, next)) => {
                segments.push(Segment::Call {
                    name: ident.to_string(),
                    args,
                });
                pos = next;
            }
            None => {
                segments.push(Segment::Call {
                    name: ident.to_string(),
                    args: Vec::new(),
                });
                pos = end;
            }
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }

    segments
}

/// Parses a parenthesised argument list starting at `open`. Returns the
/// arguments and the position after the closing parenthesis, or `None` when
/// there is no well-formed list.
fn parse_args(input: &str, open: usize) -> Option<(Vec<Arg>, usize)> {
    if !input[open..].starts_with('(') {
        return None;
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_backtick = false;
    let mut depth = 0usize;

    for (offset, c) in input[open + 1..].char_indices() {
        if in_backtick {
            if c == '`' {
                in_backtick = false;
            } else {
                current.push(c);
            }
            continue;
        }

        match c {
            '`' => {
                if current.trim().is_empty() {
                    current.clear();
                }
                quoted = true;
                in_backtick = true;
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth > 0 => {
                depth -= 1;
                current.push(c);
            }
            ')' => {
                if !(args.is_empty() && !quoted && current.trim().is_empty()) {
                    args.push(finish_arg(&mut current, &mut quoted));
                }
                return Some((args, open + 1 + offset + c.len_utf8()));
            }
            ',' if depth == 0 => args.push(finish_arg(&mut current, &mut quoted)),
            c if quoted && c.is_whitespace() => {}
            c => current.push(c),
        }
    }

    None
}

fn finish_arg(current: &mut String, quoted: &mut bool) -> Arg {
    let text = std::mem::take(current);
    let arg = if *quoted {
        Arg { text, quoted: true }
    } else {
        Arg {
            text: text.trim().to_string(),
            quoted: false,
        }
    };
    *quoted = false;
    arg
}
