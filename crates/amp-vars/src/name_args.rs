use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::{Error, Result};

/// Either `NAME(args)` with the parenthesised list kept verbatim, or a bare
/// token that is taken whole.
static VARIABLE_ARGS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:(\S*)(\([^)]*\))|.+)$").expect("Failed to compile variable args regex")
});

/// A placeholder body split into its identifier and raw argument list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameArgs {
    pub name: String,
    pub arg_list: String,
}

pub fn get_name_args(key: &str) -> Result<NameArgs> {
    if key.is_empty() {
        return Ok(NameArgs::default());
    }

    let captures = VARIABLE_ARGS_REGEX
        .captures(key)
        .ok_or_else(|| Error::Internal(format!("Variable with invalid format found: {}", key)))?;

    match (captures.get(1), captures.get(2)) {
        (Some(name), Some(arg_list)) => Ok(NameArgs {
            name: name.as_str().to_string(),
            arg_list: arg_list.as_str().to_string(),
        }),
        _ => Ok(NameArgs {
            name: key.to_string(),
            arg_list: String::new(),
        }),
    }
}
