use std::sync::{Arc, LazyLock, Mutex};

use base64::prelude::*;
use itertools::Itertools;
use regex_lite::Regex;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::registry::ParamNum;
use crate::services::Services;
use crate::value::{MacroOutput, MacroResult, parse_int, round_half_up, string_to_bool, to_number};

static REGEX_CACHE: LazyLock<Mutex<FxHashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Macros registered once per service and shared by every document.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
pub enum BuiltinMacro {
    #[strum(serialize = "$DEFAULT")]
    Default,
    #[strum(serialize = "$SUBSTR")]
    Substr,
    #[strum(serialize = "$TRIM")]
    Trim,
    #[strum(serialize = "$TOLOWERCASE")]
    ToLowerCase,
    #[strum(serialize = "$TOUPPERCASE")]
    ToUpperCase,
    #[strum(serialize = "$NOT")]
    Not,
    #[strum(serialize = "$BASE64")]
    Base64,
    #[strum(serialize = "$HASH")]
    Hash,
    #[strum(serialize = "$IF")]
    If,
    #[strum(serialize = "$REPLACE")]
    Replace,
    #[strum(serialize = "$MATCH")]
    Match,
    #[strum(serialize = "$CALC")]
    Calc,
    #[strum(serialize = "$EQUALS")]
    Equals,
    #[strum(serialize = "LINKER_PARAM")]
    LinkerParam,
    #[strum(serialize = "TIMEZONE_CODE")]
    TimezoneCode,
    #[strum(serialize = "SCROLL_TOP")]
    ScrollTop,
    #[strum(serialize = "SCROLL_LEFT")]
    ScrollLeft,
    #[strum(serialize = "EXPERIMENT_BRANCHES")]
    ExperimentBranches,
    #[strum(serialize = "AMPDOC_META")]
    AmpdocMeta,
}

impl BuiltinMacro {
    pub fn num_params(&self) -> ParamNum {
        match self {
            BuiltinMacro::Default => ParamNum::Range(0, 2),
            BuiltinMacro::Substr => ParamNum::Range(2, 3),
            BuiltinMacro::Trim
            | BuiltinMacro::ToLowerCase
            | BuiltinMacro::ToUpperCase
            | BuiltinMacro::Not
            | BuiltinMacro::Base64
            | BuiltinMacro::Hash => ParamNum::Range(0, 1),
            BuiltinMacro::If => ParamNum::Range(0, 3),
            BuiltinMacro::Replace => ParamNum::Range(0, 3),
            BuiltinMacro::Match => ParamNum::Range(0, 3),
            BuiltinMacro::Calc => ParamNum::Range(2, 4),
            BuiltinMacro::Equals => ParamNum::Range(0, 2),
            BuiltinMacro::LinkerParam => ParamNum::Range(0, 2),
            BuiltinMacro::TimezoneCode | BuiltinMacro::ScrollTop | BuiltinMacro::ScrollLeft => {
                ParamNum::None
            }
            BuiltinMacro::ExperimentBranches => ParamNum::Range(0, 1),
            BuiltinMacro::AmpdocMeta => ParamNum::Range(0, 2),
        }
    }

    pub fn invoke(&self, services: &Services, args: &[String]) -> Result<MacroResult> {
        match self {
            BuiltinMacro::Default => {
                let value = arg(args, 0);
                Ok(if value.is_empty() { arg(args, 1) } else { value }.into())
            }
            BuiltinMacro::Substr => substr(arg(args, 0), arg(args, 1), opt_arg(args, 2)).map(Into::into),
            BuiltinMacro::Trim => Ok(arg(args, 0).trim().into()),
            BuiltinMacro::ToLowerCase => Ok(arg(args, 0).to_lowercase().into()),
            BuiltinMacro::ToUpperCase => Ok(arg(args, 0).to_uppercase().into()),
            BuiltinMacro::Not => Ok((!string_to_bool(arg(args, 0))).to_string().into()),
            BuiltinMacro::Base64 => Ok(base64_url_encode(arg(args, 0).as_bytes()).into()),
            BuiltinMacro::Hash => {
                let crypto = Arc::clone(&services.crypto);
                let value = arg(args, 0).to_string();
                Ok(MacroResult::Async(Box::pin(async move {
                    crypto.sha384_base64(&value).await.map(MacroOutput::String)
                })))
            }
            BuiltinMacro::If => Ok(if string_to_bool(arg(args, 0)) {
                arg(args, 1)
            } else {
                arg(args, 2)
            }
            .into()),
            BuiltinMacro::Replace => replace_re(arg(args, 0), opt_arg(args, 1), arg(args, 2)).map(Into::into),
            BuiltinMacro::Match => match_re(arg(args, 0), arg(args, 1), opt_arg(args, 2)).map(Into::into),
            BuiltinMacro::Calc => calc(arg(args, 0), arg(args, 1), arg(args, 2), arg(args, 3)).map(Into::into),
            BuiltinMacro::Equals => Ok((arg(args, 0) == arg(args, 1)).into()),
            BuiltinMacro::LinkerParam => {
                Ok(MacroOutput::from(services.linker.get(arg(args, 0), arg(args, 1))).into())
            }
            BuiltinMacro::TimezoneCode => {
                Ok(MacroOutput::from(services.environment.timezone_code()).into())
            }
            BuiltinMacro::ScrollTop => Ok(round_half_up(services.viewport.scroll_top()).into()),
            BuiltinMacro::ScrollLeft => Ok(round_half_up(services.viewport.scroll_left()).into()),
            BuiltinMacro::ExperimentBranches => Ok(match opt_arg(args, 0) {
                Some(name) => MacroOutput::from(services.experiments.branch(name)),
                None => services
                    .experiments
                    .branches()
                    .iter()
                    .map(|(name, branch)| format!("{}:{}", name, branch))
                    .join(",")
                    .into(),
            }
            .into()),
            BuiltinMacro::AmpdocMeta => Ok(services
                .meta
                .meta(arg(args, 0))
                .unwrap_or_else(|| arg(args, 1).to_string())
                .into()),
        }
    }
}

#[inline(always)]
fn arg(args: &[String], index: usize) -> &str {
    args.get(index).map(String::as_str).unwrap_or_default()
}

/// Like [`arg`], but an empty argument counts as omitted.
#[inline(always)]
fn opt_arg(args: &[String], index: usize) -> Option<&str> {
    args.get(index).map(String::as_str).filter(|s| !s.is_empty())
}

/// URL-safe base64 with `.` as the padding character.
pub(crate) fn base64_url_encode(bytes: &[u8]) -> String {
    BASE64_URL_SAFE.encode(bytes).replace('=', ".")
}

fn substr(value: &str, start: &str, length: Option<&str>) -> Result<String> {
    let start_num = to_number(start);
    if !start_num.is_finite() {
        return Err(Error::InvalidNumber(
            BuiltinMacro::Substr.to_string(),
            "start index",
            start.to_string(),
        ));
    }

    let chars = value.chars().collect_vec();
    let len = chars.len() as f64;

    let length_num = match length {
        Some(length) => {
            let n = to_number(length);
            if !n.is_finite() {
                return Err(Error::InvalidNumber(
                    BuiltinMacro::Substr.to_string(),
                    "length",
                    length.to_string(),
                ));
            }
            n.trunc()
        }
        None => len,
    };

    let start_num = start_num.trunc();
    let begin = if start_num < 0.0 {
        (len + start_num).max(0.0)
    } else {
        start_num.min(len)
    };
    let count = length_num.max(0.0).min(len - begin);

    Ok(chars
        .iter()
        .skip(begin as usize)
        .take(count as usize)
        .collect())
}

fn cached_regex(pattern: &str) -> Result<Regex> {
    let mut cache = REGEX_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(re) = cache.get(pattern) {
        Ok(re.clone())
    } else if let Ok(re) = Regex::new(pattern) {
        cache.insert(pattern.to_string(), re.clone());
        Ok(re)
    } else {
        Err(Error::InvalidRegularExpression(pattern.to_string()))
    }
}

fn replace_re(input: &str, pattern: Option<&str>, replacement: &str) -> Result<String> {
    match pattern {
        Some(pattern) => Ok(cached_regex(pattern)?.replace_all(input, replacement).to_string()),
        None => {
            tracing::warn!("REPLACE macro must have two or more arguments");
            Ok(input.to_string())
        }
    }
}

fn match_re(input: &str, pattern: &str, group: Option<&str>) -> Result<String> {
    let index = match group.map(|g| (g, parse_int(g))) {
        None => 0,
        Some((_, Some(n))) if n >= 0 => n as usize,
        Some((g, _)) => {
            tracing::error!("Third argument in MATCH macro must be a number >= 0, got \"{}\"", g);
            0
        }
    };

    Ok(cached_regex(pattern)?
        .captures(input)
        .and_then(|captures| captures.get(index))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default())
}

fn calc(left: &str, right: &str, op: &str, round: &str) -> Result<MacroOutput> {
    let name = BuiltinMacro::Calc.to_string();
    let l = to_number(left);
    if l.is_nan() {
        return Err(Error::InvalidNumber(name, "first operand", left.to_string()));
    }
    let r = to_number(right);
    if r.is_nan() {
        return Err(Error::InvalidNumber(name, "second operand", right.to_string()));
    }

    let result = match op {
        "add" => l + r,
        "subtract" => l - r,
        "multiply" => l * r,
        "divide" if r == 0.0 => return Err(Error::ZeroDivision(name)),
        "divide" => l / r,
        _ => {
            tracing::error!(
                "CALC macro op must be one of add, subtract, multiply or divide, got \"{}\"",
                op
            );
            return Ok(MacroOutput::EMPTY);
        }
    };

    Ok(if string_to_bool(round) {
        round_half_up(result)
    } else {
        result
    }
    .into())
}
