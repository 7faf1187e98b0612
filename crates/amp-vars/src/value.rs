use std::fmt::{self, Display};

use futures::future::BoxFuture;

use crate::error::Result;

/// A value in the variable bag of an expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    String(String),
    Array(Vec<String>),
}

impl Default for VarValue {
    fn default() -> Self {
        VarValue::String(String::new())
    }
}

impl From<&str> for VarValue {
    fn from(s: &str) -> Self {
        VarValue::String(s.to_string())
    }
}

impl From<String> for VarValue {
    fn from(s: String) -> Self {
        VarValue::String(s)
    }
}

impl From<Vec<String>> for VarValue {
    fn from(items: Vec<String>) -> Self {
        VarValue::Array(items)
    }
}

impl From<Vec<&str>> for VarValue {
    fn from(items: Vec<&str>) -> Self {
        VarValue::Array(items.into_iter().map(str::to_string).collect())
    }
}

/// The settled value of a macro invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroOutput {
    String(String),
    Bool(bool),
    Number(f64),
}

impl MacroOutput {
    pub const EMPTY: MacroOutput = MacroOutput::String(String::new());
}

impl Display for MacroOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroOutput::String(s) => write!(f, "{}", s),
            MacroOutput::Bool(b) => write!(f, "{}", b),
            MacroOutput::Number(n) => write!(f, "{}", format_number(*n)),
        }
    }
}

impl From<String> for MacroOutput {
    fn from(s: String) -> Self {
        MacroOutput::String(s)
    }
}

impl From<&str> for MacroOutput {
    fn from(s: &str) -> Self {
        MacroOutput::String(s.to_string())
    }
}

impl From<bool> for MacroOutput {
    fn from(b: bool) -> Self {
        MacroOutput::Bool(b)
    }
}

impl From<f64> for MacroOutput {
    fn from(n: f64) -> Self {
        MacroOutput::Number(n)
    }
}

impl From<Option<String>> for MacroOutput {
    fn from(value: Option<String>) -> Self {
        value.map(MacroOutput::String).unwrap_or(MacroOutput::EMPTY)
    }
}

/// The result of invoking a macro: either settled immediately or pending on
/// a collaborator.
pub enum MacroResult {
    Sync(MacroOutput),
    Async(BoxFuture<'static, Result<MacroOutput>>),
}

impl MacroResult {
    pub async fn resolve(self) -> Result<MacroOutput> {
        match self {
            MacroResult::Sync(output) => Ok(output),
            MacroResult::Async(future) => future.await,
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, MacroResult::Async(_))
    }
}

impl fmt::Debug for MacroResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroResult::Sync(output) => f.debug_tuple("Sync").field(output).finish(),
            MacroResult::Async(_) => f.write_str("Async(..)"),
        }
    }
}

impl From<MacroOutput> for MacroResult {
    fn from(output: MacroOutput) -> Self {
        MacroResult::Sync(output)
    }
}

impl From<String> for MacroResult {
    fn from(s: String) -> Self {
        MacroResult::Sync(s.into())
    }
}

impl From<&str> for MacroResult {
    fn from(s: &str) -> Self {
        MacroResult::Sync(s.into())
    }
}

impl From<bool> for MacroResult {
    fn from(b: bool) -> Self {
        MacroResult::Sync(b.into())
    }
}

impl From<f64> for MacroResult {
    fn from(n: f64) -> Self {
        MacroResult::Sync(n.into())
    }
}

/// Truthiness used by `$IF`, `$NOT` and `$CALC`: only a handful of exact
/// literals are false.
#[inline(always)]
pub fn string_to_bool(s: &str) -> bool {
    !matches!(s, "false" | "" | "0" | "null" | "NaN" | "undefined")
}

/// Coerces a string the way `Number()` does in a browser.
pub fn to_number(s: &str) -> f64 {
    let s = s.trim();
    match s {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                return u64::from_str_radix(hex, 16)
                    .map(|n| n as f64)
                    .unwrap_or(f64::NAN);
            }

            // Rust accepts "inf" and "nan" spellings that Number() rejects.
            if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
                return f64::NAN;
            }

            s.parse::<f64>().unwrap_or(f64::NAN)
        }
    }
}

/// Base-10 `parseInt`: an optional sign followed by the longest digit prefix.
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();

    digits.parse::<i64>().ok().map(|n| sign * n)
}

/// Rounds half toward positive infinity, as `Math.round` does.
#[inline(always)]
pub fn round_half_up(n: f64) -> f64 {
    (n + 0.5).floor()
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{}", n)
    }
}
