use itertools::Itertools;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::name_args::{NameArgs, get_name_args};
use crate::value::VarValue;

/// Characters left alone by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[inline(always)]
pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Percent-encodes a resolved value. Only the name part of a scalar is
/// encoded; a trailing argument list is kept as-is so embedded macro calls
/// survive.
pub fn encode_vars(raw: Option<&VarValue>) -> String {
    match raw {
        None => String::new(),
        Some(VarValue::Array(items)) => items.iter().map(|item| encode_scalar(item)).join(","),
        Some(VarValue::String(s)) => encode_scalar(s),
    }
}

fn encode_scalar(raw: &str) -> String {
    match get_name_args(raw) {
        Ok(NameArgs { name, arg_list }) => format!("{}{}", encode_uri_component(&name), arg_list),
        Err(_) => encode_uri_component(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::none(None, "")]
    #[case::array(Some(VarValue::from(vec!["a b", "c"])), "a%20b,c")]
    #[case::empty_array(Some(VarValue::Array(Vec::new())), "")]
    #[case::plain(Some(VarValue::from("hello world")), "hello%20world")]
    #[case::reserved(Some(VarValue::from("a&b=c/d")), "a%26b%3Dc%2Fd")]
    #[case::unreserved(Some(VarValue::from("a-b_c.d!e~f*g'h")), "a-b_c.d!e~f*g'h")]
    #[case::arg_list_verbatim(Some(VarValue::from("CLIENT_ID(a b)")), "CLIENT_ID(a b)")]
    #[case::encoded_name_with_args(Some(VarValue::from("x/y(a,b)")), "x%2Fy(a,b)")]
    #[case::unicode(Some(VarValue::from("é")), "%C3%A9")]
    fn test_encode_vars(#[case] raw: Option<VarValue>, #[case] expected: &str) {
        assert_eq!(encode_vars(raw.as_ref()), expected);
    }
}
