//! Operand token classification.
//!
//! Tokens are the textual references editors type or drop into a clause:
//! `@value.<nodeId>`, `@select.<nodeId>[.<option>]`, `@<variable>`, `#<marker>`.
//! Anything else is a constant.

use crate::condition::expr::ValueRef;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

const NODE_VALUE_PREFIX: &str = "@value.";
const NODE_OPTION_PREFIX: &str = "@select.";

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[@#][A-Za-z0-9_][A-Za-z0-9_.\-]*").expect("valid token regex")
});

/// Resolves one raw token into an operand reference.
///
/// Classification is by prefix and never fails: unrecognized input becomes a
/// constant (`true`/`false` as booleans, numeric text as numbers, otherwise a
/// string).
pub fn classify_token(token: &str) -> ValueRef {
    let token = token.trim();

    if let Some(node_id) = token.strip_prefix(NODE_VALUE_PREFIX) {
        return ValueRef::NodeValue {
            node_id: node_id.to_string(),
        };
    }

    if let Some(rest) = token.strip_prefix(NODE_OPTION_PREFIX) {
        let (node_id, option) = match rest.split_once('.') {
            Some((node_id, option)) if !option.is_empty() => {
                (node_id.to_string(), Some(option.to_string()))
            }
            Some((node_id, _)) => (node_id.to_string(), None),
            None => (rest.to_string(), None),
        };
        return ValueRef::NodeOption { node_id, option };
    }

    if let Some(key) = token.strip_prefix('@') {
        return ValueRef::Variable {
            key: key.to_string(),
        };
    }

    if let Some(tag) = token.strip_prefix('#') {
        return ValueRef::Marker {
            tag: tag.to_string(),
        };
    }

    ValueRef::Const {
        value: parse_constant(token),
    }
}

fn parse_constant(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(integer) = raw.parse::<i64>() {
        return Value::Number(integer.into());
    }

    raw.parse::<f64>()
        .ok()
        .filter(|float| float.is_finite())
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(raw.to_string()), Value::Number)
}

/// Extracts every token occurring in free text, in order of appearance and
/// without duplicates. Trailing dots (sentence punctuation) are not part of a
/// token.
pub fn scan_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for found in TOKEN_RE.find_iter(text) {
        let token = found.as_str().trim_end_matches('.');
        if token.len() < 2 || tokens.iter().any(|existing| existing == token) {
            continue;
        }
        tokens.push(token.to_string());
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::{classify_token, scan_tokens};
    use crate::condition::expr::ValueRef;
    use serde_json::json;

    #[test]
    fn classifies_node_value_and_option_tokens() {
        assert_eq!(
            classify_token("@value.abc"),
            ValueRef::NodeValue {
                node_id: "abc".to_string()
            }
        );
        assert_eq!(
            classify_token("@select.abc.red"),
            ValueRef::NodeOption {
                node_id: "abc".to_string(),
                option: Some("red".to_string())
            }
        );
        assert_eq!(
            classify_token("@select.abc"),
            ValueRef::NodeOption {
                node_id: "abc".to_string(),
                option: None
            }
        );
    }

    #[test]
    fn classifies_variables_markers_and_constants() {
        assert_eq!(
            classify_token(" @user.country "),
            ValueRef::Variable {
                key: "user.country".to_string()
            }
        );
        assert_eq!(
            classify_token("#premium"),
            ValueRef::Marker {
                tag: "premium".to_string()
            }
        );
        assert_eq!(classify_token("42"), ValueRef::Const { value: json!(42) });
        assert_eq!(classify_token("2.5"), ValueRef::Const { value: json!(2.5) });
        assert_eq!(classify_token("true"), ValueRef::Const { value: json!(true) });
        assert_eq!(
            classify_token("hello"),
            ValueRef::Const {
                value: json!("hello")
            }
        );
    }

    #[test]
    fn non_token_text_containing_prefix_letters_stays_constant() {
        assert_eq!(
            classify_token("value.abc"),
            ValueRef::Const {
                value: json!("value.abc")
            }
        );
        assert_eq!(classify_token("NaN"), ValueRef::Const { value: json!("NaN") });
    }

    #[test]
    fn scan_finds_tokens_in_order_without_duplicates() {
        let text = "if @value.n1 > 3 and #vip, or @value.n1 equals @select.n2.blue.";
        assert_eq!(
            scan_tokens(text),
            vec![
                "@value.n1".to_string(),
                "#vip".to_string(),
                "@select.n2.blue".to_string(),
            ]
        );
        assert!(scan_tokens("no references here @ # ").is_empty());
    }
}
