use std::borrow::Cow;

use serde_json::Value;

/// Keys whose value is a call argument.
const ARGUMENT_KEYS: &[&str] =
    &["parameter", "parameters", "task_description", "argument"];

/// A rewrite for a known defect in model-written JSON.
///
/// Rules are only applied to payloads that failed to decode, and each one
/// leaves text it does not recognize untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NormalizationRule {
    /// Replaces typographic double quotes outside string literals with
    /// ASCII ones.
    SmartQuotes,
    /// Drops commas directly before a closing `}` or `]`.
    TrailingCommas,
    /// Turns an argument written as an unquoted `{...}` fragment into a
    /// JSON string.
    BareBraceArgument,
}

impl NormalizationRule {
    /// All rules, in the order they are applied.
    pub const ALL: [NormalizationRule; 3] = [
        NormalizationRule::SmartQuotes,
        NormalizationRule::TrailingCommas,
        NormalizationRule::BareBraceArgument,
    ];

    /// Applies the rule to `input`.
    pub fn apply(self, input: &str) -> Cow<'_, str> {
        match self {
            NormalizationRule::SmartQuotes => replace_smart_quotes(input),
            NormalizationRule::TrailingCommas => drop_trailing_commas(input),
            NormalizationRule::BareBraceArgument => {
                quote_bare_brace_arguments(input)
            }
        }
    }
}

/// Applies every rule in order.
pub(super) fn normalize(input: &str) -> Cow<'_, str> {
    let mut text = Cow::Borrowed(input);
    for rule in NormalizationRule::ALL {
        let rewritten = match rule.apply(&text) {
            Cow::Owned(rewritten) => rewritten,
            Cow::Borrowed(_) => continue,
        };
        trace!("normalization rule {rule:?} rewrote the payload");
        text = Cow::Owned(rewritten);
    }
    text
}

fn replace_smart_quotes(input: &str) -> Cow<'_, str> {
    const SMART_QUOTES: [char; 4] = ['\u{201c}', '\u{201d}', '\u{201e}', '\u{201f}'];
    if !input.contains(SMART_QUOTES) {
        return Cow::Borrowed(input);
    }

    // Quotes inside ASCII string literals are content.
    let bytes = input.as_bytes();
    let mut output = String::with_capacity(input.len());
    let mut replaced = false;
    let mut i = 0;
    while let Some(ch) = input[i..].chars().next() {
        if ch == '"' {
            let Some(end) = string_end(bytes, i) else {
                output.push_str(&input[i..]);
                break;
            };
            output.push_str(&input[i..=end]);
            i = end + 1;
            continue;
        }
        if SMART_QUOTES.contains(&ch) {
            output.push('"');
            replaced = true;
        } else {
            output.push(ch);
        }
        i += ch.len_utf8();
    }

    if !replaced {
        return Cow::Borrowed(input);
    }
    Cow::Owned(output)
}

fn drop_trailing_commas(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    let mut dropped = vec![];
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => match string_end(bytes, i) {
                Some(end) => i = end,
                None => break,
            },
            b',' => {
                let next = skip_whitespace(bytes, i + 1);
                if matches!(bytes.get(next), Some(b'}' | b']')) {
                    dropped.push(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    if dropped.is_empty() {
        return Cow::Borrowed(input);
    }
    let mut output = String::with_capacity(input.len());
    let mut copied = 0;
    for comma in dropped {
        output.push_str(&input[copied..comma]);
        copied = comma + 1;
    }
    output.push_str(&input[copied..]);
    Cow::Owned(output)
}

fn quote_bare_brace_arguments(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    let mut output = String::new();
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }
        let Some(end) = string_end(bytes, i) else {
            break;
        };
        let key = &input[i + 1..end];
        i = end + 1;
        if !ARGUMENT_KEYS.contains(&key) {
            continue;
        }

        let colon = skip_whitespace(bytes, i);
        if bytes.get(colon) != Some(&b':') {
            continue;
        }
        let open = skip_whitespace(bytes, colon + 1);
        if bytes.get(open) != Some(&b'{') {
            continue;
        }
        let Some(close) = matching_brace(bytes, open) else {
            continue;
        };

        let fragment = &input[open..=close];
        if serde_json::from_str::<Value>(fragment).is_err() {
            output.push_str(&input[copied..open]);
            output.push_str(&Value::String(fragment.to_owned()).to_string());
            copied = close + 1;
        }
        i = close + 1;
    }

    if copied == 0 {
        return Cow::Borrowed(input);
    }
    output.push_str(&input[copied..]);
    Cow::Owned(output)
}

/// Returns the index of the quote closing the string literal that starts
/// at `start`.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    i
}

/// Returns the index of the `}` matching the `{` at `open`, skipping over
/// string literals.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = string_end(bytes, i)?,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smart_quotes() {
        let rule = NormalizationRule::SmartQuotes;
        assert_eq!(
            rule.apply("{\u{201c}a\u{201d}: \u{201e}b\u{201f}}"),
            r#"{"a": "b"}"#
        );
        assert!(matches!(rule.apply(r#"{"a": "b"}"#), Cow::Borrowed(_)));
        // Quotes inside a string literal belong to the text.
        assert!(matches!(
            rule.apply("{\"a\": \"He said \u{201c}hi\u{201d}\"}"),
            Cow::Borrowed(_)
        ));
        assert_eq!(
            rule.apply("{\u{201c}a\u{201d}: \"\u{201c}x\u{201d}\"}"),
            "{\"a\": \"\u{201c}x\u{201d}\"}"
        );
    }

    #[test]
    fn test_trailing_commas() {
        let rule = NormalizationRule::TrailingCommas;
        assert_eq!(rule.apply(r#"{"a": [1, 2, ], }"#), r#"{"a": [1, 2 ] }"#);
        assert_eq!(rule.apply("[1,\n]"), "[1\n]");
        // Commas inside strings are content.
        assert!(matches!(
            rule.apply(r#"{"a": "x,}", "b": "\",]"}"#),
            Cow::Borrowed(_)
        ));
        assert!(matches!(rule.apply(r#"[1, 2]"#), Cow::Borrowed(_)));
    }

    #[test]
    fn test_bare_brace_argument() {
        let rule = NormalizationRule::BareBraceArgument;
        assert_eq!(
            rule.apply(r#"{"tool_name": "f", "parameter": {x: 1}}"#),
            r#"{"tool_name": "f", "parameter": "{x: 1}"}"#
        );
        assert_eq!(
            rule.apply(r#"{"task_description":{write "a poem"}}"#),
            r#"{"task_description":"{write \"a poem\"}"}"#
        );
        // A valid object argument is left alone.
        assert!(matches!(
            rule.apply(r#"{"parameter": {"x": 1}}"#),
            Cow::Borrowed(_)
        ));
        // Other keys are not arguments.
        assert!(matches!(rule.apply(r#"{"other": {x: 1}}"#), Cow::Borrowed(_)));
        // Unbalanced fragments are left alone.
        assert!(matches!(rule.apply(r#"{"parameter": {x: 1"#), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_applies_all_rules() {
        let input = "{\u{201c}parameter\u{201d}: {a: 1},}";
        assert_eq!(normalize(input), r#"{"parameter": "{a: 1}"}"#);
        assert!(matches!(normalize(r#"{"a": 1}"#), Cow::Borrowed(_)));
    }
}
