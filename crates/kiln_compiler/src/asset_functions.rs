//! `asset_path()` / `asset_url()` expansion for stylesheets.
//!
//! grass has no hook for host-defined functions, so calls are replaced in the
//! source text before compilation. Replacements never contain newlines, which
//! keeps line numbers in compiler errors valid for the original source. Calls
//! inside comments and string literals are left untouched.

use std::ops::Range;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::AssetResolver;

static ASSET_CALL: OnceLock<Regex> = OnceLock::new();

fn asset_call() -> &'static Regex {
    ASSET_CALL.get_or_init(|| {
        Regex::new(r"\basset_(path|url)\(([^)\n]*)\)").expect("Invalid asset call pattern")
    })
}

/// A failed `asset_path()` / `asset_url()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFunctionError {
    /// Description of the failure.
    pub message: String,
    /// 1-based line of the call.
    pub line: usize,
}

/// Wraps a resolved path for CSS `url()`.
pub fn url_wrapper(path: &str) -> String {
    format!("url({})", path)
}

/// Replaces every `asset_path("name")` and `asset_url("name")` call in `source`.
///
/// `asset_path` becomes a quoted string, `asset_url` a `url(...)` token. The
/// single argument must be a quoted string literal naming a registered image.
pub fn expand(source: &str, assets: &dyn AssetResolver) -> Result<String, AssetFunctionError> {
    let inert = inert_spans(source);
    let mut failure = None;

    let expanded = asset_call().replace_all(source, |caps: &Captures| {
        let whole = caps.get(0).map_or(0, |m| m.start());
        if inert.iter().any(|span| span.contains(&whole)) {
            return caps[0].to_string();
        }
        if failure.is_some() {
            return String::new();
        }

        let function = format!("asset_{}", &caps[1]);
        let line = line_at(source, whole);

        let Some(name) = string_literal(&caps[2]) else {
            failure = Some(AssetFunctionError {
                message: format!("{}() takes exactly one string argument", function),
                line,
            });
            return String::new();
        };

        match assets.resolve(name) {
            Ok(path) if &caps[1] == "url" => url_wrapper(&path),
            Ok(path) => format!("\"{}\"", path),
            Err(_) => {
                failure = Some(AssetFunctionError {
                    message: format!("{}(): missing asset '{}'", function, name),
                    line,
                });
                String::new()
            }
        }
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(expanded.into_owned()),
    }
}

/// Byte ranges of comments and string literals.
///
/// `//` only starts a comment outside `url(...)`-style tokens, so it must not
/// follow a `:` (`http://`).
fn inert_spans(source: &str) -> Vec<Range<usize>> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
                spans.push(start..i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') && (i == 0 || bytes[i - 1] != b':') => {
                i = source[i..].find('\n').map_or(bytes.len(), |end| i + end);
                spans.push(start..i);
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i = (i + 1).min(bytes.len());
                spans.push(start..i);
            }
            _ => i += 1,
        }
    }

    spans
}

/// Extracts the contents of a single- or double-quoted literal.
fn string_literal(arg: &str) -> Option<&str> {
    let arg = arg.trim();
    let quote = arg.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = arg.strip_prefix(quote)?.strip_suffix(quote)?;
    if inner.contains(quote) {
        return None;
    }
    Some(inner)
}

/// Returns the 1-based line of a byte offset.
fn line_at(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::test_support::assets;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_expand_url_and_path() {
        let assets = assets(&[("logo.svg", "images/logo.svg")]);
        let source = ".a { background: asset_url(\"logo.svg\"); }\n.b { --p: asset_path('logo.svg'); }";

        let out = expand(source, assets.as_ref()).unwrap();

        assert_eq!(
            out,
            ".a { background: url(images/logo.svg); }\n.b { --p: \"images/logo.svg\"; }"
        );
    }

    #[test]
    fn test_expand_leaves_other_functions_alone() {
        let assets = assets(&[]);
        let source = ".a { background: url(x.png); width: my_asset_url(1); }";

        assert_eq!(expand(source, assets.as_ref()).unwrap(), source);
    }

    #[test]
    fn test_missing_asset_reports_line() {
        let assets = assets(&[("logo.svg", "images/logo.svg")]);
        let source = ".a {}\n\n.b { background: asset_url(\"nope.svg\"); }";

        let err = expand(source, assets.as_ref()).unwrap_err();

        assert_eq!(err.line, 3);
        assert!(err.message.contains("missing asset 'nope.svg'"));
    }

    #[test]
    fn test_comments_and_strings_are_not_expanded() {
        let assets = assets(&[("logo.svg", "images/logo.svg")]);
        let source = "// later: asset_url(\"later.svg\")\n/* asset_path(\"old.svg\") */\n.a { content: \"asset_url(x)\"; background: asset_url(\"logo.svg\"); }";

        let out = expand(source, assets.as_ref()).unwrap();

        assert_eq!(
            out,
            "// later: asset_url(\"later.svg\")\n/* asset_path(\"old.svg\") */\n.a { content: \"asset_url(x)\"; background: url(images/logo.svg); }"
        );
    }

    #[test]
    fn test_url_with_scheme_is_not_a_comment() {
        let assets = assets(&[("logo.svg", "images/logo.svg")]);
        let source = ".a { b: url(http://x.test/a.png), asset_url(\"logo.svg\"); }";

        let out = expand(source, assets.as_ref()).unwrap();

        assert_eq!(out, ".a { b: url(http://x.test/a.png), url(images/logo.svg); }");
    }

    #[rstest]
    #[case("asset_url()")]
    #[case("asset_url($name)")]
    #[case("asset_path(\"a.svg\", \"b.svg\")")]
    #[case("asset_path(\"unterminated)")]
    fn test_invalid_arguments(#[case] call: &str) {
        let assets = assets(&[("a.svg", "a.svg")]);
        let source = format!(".a {{ b: {}; }}", call);

        let err = expand(&source, assets.as_ref()).unwrap_err();

        assert_eq!(err.line, 1);
        assert!(err.message.contains("takes exactly one string argument"));
    }
}
