//! Placeholder route patterns and the weighted rule table.
//!
//! A Route whose path contains placeholders (`/page/<pagename>/`,
//! `/item/<int:id>/`) declares a dynamic rule. Rules are compiled into
//! anchored regexes and tried in a fixed order, so the winner for a given
//! path does not depend on the order the Routes were inserted in.
//!
//! Supported converters:
//!
//! | Placeholder | Matches | Parameter |
//! |-------------|---------|-----------|
//! | `<name>` / `<string:name>` | one segment | text |
//! | `<int:name>` | digits | integer |
//! | `<float:name>` | `digits.digits` | float |
//! | `<path:name>` | one or more segments | text |

use std::cmp::Reverse;

use regex::Regex;

use crate::error::CoreError;
use crate::params::Params;
use crate::value::Value;

/// How a placeholder matches and what type its parameter gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    Default,
    Int,
    Float,
    Path,
}

impl Converter {
    fn parse(name: &str) -> Option<Converter> {
        match name {
            "" | "default" | "string" => Some(Converter::Default),
            "int" => Some(Converter::Int),
            "float" => Some(Converter::Float),
            "path" => Some(Converter::Path),
            _ => None,
        }
    }

    fn regex(&self) -> &'static str {
        match self {
            Converter::Default => "([^/]+)",
            Converter::Int => r"(\d+)",
            Converter::Float => r"(\d+\.\d+)",
            Converter::Path => "([^/].*?)",
        }
    }

    fn convert(&self, raw: &str) -> Option<Value> {
        match self {
            Converter::Default | Converter::Path => Some(Value::Text(raw.to_string())),
            Converter::Int => raw.parse::<i64>().ok().map(Value::Integer),
            Converter::Float => raw.parse::<f64>().ok().map(Value::Float),
        }
    }
}

/// A compiled dynamic route rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: String,
    weight: i64,
    regex: Regex,
    placeholders: Vec<(String, Converter)>,
    literal_len: usize,
}

/// The outcome of matching a path against a [`RuleTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    /// The rule's pattern exactly as stored on its Route.
    pub pattern: String,
    /// Typed values captured by the placeholders.
    pub params: Params,
}

impl Rule {
    /// True when `path` contains placeholder syntax.
    pub fn is_pattern(path: &str) -> bool {
        path.find('<')
            .map(|open| path[open..].contains('>'))
            .unwrap_or(false)
    }

    /// Compiles a pattern string into a rule.
    pub fn compile(pattern: &str, weight: i64) -> Result<Rule, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidRule {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut source = String::from("^");
        if !pattern.starts_with('/') {
            source.push('/');
        }
        let mut placeholders: Vec<(String, Converter)> = Vec::new();
        let mut literal_len = 0;
        let mut rest = pattern;

        while let Some(open) = rest.find('<') {
            let literal = &rest[..open];
            literal_len += literal.len();
            source.push_str(&regex::escape(literal));

            let close = rest[open..]
                .find('>')
                .map(|c| open + c)
                .ok_or_else(|| invalid("unclosed placeholder"))?;
            let inner = &rest[open + 1..close];
            let (converter, name) = inner.split_once(':').unwrap_or(("", inner));
            let converter = Converter::parse(converter.trim())
                .ok_or_else(|| invalid(&format!("unknown converter '{}'", converter)))?;
            let name = name.trim();
            if !is_identifier(name) {
                return Err(invalid(&format!("invalid placeholder name '{}'", name)));
            }
            if placeholders.iter().any(|(existing, _)| existing == name) {
                return Err(invalid(&format!("duplicate placeholder '{}'", name)));
            }
            source.push_str(converter.regex());
            placeholders.push((name.to_string(), converter));
            rest = &rest[close + 1..];
        }
        literal_len += rest.len();
        source.push_str(&regex::escape(rest));
        if !pattern.ends_with('/') {
            source.push('/');
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;
        Ok(Rule {
            pattern: pattern.to_string(),
            weight,
            regex,
            placeholders,
            literal_len,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    /// Matches a normalized path, returning the typed placeholder values.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let mut params = Params::with_capacity(self.placeholders.len());
        for (index, (name, converter)) in self.placeholders.iter().enumerate() {
            let raw = captures.get(index + 1)?.as_str();
            params.insert(name.clone(), converter.convert(raw)?);
        }
        Some(params)
    }

    fn order_key(&self) -> (Reverse<i64>, Reverse<usize>, usize, bool, &str) {
        let has_path = self
            .placeholders
            .iter()
            .any(|(_, c)| *c == Converter::Path);
        (
            Reverse(self.weight),
            Reverse(self.literal_len),
            self.placeholders.len(),
            has_path,
            self.pattern.as_str(),
        )
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Dynamic rules in match order.
///
/// Order: higher weight, then more literal characters, then fewer
/// placeholders, then rules without a `path` converter, then pattern text.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        RuleTable { rules }
    }

    /// Compiles `(pattern, weight)` pairs. Patterns that fail to compile are
    /// returned alongside the table instead of failing the whole build.
    pub fn build<I, S>(routes: I) -> (RuleTable, Vec<CoreError>)
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        let mut rejected = Vec::new();
        for (pattern, weight) in routes {
            match Rule::compile(pattern.as_ref(), weight) {
                Ok(rule) => rules.push(rule),
                Err(err) => rejected.push(err),
            }
        }
        (RuleTable::new(rules), rejected)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the first rule, in match order, that matches `path`.
    pub fn match_path(&self, path: &str) -> Option<RuleMatch> {
        self.rules.iter().find_map(|rule| {
            rule.matches(path).map(|params| RuleMatch {
                pattern: rule.pattern.clone(),
                params,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_patterns() {
        assert!(Rule::is_pattern("/page/<name>/"));
        assert!(!Rule::is_pattern("/page/"));
        assert!(!Rule::is_pattern("/a>b/<c"));
    }

    #[test]
    fn default_converter_captures_one_segment() {
        let rule = Rule::compile("/page/<pagename>/", 0).unwrap();
        let params = rule.matches("/page/pear/").unwrap();
        assert_eq!(params.get("pagename"), Some(&Value::Text("pear".into())));
        assert!(rule.matches("/page/pear/extra/").is_none());
        assert!(rule.matches("/page/").is_none());
    }

    #[test]
    fn int_and_float_converters_are_typed() {
        let rule = Rule::compile("/item/<int:id>/<float:price>/", 0).unwrap();
        let params = rule.matches("/item/12/3.50/").unwrap();
        assert_eq!(params.get("id"), Some(&Value::Integer(12)));
        assert_eq!(params.get("price"), Some(&Value::Float(3.5)));
        assert!(rule.matches("/item/abc/3.50/").is_none());
    }

    #[test]
    fn int_overflow_does_not_match() {
        let rule = Rule::compile("/item/<int:id>/", 0).unwrap();
        assert!(rule.matches("/item/99999999999999999999999/").is_none());
    }

    #[test]
    fn path_converter_spans_segments() {
        let rule = Rule::compile("/docs/<path:rest>/", 0).unwrap();
        let params = rule.matches("/docs/a/b/c/").unwrap();
        assert_eq!(params.get("rest"), Some(&Value::Text("a/b/c".into())));
    }

    #[test]
    fn pattern_without_trailing_slash_matches_normalized_paths() {
        let rule = Rule::compile("/tag/<tag>", 0).unwrap();
        assert!(rule.matches("/tag/rust/").is_some());
    }

    #[test]
    fn literal_text_is_escaped() {
        let rule = Rule::compile("/a.b/<x>/", 0).unwrap();
        assert!(rule.matches("/a.b/1/").is_some());
        assert!(rule.matches("/aXb/1/").is_none());
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(Rule::compile("/a/<unclosed/", 0).is_err());
        assert!(Rule::compile("/a/<bogus:x>/", 0).is_err());
        assert!(Rule::compile("/a/<int:>/", 0).is_err());
        assert!(Rule::compile("/a/<x>/<x>/", 0).is_err());
    }

    #[test]
    fn higher_weight_wins_regardless_of_insertion_order() {
        let routes = [("/<a>/<b>/", 5), ("/<x>/<y>/", 10)];
        let (forward, _) = RuleTable::build(routes);
        let (reverse, _) = RuleTable::build(routes.iter().rev().copied());
        for table in [forward, reverse] {
            let matched = table.match_path("/one/two/").unwrap();
            assert_eq!(matched.pattern, "/<x>/<y>/");
        }
    }

    #[test]
    fn more_literal_text_wins_on_equal_weight() {
        let (table, _) = RuleTable::build([("/<section>/<page>/", 0), ("/blog/<page>/", 0)]);
        assert_eq!(table.match_path("/blog/hello/").unwrap().pattern, "/blog/<page>/");
        assert_eq!(
            table.match_path("/news/hello/").unwrap().pattern,
            "/<section>/<page>/"
        );
    }

    #[test]
    fn weight_beats_specificity() {
        let (table, _) = RuleTable::build([("/blog/<page>/", 0), ("/<section>/<page>/", 1)]);
        assert_eq!(
            table.match_path("/blog/hello/").unwrap().pattern,
            "/<section>/<page>/"
        );
    }

    #[test]
    fn build_reports_bad_patterns_and_keeps_good_ones() {
        let (table, rejected) = RuleTable::build([("/ok/<a>/", 0), ("/bad/<a", 0)]);
        assert_eq!(table.len(), 1);
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn no_match_returns_none() {
        let (table, _) = RuleTable::build([("/page/<int:id>/", 0)]);
        assert!(table.match_path("/page/abc/").is_none());
        assert!(RuleTable::default().match_path("/").is_none());
    }
}
