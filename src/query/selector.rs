// Mon Jan 19 2026 - Alex

//! Stream selector rewriting for shard-split queries.
//!
//! A query is prepared once by [`add_sharding_placeholder`], then every cycle
//! rewrites the placeholder through [`interpolate_shards`] for the shard group
//! being requested.

use crate::orchestrator::planner::ShardGroup;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

pub const SHARD_PLACEHOLDER: &str = "__stream_shard_number__";

/// `name op "value"`, or `name op value` for bare values.
static MATCHER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)\s*(=~|!=|!~|=)\s*(?:"((?:[^"\\]|\\.)*)"|([^",}\s]+))"#)
        .expect("matcher regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Eq,
    NotEq,
    Regex,
    NotRegex,
}

impl MatchOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(MatchOp::Eq),
            "!=" => Some(MatchOp::NotEq),
            "=~" => Some(MatchOp::Regex),
            "!~" => Some(MatchOp::NotRegex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatcher {
    pub name: String,
    pub op: MatchOp,
    pub value: String,
}

/// Byte offsets of the `{` and `}` delimiting the first stream selector.
pub fn stream_selector_span(expr: &str) -> Option<(usize, usize)> {
    let open = expr.find('{')?;
    let mut in_quotes = false;
    let mut escaped = false;

    for (offset, ch) in expr[open + 1..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' | '`' => in_quotes = !in_quotes,
            '}' if !in_quotes => return Some((open, open + 1 + offset)),
            _ => {}
        }
    }

    None
}

/// Parses the matchers of the first stream selector.
pub fn stream_selector_matchers(expr: &str) -> Vec<LabelMatcher> {
    let Some((open, close)) = stream_selector_span(expr) else {
        return Vec::new();
    };

    MATCHER_RE
        .captures_iter(&expr[open + 1..close])
        .filter_map(|caps| {
            let op = MatchOp::parse(&caps[2])?;
            let value = caps.get(3).or_else(|| caps.get(4))?;
            Some(LabelMatcher {
                name: caps[1].to_string(),
                op,
                value: value.as_str().to_string(),
            })
        })
        .collect()
}

/// Log queries start with a stream selector; metric queries wrap one in a function.
pub fn is_logs_query(expr: &str) -> bool {
    expr.trim_start().starts_with('{')
}

/// Value of an exact `service_name` matcher in the stream selector.
pub fn service_name(expr: &str) -> Option<String> {
    stream_selector_matchers(expr)
        .into_iter()
        .find(|m| m.name == "service_name" && m.op == MatchOp::Eq)
        .map(|m| m.value)
}

fn placeholder_matcher(label: &str) -> String {
    format!("{}=~\"{}\"", label, SHARD_PLACEHOLDER)
}

pub fn add_sharding_placeholder(expr: &str, label: &str) -> String {
    if stream_selector_matchers(expr).iter().any(|m| m.name == label) {
        return expr.to_string();
    }
    let Some((open, close)) = stream_selector_span(expr) else {
        return expr.to_string();
    };

    let matcher = placeholder_matcher(label);
    let inner = expr[open + 1..close].trim();
    let rewritten = if inner.is_empty() {
        format!("{{{}}}", matcher)
    } else {
        format!("{{{}, {}}}", inner, matcher)
    };

    format!("{}{}{}", &expr[..open], rewritten, &expr[close + 1..])
}

/// Rewrites the placeholder for one cycle. `None` is the unsharded fallback
/// and strips the placeholder entirely.
pub fn interpolate_shards(expr: &str, label: &str, group: Option<&ShardGroup>, sentinel: i64) -> String {
    let matcher = placeholder_matcher(label);

    match group {
        None => {
            let with_comma = format!(", {}", matcher);
            if expr.contains(&with_comma) {
                expr.replacen(&with_comma, "", 1)
            } else {
                expr.replacen(&matcher, "", 1)
            }
        }
        Some(group) if group.is_catch_all(sentinel) => {
            expr.replacen(&matcher, &format!("{}=\"\"", label), 1)
        }
        Some(group) => {
            let ids = group.shards().iter().filter(|&&id| id != sentinel).join("|");
            expr.replacen(&matcher, &format!("{}=~\"{}\"", label, ids), 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: &str = "__stream_shard__";

    #[test]
    fn test_add_placeholder() {
        assert_eq!(
            add_sharding_placeholder(r#"{service_name="api"} |= "error""#, LABEL),
            r#"{service_name="api", __stream_shard__=~"__stream_shard_number__"} |= "error""#
        );
        assert_eq!(
            add_sharding_placeholder("{}", LABEL),
            r#"{__stream_shard__=~"__stream_shard_number__"}"#
        );
    }

    #[test]
    fn test_add_placeholder_is_noop_when_present() {
        let expr = r#"{app="x", __stream_shard__="3"}"#;
        assert_eq!(add_sharding_placeholder(expr, LABEL), expr);
        assert_eq!(add_sharding_placeholder("vector(1)", LABEL), "vector(1)");
    }

    #[test]
    fn test_add_placeholder_ignores_label_in_line_filter() {
        assert_eq!(
            add_sharding_placeholder(r#"{app="x"} |= "__stream_shard__""#, LABEL),
            r#"{app="x", __stream_shard__=~"__stream_shard_number__"} |= "__stream_shard__""#
        );
    }

    #[test]
    fn test_add_placeholder_inside_metric_query() {
        assert_eq!(
            add_sharding_placeholder(r#"sum(count_over_time({app="x"}[5m]))"#, LABEL),
            r#"sum(count_over_time({app="x", __stream_shard__=~"__stream_shard_number__"}[5m]))"#
        );
    }

    #[test]
    fn test_selector_span_skips_quoted_braces() {
        let expr = r#"{app="a}b"} |= "x""#;
        assert_eq!(stream_selector_span(expr), Some((0, 10)));
    }

    #[test]
    fn test_interpolate_group() {
        let expr = add_sharding_placeholder(r#"{app="x"}"#, LABEL);
        let group = ShardGroup::new(vec![5, 4]);
        assert_eq!(
            interpolate_shards(&expr, LABEL, Some(&group), -1),
            r#"{app="x", __stream_shard__=~"5|4"}"#
        );
    }

    #[test]
    fn test_interpolate_catch_all() {
        let expr = add_sharding_placeholder(r#"{app="x"}"#, LABEL);
        let group = ShardGroup::new(vec![-1]);
        assert_eq!(
            interpolate_shards(&expr, LABEL, Some(&group), -1),
            r#"{app="x", __stream_shard__=""}"#
        );
    }

    #[test]
    fn test_interpolate_unsharded_strips_placeholder() {
        let expr = add_sharding_placeholder(r#"{app="x"} |= "y""#, LABEL);
        assert_eq!(interpolate_shards(&expr, LABEL, None, -1), r#"{app="x"} |= "y""#);

        let bare = add_sharding_placeholder("{}", LABEL);
        assert_eq!(interpolate_shards(&bare, LABEL, None, -1), "{}");
    }

    #[test]
    fn test_query_kind() {
        assert!(is_logs_query(r#"  {app="x"} | json"#));
        assert!(!is_logs_query(r#"rate({app="x"}[1m])"#));
    }

    #[test]
    fn test_service_name() {
        assert_eq!(service_name(r#"{service_name="tempo-distributor"}"#), Some("tempo-distributor".to_string()));
        assert_eq!(service_name(r#"{service_name=api, env="prod"}"#), Some("api".to_string()));
        assert_eq!(service_name(r#"{app="x"}"#), None);
    }

    #[test]
    fn test_service_name_needs_exact_matcher() {
        assert_eq!(service_name(r#"{service_name=~"api.*"}"#), None);
        assert_eq!(service_name(r#"{service_name!="api"}"#), None);
        assert_eq!(service_name(r#"{k8s_service_name="billing", app="x"}"#), None);
        assert_eq!(
            service_name(r#"{k8s_service_name="billing", service_name="api"}"#),
            Some("api".to_string())
        );
        assert_eq!(service_name(r#"{app="x"} |= "service_name=web""#), None);
    }

    #[test]
    fn test_matchers() {
        let matchers = stream_selector_matchers(r#"{app="x", env!="dev", pod=~"a.*"} |= "z""#);
        assert_eq!(matchers.len(), 3);
        assert_eq!(matchers[0], LabelMatcher { name: "app".into(), op: MatchOp::Eq, value: "x".into() });
        assert_eq!(matchers[1].op, MatchOp::NotEq);
        assert_eq!(matchers[2].op, MatchOp::Regex);
    }
}
