// src/query/matcher.rs
//! Evaluation of query descriptors against in-memory values. Used by
//! backends that hold the tree in memory.

use std::cmp::Ordering;

use regex::RegexBuilder;

use crate::path::{self, PathKey};
use crate::query::types::{FilterOperand, QueryDescriptor, QueryFilter, QueryOperator, SortKey};
use crate::types::Value;

/// Reads the (possibly nested) property `key` of a child node.
fn property<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    node.get_in(&path::split_to_keys(key))
        .filter(|v| !v.is_null())
}

/// Compares two values of comparable kinds. Mixed kinds are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::PathLink(x), Value::PathLink(y)) => Some(x.path().cmp(y.path())),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b).map_or_else(|| a == b, |o| o == Ordering::Equal)
}

fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::Date(_)) => 3,
        Some(Value::String(_)) | Some(Value::PathLink(_)) => 4,
        Some(Value::Binary(_)) => 5,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 6,
    }
}

/// Total order used for sorting: missing values first, then by kind, then
/// by value within a kind.
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => compare_values(x, y)
            .unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b))),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn like_matches(pattern: &str, text: &str) -> bool {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

fn contains(haystack: Option<&Value>, needle: &FilterOperand) -> bool {
    let Some(Value::Array(items)) = haystack else {
        return false;
    };
    let has = |v: &Value| items.iter().any(|item| values_equal(item, v));
    match needle {
        FilterOperand::Value(v) => has(v),
        FilterOperand::List(vs) => vs.iter().all(has),
        _ => false,
    }
}

/// Whether `node` satisfies `filter`.
///
/// Every negated operator is the exact complement of its positive form, so a
/// child without the filtered key satisfies `!=`, `!between`, `!like`,
/// `!matches`, `!in`, `!has` and `!contains`.
pub fn matches_filter(filter: &QueryFilter, node: &Value) -> bool {
    use QueryOperator::*;
    let actual = property(node, &filter.key);
    let compare = |want: &[Ordering]| match (&filter.compare, actual) {
        (FilterOperand::Value(expected), Some(v)) => {
            compare_values(v, expected).map_or(false, |o| want.contains(&o))
        }
        _ => false,
    };
    let between = || match (&filter.compare, actual) {
        (FilterOperand::List(bounds), Some(v)) if bounds.len() == 2 => {
            let (lo, hi) = match compare_values(&bounds[0], &bounds[1]) {
                Some(Ordering::Greater) => (&bounds[1], &bounds[0]),
                _ => (&bounds[0], &bounds[1]),
            };
            matches!(compare_values(v, lo), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare_values(v, hi), Some(Ordering::Less | Ordering::Equal))
        }
        _ => false,
    };
    let is_in = || match (&filter.compare, actual) {
        (FilterOperand::List(candidates), Some(v)) => candidates.iter().any(|c| values_equal(v, c)),
        _ => false,
    };
    let like = || match (&filter.compare, actual) {
        (FilterOperand::Value(Value::String(p)), Some(Value::String(s))) => like_matches(p, s),
        _ => false,
    };
    let regex = || match (&filter.compare, actual) {
        (FilterOperand::Pattern(re), Some(Value::String(s))) => re.is_match(s),
        _ => false,
    };
    let has = || match (&filter.compare, actual) {
        (FilterOperand::Value(Value::String(k)), Some(v)) => v.get(&PathKey::Name(k.clone())).is_some(),
        _ => false,
    };
    let equal = || match (&filter.compare, actual) {
        (FilterOperand::Value(expected), Some(v)) => values_equal(v, expected),
        (FilterOperand::Value(Value::Null), None) => true,
        _ => false,
    };

    match filter.op {
        LessThan => compare(&[Ordering::Less]),
        LessOrEqual => compare(&[Ordering::Less, Ordering::Equal]),
        GreaterThan => compare(&[Ordering::Greater]),
        GreaterOrEqual => compare(&[Ordering::Greater, Ordering::Equal]),
        Equal => equal(),
        NotEqual => !equal(),
        Exists => actual.is_some(),
        NotExists => actual.is_none(),
        Between => between(),
        NotBetween => !between(),
        Like => like(),
        NotLike => !like(),
        Matches => regex(),
        NotMatches => !regex(),
        In => is_in(),
        NotIn => !is_in(),
        Has => has(),
        NotHas => !has(),
        Contains => contains(actual, &filter.compare),
        NotContains => !contains(actual, &filter.compare),
        Custom => match &filter.compare {
            FilterOperand::Predicate(f) => f(actual.unwrap_or(&Value::Null)),
            _ => false,
        },
    }
}

fn compare_by(order: &[SortKey], a: &Value, b: &Value) -> Ordering {
    for sort in order {
        let ord = sort_order(property(a, &sort.key), property(b, &sort.key));
        let ord = if sort.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Applies a descriptor to the children of `node`, returning the matching
/// children's keys and values in result order.
pub fn evaluate<'a>(query: &QueryDescriptor, node: &'a Value) -> Vec<(PathKey, &'a Value)> {
    let mut matched: Vec<(PathKey, &Value)> = node
        .children()
        .into_iter()
        .filter(|(_, child)| query.filters.iter().all(|f| matches_filter(f, child)))
        .collect();
    if !query.order.is_empty() {
        matched.sort_by(|(_, a), (_, b)| compare_by(&query.order, a, b));
    }
    let take = if query.take == 0 { usize::MAX } else { query.take };
    matched.into_iter().skip(query.skip).take(take).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::FilterOperand;
    use regex::Regex;
    use serde_json::json;

    fn filter(key: &str, op: &str, compare: FilterOperand) -> QueryFilter {
        QueryFilter::new(key, op.parse().unwrap(), compare).unwrap()
    }

    fn node() -> Value {
        Value::from(json!({
            "name": "Ann Smith",
            "age": 34,
            "tags": ["admin", "ops"],
            "address": {"city": "Lisbon"}
        }))
    }

    #[test]
    fn test_comparisons() {
        let n = node();
        assert!(matches_filter(&filter("age", ">", 30.into()), &n));
        assert!(matches_filter(&filter("age", "==", 34.0.into()), &n));
        assert!(!matches_filter(&filter("age", "<", 34.into()), &n));
        assert!(matches_filter(&filter("address/city", "==", "Lisbon".into()), &n));
        assert!(matches_filter(&filter("missing", "!exists", ().into()), &n));
    }

    #[test]
    fn test_set_and_pattern_operators() {
        let n = node();
        let range = vec![Value::from(40), Value::from(30)];
        assert!(matches_filter(&filter("age", "between", range.into()), &n));
        assert!(matches_filter(&filter("age", "in", vec![Value::from(1), Value::from(34)].into()), &n));
        assert!(matches_filter(&filter("name", "like", "ann*".into()), &n));
        assert!(!matches_filter(&filter("name", "like", "a?n".into()), &n));
        let re = Regex::new("Smith$").unwrap();
        assert!(matches_filter(&filter("name", "matches", re.into()), &n));
        assert!(matches_filter(&filter("tags", "contains", "ops".into()), &n));
        assert!(matches_filter(&filter("address", "has", "city".into()), &n));
        let pred = FilterOperand::predicate(|v| v.as_i64() == Some(34));
        assert!(matches_filter(&filter("age", "custom", pred), &n));
    }

    #[test]
    fn test_negated_operators_accept_missing_key() {
        let n = node();
        let negated = [
            filter("score", "!=", Value::from(1).into()),
            filter("score", "!between", vec![Value::from(1), Value::from(9)].into()),
            filter("score", "!like", Value::from("a*").into()),
            filter("score", "!matches", Regex::new("^a").unwrap().into()),
            filter("score", "!in", vec![Value::from(1)].into()),
            filter("score", "!has", Value::from("x").into()),
            filter("score", "!contains", Value::from(1).into()),
        ];
        for f in &negated {
            assert!(matches_filter(f, &n), "{:?} should accept a missing key", f.op);
        }
        assert!(!matches_filter(&filter("age", "!between", vec![Value::from(30), Value::from(40)].into()), &n));
        assert!(matches_filter(&filter("age", "!between", vec![Value::from(40), Value::from(50)].into()), &n));
    }

    #[test]
    fn test_evaluate_sorts_skips_and_takes() {
        let list = Value::from(json!({
            "a": {"k1": 2, "k2": 1},
            "b": {"k1": 1, "k2": 5},
            "c": {"k1": 1, "k2": 9},
            "d": {"k1": 3}
        }));
        let query = QueryDescriptor {
            path: "list".into(),
            filters: vec![],
            order: vec![
                SortKey { key: "k1".into(), ascending: true },
                SortKey { key: "k2".into(), ascending: false },
            ],
            skip: 0,
            take: 3,
        };
        let keys: Vec<String> = evaluate(&query, &list).into_iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);

        let skipped = QueryDescriptor { skip: 3, take: 0, ..query };
        assert_eq!(evaluate(&skipped, &list).len(), 1);
    }
}
