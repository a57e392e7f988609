// src/query/types.rs
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use strum::{Display, EnumString};

use crate::error::{ArborError, Result};
use crate::types::Value;

/// Filter operators. Parse from and display as their query-string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum QueryOperator {
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessOrEqual,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterOrEqual,
    #[strum(serialize = "exists")]
    Exists,
    #[strum(serialize = "!exists")]
    NotExists,
    #[strum(serialize = "between")]
    Between,
    #[strum(serialize = "!between")]
    NotBetween,
    #[strum(serialize = "like")]
    Like,
    #[strum(serialize = "!like")]
    NotLike,
    #[strum(serialize = "matches")]
    Matches,
    #[strum(serialize = "!matches")]
    NotMatches,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "!in")]
    NotIn,
    #[strum(serialize = "has")]
    Has,
    #[strum(serialize = "!has")]
    NotHas,
    #[strum(serialize = "contains")]
    Contains,
    #[strum(serialize = "!contains")]
    NotContains,
    #[strum(serialize = "custom")]
    Custom,
}

/// Anything a filter operator can be given as: the enum itself or its
/// string form.
pub trait IntoOperator {
    fn into_operator(self) -> Result<QueryOperator>;
}

impl IntoOperator for QueryOperator {
    fn into_operator(self) -> Result<QueryOperator> {
        Ok(self)
    }
}

impl IntoOperator for &str {
    fn into_operator(self) -> Result<QueryOperator> {
        self.parse()
            .map_err(|_| ArborError::validation(format!("unknown query operator '{}'", self)))
    }
}

/// Predicate used by the `custom` operator. Receives the value at the
/// filtered key (null when absent).
pub type FilterPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Right-hand side of a filter.
#[derive(Clone)]
pub enum FilterOperand {
    None,
    Value(Value),
    List(Vec<Value>),
    Pattern(Regex),
    Predicate(FilterPredicate),
}

impl FilterOperand {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        FilterOperand::Predicate(Arc::new(f))
    }
}

impl fmt::Debug for FilterOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperand::None => write!(f, "None"),
            FilterOperand::Value(v) => f.debug_tuple("Value").field(v).finish(),
            FilterOperand::List(vs) => f.debug_tuple("List").field(vs).finish(),
            FilterOperand::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            FilterOperand::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

impl From<()> for FilterOperand {
    fn from(_: ()) -> Self {
        FilterOperand::None
    }
}

impl From<Value> for FilterOperand {
    fn from(v: Value) -> Self {
        FilterOperand::Value(v)
    }
}

impl From<Vec<Value>> for FilterOperand {
    fn from(vs: Vec<Value>) -> Self {
        FilterOperand::List(vs)
    }
}

impl From<Regex> for FilterOperand {
    fn from(re: Regex) -> Self {
        FilterOperand::Pattern(re)
    }
}

impl From<&str> for FilterOperand {
    fn from(s: &str) -> Self {
        FilterOperand::Value(Value::from(s))
    }
}

impl From<String> for FilterOperand {
    fn from(s: String) -> Self {
        FilterOperand::Value(Value::from(s))
    }
}

impl From<i64> for FilterOperand {
    fn from(n: i64) -> Self {
        FilterOperand::Value(Value::from(n))
    }
}

impl From<i32> for FilterOperand {
    fn from(n: i32) -> Self {
        FilterOperand::Value(Value::from(n))
    }
}

impl From<f64> for FilterOperand {
    fn from(n: f64) -> Self {
        FilterOperand::Value(Value::from(n))
    }
}

impl From<bool> for FilterOperand {
    fn from(b: bool) -> Self {
        FilterOperand::Value(Value::from(b))
    }
}

/// One filter criterion.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    pub key: String,
    pub op: QueryOperator,
    pub compare: FilterOperand,
}

impl QueryFilter {
    /// Builds a filter, checking that the operand suits the operator.
    pub fn new(key: &str, op: QueryOperator, compare: FilterOperand) -> Result<Self> {
        if crate::path::normalize(key).is_empty() {
            return Err(ArborError::validation("filter key must not be empty"));
        }
        use QueryOperator::*;
        let valid = match (op, &compare) {
            (Exists | NotExists, _) => true,
            (In | NotIn, FilterOperand::List(vs)) => !vs.is_empty(),
            (Between | NotBetween, FilterOperand::List(vs)) => vs.len() == 2,
            (Matches | NotMatches, FilterOperand::Pattern(_)) => true,
            (Custom, FilterOperand::Predicate(_)) => true,
            (Like | NotLike | Has | NotHas, FilterOperand::Value(Value::String(_))) => true,
            (Contains | NotContains, FilterOperand::Value(_)) => true,
            (Contains | NotContains, FilterOperand::List(vs)) => !vs.is_empty(),
            (
                LessThan | LessOrEqual | Equal | NotEqual | GreaterThan | GreaterOrEqual,
                FilterOperand::Value(_),
            ) => true,
            _ => false,
        };
        if !valid {
            return Err(ArborError::validation(format!(
                "invalid operand {:?} for operator '{}' on key '{}'",
                compare, op, key
            )));
        }
        Ok(Self {
            key: key.to_string(),
            op,
            compare,
        })
    }
}

/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub key: String,
    pub ascending: bool,
}

/// Everything a backend needs to execute a query.
#[derive(Debug, Clone, Default)]
pub struct QueryDescriptor {
    /// Path whose children are queried
    pub path: String,
    pub filters: Vec<QueryFilter>,
    /// First entry is the primary sort key
    pub order: Vec<SortKey>,
    pub skip: usize,
    /// 0 = unbounded
    pub take: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn op(s: &str) -> QueryOperator {
        QueryOperator::from_str(s).unwrap()
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!(op("<="), QueryOperator::LessOrEqual);
        assert_eq!(op("!in"), QueryOperator::NotIn);
        assert_eq!(QueryOperator::NotBetween.to_string(), "!between");
        assert!("~=".into_operator().is_err());
        assert_eq!("has".into_operator().unwrap(), QueryOperator::Has);
    }

    #[test]
    fn test_operand_rules() {
        assert!(QueryFilter::new("x", op("in"), Vec::<Value>::new().into()).is_err());
        assert!(QueryFilter::new("x", op("in"), vec![Value::from(1)].into()).is_ok());
        assert!(QueryFilter::new("x", op("between"), vec![Value::from(1)].into()).is_err());
        assert!(
            QueryFilter::new("x", op("between"), vec![Value::from(1), Value::from(5)].into())
                .is_ok()
        );
        assert!(QueryFilter::new("x", op("matches"), "a".into()).is_err());
        assert!(QueryFilter::new("x", op("matches"), Regex::new("^a").unwrap().into()).is_ok());
        assert!(QueryFilter::new("x", op("custom"), 1.into()).is_err());
        assert!(QueryFilter::new("x", op("custom"), FilterOperand::predicate(|_| true)).is_ok());
        assert!(QueryFilter::new("x", op("exists"), ().into()).is_ok());
        assert!(QueryFilter::new("", op("=="), 1.into()).is_err());
        assert!(QueryFilter::new("x", op("<"), ().into()).is_err());
    }
}
