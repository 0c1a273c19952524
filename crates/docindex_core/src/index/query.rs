//! Range query builder.
//!
//! Turns a predicate on one field into a key range over the postings of
//! that field's scope, then scans it page by page.
//!
//! With `P(v)` the unterminated value prefix of `v`:
//!
//! | op   | lower bound          | upper bound          |
//! |------|----------------------|----------------------|
//! | `eq` | `P(v) 00`            | `P(v) 00 FF`         |
//! | `ge` | `P(v) 00`            | open                 |
//! | `gt` | `P(v) 00 FF`, excl.  | open                 |
//! | `fm` | `P(v)`               | `P(v) FF`            |
//! | `le` | open                 | `P(v) 00 FF`         |
//! | `lt` | open                 | `P(v) 00`, excl.     |
//!
//! An open side is closed by the range condition if it has one for that
//! side, otherwise by the scope prefix.

use crate::cursor;
use crate::error::{CoreError, CoreResult};
use crate::index::codec::{scope_prefix, value_prefix, value_prefix_terminated, ShardRef, FORWARD_MATCH};
use crate::namespace::NamespaceContext;
use crate::registry::{scope_name, validate_scope_parts};
use crate::types::Code;
use docindex_kv::{KvEngine, ScanRange};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal.
    Eq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Value starts with the operand.
    ForwardMatch,
}

impl Operator {
    /// Returns the operator's keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::ForwardMatch => "fm",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Operator::Eq),
            "gt" => Ok(Operator::Gt),
            "ge" => Ok(Operator::Ge),
            "lt" => Ok(Operator::Lt),
            "le" => Ok(Operator::Le),
            "fm" => Ok(Operator::ForwardMatch),
            other => Err(CoreError::validation(format!("unknown operator {other:?}"))),
        }
    }
}

/// A predicate on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Field name.
    pub field: String,
    /// Operator.
    pub op: Operator,
    /// Operand.
    pub value: String,
}

impl Condition {
    /// Creates a condition.
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

/// Parses `"field op value"`. The value is everything after the operator
/// and may contain spaces.
impl FromStr for Condition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoreError::validation(format!("malformed condition {s:?}"));
        let (field, rest) = s.trim_start().split_once(char::is_whitespace).ok_or_else(malformed)?;
        let (op, value) = rest
            .trim_start()
            .split_once(char::is_whitespace)
            .ok_or_else(malformed)?;
        let value = value.trim_start();
        if value.is_empty() {
            return Err(malformed());
        }
        Ok(Condition::new(field, op.parse()?, value))
    }
}

/// A key range over one scope's postings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Lower bound.
    pub start: Vec<u8>,
    /// Upper bound.
    pub end: Vec<u8>,
    /// Whether `start` is excluded.
    pub exclude_start: bool,
    /// Whether `end` is excluded.
    pub exclude_end: bool,
    /// Scan resumes strictly after this key.
    pub cursor: Option<Vec<u8>>,
}

impl KeyRange {
    /// Converts the range to engine scan bounds.
    #[must_use]
    pub fn to_scan_range(&self) -> ScanRange {
        ScanRange {
            start: Some(self.start.clone()),
            end: Some(self.end.clone()),
            exclude_start: self.exclude_start,
            exclude_end: self.exclude_end,
            cursor: self.cursor.clone(),
        }
    }

    /// Returns true if `key` lies inside the bounds (cursor ignored).
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.to_scan_range().contains(key)
    }
}

type Bound = (Vec<u8>, bool);

fn with_forward_match(mut key: Vec<u8>) -> Vec<u8> {
    key.push(FORWARD_MATCH);
    key
}

fn lower_bound(scope: Code, shard: Option<ShardRef<'_>>, op: Operator, value: &str) -> Option<Bound> {
    match op {
        Operator::Eq | Operator::Ge => Some((value_prefix_terminated(scope, shard, value), false)),
        Operator::Gt => Some((
            with_forward_match(value_prefix_terminated(scope, shard, value)),
            true,
        )),
        Operator::ForwardMatch => Some((value_prefix(scope, shard, value), false)),
        Operator::Lt | Operator::Le => None,
    }
}

fn upper_bound(scope: Code, shard: Option<ShardRef<'_>>, op: Operator, value: &str) -> Option<Bound> {
    match op {
        Operator::Eq | Operator::Le => Some((
            with_forward_match(value_prefix_terminated(scope, shard, value)),
            false,
        )),
        Operator::Lt => Some((value_prefix_terminated(scope, shard, value), true)),
        Operator::ForwardMatch => Some((with_forward_match(value_prefix(scope, shard, value)), false)),
        Operator::Gt | Operator::Ge => None,
    }
}

/// Computes the key range of a predicate against known codes.
///
/// # Errors
///
/// Returns a validation error if the range condition names another field
/// or bounds a side the main condition already bounds.
pub fn key_range(
    scope: Code,
    shard: Option<ShardRef<'_>>,
    condition: &Condition,
    range_condition: Option<&Condition>,
) -> CoreResult<KeyRange> {
    let mut lower = lower_bound(scope, shard, condition.op, &condition.value);
    let mut upper = upper_bound(scope, shard, condition.op, &condition.value);

    if let Some(range) = range_condition {
        if range.field != condition.field {
            return Err(CoreError::validation(format!(
                "range condition on {:?} does not match field {:?}",
                range.field, condition.field
            )));
        }
        let extra_lower = lower_bound(scope, shard, range.op, &range.value);
        let extra_upper = upper_bound(scope, shard, range.op, &range.value);
        if (extra_lower.is_some() && lower.is_some()) || (extra_upper.is_some() && upper.is_some()) {
            return Err(CoreError::validation(format!(
                "conditions `{condition}` and `{range}` bound the same side"
            )));
        }
        lower = lower.or(extra_lower);
        upper = upper.or(extra_upper);
    }

    let prefix = scope_prefix(scope, shard);
    let (start, exclude_start) = lower.unwrap_or_else(|| (prefix.clone(), false));
    let (end, exclude_end) = upper.unwrap_or_else(|| (with_forward_match(prefix), false));
    Ok(KeyRange {
        start,
        end,
        exclude_start,
        exclude_end,
        cursor: None,
    })
}

/// A query against one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Parent path of the queried field.
    pub parent_scope: String,
    /// Main condition.
    pub condition: Condition,
    /// Optional second bound on the same field.
    pub range_condition: Option<Condition>,
    /// Shard-key name.
    pub shard_key: Option<String>,
    /// Shard-key value; required with `shard_key`.
    pub shard_value: Option<String>,
    /// Continuation token of a previous page.
    pub cursor: Option<String>,
    /// Page size; the namespace default when absent.
    pub limit: Option<usize>,
}

impl Query {
    /// Creates a query for a field under `parent_scope`.
    pub fn new(parent_scope: impl Into<String>, condition: Condition) -> Self {
        Self {
            parent_scope: parent_scope.into(),
            condition,
            range_condition: None,
            shard_key: None,
            shard_value: None,
            cursor: None,
            limit: None,
        }
    }

    /// Sets the range condition.
    #[must_use]
    pub fn range(mut self, condition: Condition) -> Self {
        self.range_condition = Some(condition);
        self
    }

    /// Restricts the query to one shard.
    #[must_use]
    pub fn shard(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.shard_key = Some(key.into());
        self.shard_value = Some(value.into());
        self
    }

    /// Resumes after a previous page.
    #[must_use]
    pub fn cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryPage {
    /// Matching document ids in key order.
    pub ids: Vec<String>,
    /// Continuation token, set when the page was cut by the limit.
    pub next_cursor: Option<String>,
}

/// Resolves codes and builds the key range of a query.
///
/// Unknown scope and shard names are registered, so a query on a field that
/// was never written yields a valid range that matches nothing.
pub fn build_range<E: KvEngine>(
    engine: &E,
    ctx: &NamespaceContext,
    query: &Query,
) -> CoreResult<KeyRange> {
    if query.condition.field.trim().is_empty() {
        return Err(CoreError::validation("condition field is blank"));
    }
    validate_scope_parts(&query.parent_scope, &query.condition.field)?;
    let shard_value = match (&query.shard_key, &query.shard_value) {
        (None, None) => None,
        (Some(key), Some(value)) => {
            if key.trim().is_empty() {
                return Err(CoreError::validation("shard-key name is blank"));
            }
            if value.trim().is_empty() {
                return Err(CoreError::validation(format!(
                    "shard key {key:?} needs a non-blank value"
                )));
            }
            Some((key.as_str(), value.as_str()))
        }
        (Some(key), None) => {
            return Err(CoreError::validation(format!(
                "shard key {key:?} needs a non-blank value"
            )))
        }
        (None, Some(_)) => return Err(CoreError::validation("shard value given without a shard key")),
    };
    let cursor = cursor::decode_opt(query.cursor.as_deref())?;

    let scope = ctx
        .scopes()
        .resolve_or_create(engine, &scope_name(&query.parent_scope, &query.condition.field))?;
    let shard = match shard_value {
        Some((key, value)) => Some(ShardRef {
            code: ctx.shards().resolve_or_create(engine, key)?,
            value,
        }),
        None => None,
    };

    let mut range = key_range(scope, shard, &query.condition, query.range_condition.as_ref())?;
    range.cursor = cursor;
    Ok(range)
}

/// Runs a query and returns one page of document ids.
pub fn run_query<E: KvEngine>(
    engine: &E,
    ctx: &NamespaceContext,
    query: &Query,
) -> CoreResult<QueryPage> {
    let range = build_range(engine, ctx, query)?.to_scan_range();
    let limit = ctx.config().page_limit(query.limit);
    let table = ctx.tables().index.as_str();
    let page = ctx
        .retry()
        .run("query_keys", |_| Ok(engine.scan(table, &range, limit)?))?;

    let ids = page
        .items
        .into_iter()
        .map(|(_, value)| {
            String::from_utf8(value)
                .map_err(|_| CoreError::invalid_format("posting document id is not UTF-8"))
        })
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(QueryPage {
        ids,
        next_cursor: page.next_cursor.as_deref().map(cursor::encode),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::codec::encode_posting;

    const SCOPE: Code = Code::new(3);

    fn posting(value: &str) -> Vec<u8> {
        encode_posting(SCOPE, "d1", value, None).unwrap()
    }

    fn range(cond: &str) -> KeyRange {
        key_range(SCOPE, None, &cond.parse().unwrap(), None).unwrap()
    }

    #[test]
    fn operators_parse() {
        assert_eq!("fm".parse::<Operator>().unwrap(), Operator::ForwardMatch);
        assert!("like".parse::<Operator>().unwrap_err().is_validation());
    }

    #[test]
    fn conditions_parse() {
        let c: Condition = "name eq Ada Lovelace".parse().unwrap();
        assert_eq!(c, Condition::new("name", Operator::Eq, "Ada Lovelace"));
        assert!("name eq".parse::<Condition>().is_err());
        assert!("name".parse::<Condition>().is_err());
        assert!("name ~ x".parse::<Condition>().is_err());
    }

    #[test]
    fn ge_includes_equal_and_greater() {
        let r = range("f ge m");
        assert!(r.contains(&posting("m")));
        assert!(r.contains(&posting("z")));
        assert!(!r.contains(&posting("a")));
    }

    #[test]
    fn lt_excludes_equal() {
        let r = range("f lt m");
        assert!(!r.contains(&posting("m")));
        assert!(r.contains(&posting("a")));
        assert!(!r.contains(&posting("ma")));
    }

    #[test]
    fn gt_excludes_equal() {
        let r = range("f gt m");
        assert!(!r.contains(&posting("m")));
        assert!(r.contains(&posting("m\u{0}")));
        assert!(r.contains(&posting("ma")));
        assert!(!r.contains(&posting("l")));
    }

    #[test]
    fn eq_and_le_match_exact_value() {
        let eq = range("f eq m");
        assert!(eq.contains(&posting("m")));
        assert!(!eq.contains(&posting("ma")));
        assert!(!eq.contains(&posting("l")));

        let le = range("f le m");
        assert!(le.contains(&posting("m")));
        assert!(le.contains(&posting("a")));
        assert!(!le.contains(&posting("ma")));
    }

    #[test]
    fn forward_match_is_prefix() {
        let r = range("f fm ab");
        assert!(r.contains(&posting("ab")));
        assert!(r.contains(&posting("abz")));
        assert!(!r.contains(&posting("ac")));
        assert!(!r.contains(&posting("aa")));
    }

    #[test]
    fn open_side_stays_in_scope() {
        let r = range("f ge m");
        let other_scope = encode_posting(Code::new(4), "d1", "a", None).unwrap();
        assert!(!r.contains(&other_scope));
    }

    #[test]
    fn range_condition_closes_other_side() {
        let main: Condition = "f ge c".parse().unwrap();
        let upper: Condition = "f lt m".parse().unwrap();
        let r = key_range(SCOPE, None, &main, Some(&upper)).unwrap();
        assert!(r.contains(&posting("c")));
        assert!(r.contains(&posting("l")));
        assert!(!r.contains(&posting("m")));
        assert!(!r.contains(&posting("b")));
    }

    #[test]
    fn range_condition_on_same_side_rejected() {
        let main: Condition = "f ge c".parse().unwrap();
        let also_lower: Condition = "f gt d".parse().unwrap();
        assert!(key_range(SCOPE, None, &main, Some(&also_lower)).unwrap_err().is_validation());

        let other_field: Condition = "g lt m".parse().unwrap();
        assert!(key_range(SCOPE, None, &main, Some(&other_field)).is_err());
    }

    #[test]
    fn shard_ranges_exclude_other_shards() {
        let eu = ShardRef { code: Code::new(1), value: "eu" };
        let us = ShardRef { code: Code::new(1), value: "us" };
        let r = key_range(SCOPE, Some(eu), &"f ge a".parse().unwrap(), None).unwrap();
        assert!(r.contains(&encode_posting(SCOPE, "d1", "b", Some(eu)).unwrap()));
        assert!(!r.contains(&encode_posting(SCOPE, "d1", "b", Some(us)).unwrap()));
        assert!(!r.contains(&posting("b")));
    }

    #[test]
    fn separator_in_query_scope_rejected() {
        let engine = docindex_kv::InMemoryEngine::new();
        let ctx = NamespaceContext::new("t", crate::config::IndexConfig::new()).unwrap();

        let in_field = Query::new("a", Condition::new("b\u{1F}c", Operator::Eq, "v"));
        assert!(build_range(&engine, &ctx, &in_field).unwrap_err().is_validation());
        let in_parent = Query::new("a\u{1F}b", Condition::new("c", Operator::Eq, "v"));
        assert!(build_range(&engine, &ctx, &in_parent).unwrap_err().is_validation());
        assert_eq!(engine.version(), 0);
    }
}
