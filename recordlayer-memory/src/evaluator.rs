//! Filter and sort evaluation over stored documents.
//!
//! Semantics follow the document-store conventions the MongoDB gateway relies on, so both
//! gateways answer the same query the same way:
//!
//! - Field names may be dotted paths into embedded documents.
//! - A missing field compares equal to `null` and matches `Ne`, `NotContains` and `NoneOf`.
//! - Equality against an array field matches when any element is equal.
//! - Sorting uses a total order across types: null, numbers, decimals, strings, documents,
//!   arrays, binary (UUIDs), object ids, booleans, datetimes, timestamps, then everything
//!   else. Values without a comparable form only match by exact BSON equality.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime};

use recordlayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Borrowed, comparable view of a BSON value.
///
/// 32 and 64 bit integers share `Integer` and compare exactly; they meet doubles as `f64`.
#[derive(Debug)]
pub(crate) enum FieldValue<'a> {
    Null,
    Integer(i64),
    Double(f64),
    Decimal([u8; 16]),
    String(&'a str),
    Map(HashMap<&'a str, FieldValue<'a>>),
    Array(Vec<FieldValue<'a>>),
    Binary(&'a [u8]),
    ObjectId([u8; 12]),
    Bool(bool),
    DateTime(DateTime),
    Timestamp(u32, u32),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for FieldValue<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => FieldValue::Null,
            Bson::Int32(value) => FieldValue::Integer(i64::from(*value)),
            Bson::Int64(value) => FieldValue::Integer(*value),
            Bson::Double(value) => FieldValue::Double(*value),
            Bson::Decimal128(value) => FieldValue::Decimal(value.bytes()),
            Bson::String(value) => FieldValue::String(value),
            Bson::Boolean(value) => FieldValue::Bool(*value),
            Bson::DateTime(value) => FieldValue::DateTime(*value),
            Bson::Timestamp(ts) => FieldValue::Timestamp(ts.time, ts.increment),
            Bson::ObjectId(oid) => FieldValue::ObjectId(oid.bytes()),
            Bson::Binary(binary) => FieldValue::Binary(&binary.bytes),
            Bson::Array(items) => FieldValue::Array(items.iter().map(FieldValue::from).collect()),
            Bson::Document(document) => FieldValue::Map(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), FieldValue::from(value)))
                    .collect(),
            ),
            other => FieldValue::Other(other),
        }
    }
}

impl PartialEq for FieldValue<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Decimal(a), FieldValue::Decimal(b)) => a == b,
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Map(a), FieldValue::Map(b)) => a == b,
            (FieldValue::Array(a), FieldValue::Array(b)) => a == b,
            (FieldValue::Binary(a), FieldValue::Binary(b)) => a == b,
            (FieldValue::ObjectId(a), FieldValue::ObjectId(b)) => a == b,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a == b,
            (FieldValue::Timestamp(a, x), FieldValue::Timestamp(b, y)) => (a, x) == (b, y),
            (FieldValue::Other(a), FieldValue::Other(b)) => a == b,
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

/// Range comparisons only order values of the same kind.
impl PartialOrd for FieldValue<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::String(a), FieldValue::String(b)) => a.partial_cmp(b),
            (FieldValue::Binary(a), FieldValue::Binary(b)) => a.partial_cmp(b),
            (FieldValue::ObjectId(a), FieldValue::ObjectId(b)) => a.partial_cmp(b),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.partial_cmp(b),
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a.partial_cmp(b),
            (FieldValue::Timestamp(a, x), FieldValue::Timestamp(b, y)) => (a, x).partial_cmp(&(b, y)),
            (left, right) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        }
    }
}

impl<'a> FieldValue<'a> {
    /// Resolves a possibly dotted path; a missing field reads as `Null`.
    pub(crate) fn lookup(document: &'a Document, path: &str) -> Self {
        lookup(document, path)
            .map(FieldValue::from)
            .unwrap_or(FieldValue::Null)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(value) => Some(*value as f64),
            FieldValue::Double(value) => Some(*value),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Integer(_) | FieldValue::Double(_) => 1,
            FieldValue::Decimal(_) => 2,
            FieldValue::String(_) => 3,
            FieldValue::Map(_) => 4,
            FieldValue::Array(_) => 5,
            FieldValue::Binary(_) => 6,
            FieldValue::ObjectId(_) => 7,
            FieldValue::Bool(_) => 8,
            FieldValue::DateTime(_) => 9,
            FieldValue::Timestamp(..) => 10,
            FieldValue::Other(_) => 11,
        }
    }

    /// Total order used for sorting mixed-type values.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Integer(_) | FieldValue::Double(_), FieldValue::Integer(_) | FieldValue::Double(_)) => {
                let left = self.as_f64().unwrap_or_default();
                left.total_cmp(&other.as_f64().unwrap_or_default())
            }
            (FieldValue::Array(a), FieldValue::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(left, right)| left.sort_cmp(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self
                .partial_cmp(other)
                .unwrap_or_else(|| self.rank().cmp(&other.rank())),
        }
    }

    /// Equality with array fan-out.
    fn matches(&self, expected: &Self) -> bool {
        match self {
            FieldValue::Array(items) if !matches!(expected, FieldValue::Array(_)) => {
                items.iter().any(|item| item == expected)
            }
            _ => self == expected,
        }
    }

    fn contains(&self, needle: &Self) -> bool {
        match (self, needle) {
            (FieldValue::Array(items), _) => items.iter().any(|item| item == needle),
            (FieldValue::String(haystack), FieldValue::String(needle)) => haystack.contains(needle),
            _ => false,
        }
    }

    fn any_of(&self, candidates: &Self) -> bool {
        match candidates {
            FieldValue::Array(values) => values.iter().any(|value| self.matches(value)),
            single => self.matches(single),
        }
    }
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Evaluates filter expressions against a single document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }
}

/// Returns whether `document` satisfies `filter`; `None` matches everything.
pub(crate) fn matches_filter(document: &Document, filter: Option<&Expr>) -> DocumentStoreResult<bool> {
    match filter {
        Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
        None => Ok(true),
    }
}

/// Compares two documents by a list of sort keys, first key first.
pub(crate) fn compare_documents(left: &Document, right: &Document, sort: &[Sort]) -> Ordering {
    sort.iter()
        .map(|key| {
            let ordering = FieldValue::lookup(left, &key.field)
                .sort_cmp(&FieldValue::lookup(right, &key.field));

            match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let actual = FieldValue::lookup(self.document, field);
        let expected = FieldValue::from(value);
        let ordering = actual.partial_cmp(&expected);

        Ok(match op {
            FieldOp::Eq => actual.matches(&expected),
            FieldOp::Ne => !actual.matches(&expected),
            FieldOp::Gt => ordering == Some(Ordering::Greater),
            FieldOp::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            FieldOp::Lt => ordering == Some(Ordering::Less),
            FieldOp::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            FieldOp::Contains => actual.contains(&expected),
            FieldOp::NotContains => !actual.contains(&expected),
            FieldOp::StartsWith => matches!(
                (&actual, &expected),
                (FieldValue::String(left), FieldValue::String(right)) if left.starts_with(right)
            ),
            FieldOp::EndsWith => matches!(
                (&actual, &expected),
                (FieldValue::String(left), FieldValue::String(right)) if left.ends_with(right)
            ),
            FieldOp::AnyOf => actual.any_of(&expected),
            FieldOp::NoneOf => !actual.any_of(&expected),
        })
    }
}
