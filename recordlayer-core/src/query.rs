//! Filter expressions and find options for record queries.
//!
//! A [`Query`] couples an optional filter [`Expr`] with the cursor options the gateway
//! applies before execution: sort, offset (skip), limit and a query timeout.
//!
//! ```ignore
//! use recordlayer::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("email", "a@b.com").and(Filter::exists("password")))
//!     .sort("email", SortDirection::Asc)
//!     .offset(10)
//!     .limit(5)
//!     .build();
//! ```
//!
//! Gateways translate the expression tree by implementing [`QueryVisitor`].

use bson::{Bson, Uuid};
use std::time::Duration;

use crate::{error::DocumentStoreError, schema::IDENTITY_KEY};

/// Sort direction for query results and index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// The numeric form used by document stores (`1` / `-1`).
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// One sort key of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// String or array contains value.
    Contains,
    /// String or array does not contain value.
    NotContains,
    StartsWith,
    EndsWith,
    /// Field equals (or array field holds) any of the values.
    AnyOf,
    /// Field equals (or array field holds) none of the values.
    NoneOf,
}

/// A filter expression tree.
///
/// Leaves compare a single field; `And`, `Or` and `Not` combine them.
#[derive(Debug, Clone)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// Field presence (`true`) or absence (`false`).
    Exists(String, bool),
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    /// Conjunction with `other`. Chained calls extend one flat `And`.
    pub fn and(self, other: Expr) -> Self {
        if let Expr::And(mut terms) = self {
            terms.push(other);
            return Expr::And(terms);
        }
        Expr::And(vec![self, other])
    }

    /// Disjunction with `other`. Chained calls extend one flat `Or`.
    pub fn or(self, other: Expr) -> Self {
        if let Expr::Or(mut terms) = self {
            terms.push(other);
            return Expr::Or(terms);
        }
        Expr::Or(vec![self, other])
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

macro_rules! field_filters {
    ($($(#[$doc:meta])* $name:ident => $op:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
                Expr::Field {
                    field: field.into(),
                    op: FieldOp::$op,
                    value: value.into(),
                }
            }
        )*
    };
}

/// Constructors for common filter expressions.
pub struct Filter;

impl Filter {
    field_filters! {
        eq => Eq;
        ne => Ne;
        gt => Gt;
        gte => Gte;
        lt => Lt;
        lte => Lte;
        /// Substring match on strings, membership on arrays.
        contains => Contains;
        not_contains => NotContains;
        starts_with => StartsWith;
        ends_with => EndsWith;
        /// `value` is an array of candidates; a single value is treated as a one-element list.
        any_of => AnyOf;
        none_of => NoneOf;
    }

    /// Selects the document whose identity is `id`.
    pub fn id(id: Uuid) -> Expr {
        Self::eq(IDENTITY_KEY, id)
    }

    /// Matches documents where `field` is present, including present with a null value.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

/// A filter plus the options applied to the resulting cursor.
///
/// Gateways apply `sort`, then `offset`, then `limit`, and pass `timeout` to the
/// storage engine as the query time limit. A `None` timeout is replaced by the
/// store's configured find timeout before the query reaches the gateway.
/// A `limit` of `0` means no limit, as in MongoDB.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Option<Expr>,
    pub sort: Vec<Sort>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub timeout: Option<Duration>,
}

impl Query {
    /// An unfiltered query over the whole collection.
    pub fn new() -> Self {
        Query::default()
    }

    /// Shorthand for a query with only a filter.
    pub fn filtered(filter: Expr) -> Self {
        Query {
            filter: Some(filter),
            ..Query::default()
        }
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

impl From<Expr> for Query {
    fn from(filter: Expr) -> Self {
        Query::filtered(filter)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Appends a sort key. Keys are applied in the order they are added.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field: field.into(), direction });
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.query.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks an [`Expr`] tree; implemented by each gateway's query translator.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
