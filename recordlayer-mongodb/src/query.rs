//! Query translation from the recordlayer filter AST to MongoDB query documents.
//!
//! String matching operators are translated to anchored, escaped regular expressions and
//! are case-sensitive, matching the in-memory gateway.

use bson::{Bson, Document, doc};

use recordlayer_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor, Sort},
};

/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; `None` selects every document.
    pub(crate) fn translate(filter: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(Document::new()),
        }
    }

    /// Builds the sort specification, keys in order of precedence.
    pub(crate) fn sort(keys: &[Sort]) -> Option<Document> {
        if keys.is_empty() {
            return None;
        }

        Some(
            keys.iter()
                .map(|key| (key.field.clone(), Bson::Int32(key.direction.as_i32())))
                .collect(),
        )
    }

    fn many(&mut self, exprs: &[Expr]) -> Result<Vec<Document>, DocumentStoreError> {
        exprs.iter().map(|expr| self.visit_expr(expr)).collect()
    }
}

fn pattern(value: &Bson, op: &str, build: impl Fn(&str) -> String) -> Result<Document, DocumentStoreError> {
    match value {
        Bson::String(text) => Ok(doc! { "$regex": build(&regex::escape(text)) }),
        _ => Err(DocumentStoreError::Backend(format!(
            "{op} operator requires a string value"
        ))),
    }
}

fn as_list(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        single => Bson::Array(vec![single.clone()]),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$and": self.many(exprs)? })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$or": self.many(exprs)? })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        // `$not` is field-level only; `$nor` negates a whole clause.
        Ok(doc! { "$nor": [self.visit_expr(expr)?] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! { field: { "$exists": should_exist } })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let condition = match op {
            FieldOp::Eq => doc! { "$eq": value },
            FieldOp::Ne => doc! { "$ne": value },
            FieldOp::Gt => doc! { "$gt": value },
            FieldOp::Gte => doc! { "$gte": value },
            FieldOp::Lt => doc! { "$lt": value },
            FieldOp::Lte => doc! { "$lte": value },
            FieldOp::Contains => match value {
                Bson::String(_) => pattern(value, "Contains", str::to_string)?,
                _ => doc! { "$eq": value },
            },
            FieldOp::NotContains => match value {
                Bson::String(_) => doc! { "$not": pattern(value, "NotContains", str::to_string)? },
                _ => doc! { "$ne": value },
            },
            FieldOp::StartsWith => pattern(value, "StartsWith", |escaped| format!("^{escaped}"))?,
            FieldOp::EndsWith => pattern(value, "EndsWith", |escaped| format!("{escaped}$"))?,
            FieldOp::AnyOf => doc! { "$in": as_list(value) },
            FieldOp::NoneOf => doc! { "$nin": as_list(value) },
        };

        Ok(doc! { field: condition })
    }
}
