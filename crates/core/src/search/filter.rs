//! Filter predicate tree and its evaluation against stored documents.
//!
//! Produced by [`crate::search::odata::parse_filter`]. Evaluation is pure: it
//! reads the document and nothing else, so a predicate may be called any
//! number of times per query. A field the document lacks evaluates as `null`.

use crate::document::{Document, FieldValue};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// The operator with its operands swapped (`5 lt x` ⇔ `x gt 5`).
    pub fn flipped(self) -> Self {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            op => op,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Const(bool),
    Compare {
        field: String,
        op: CompareOp,
        value: Literal,
    },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
    /// `search.in(field, 'a,b,c', ',')`
    In { field: String, values: Vec<String> },
    /// `field/any()` (non-empty) or `field/any(v: body)`.
    Any {
        field: String,
        var: String,
        body: Option<Box<FilterExpr>>,
    },
    /// `field/all(v: body)`.
    All {
        field: String,
        var: String,
        body: Box<FilterExpr>,
    },
}

/// A value seen during evaluation.
#[derive(Debug, Clone, Copy)]
enum Operand<'a> {
    Null,
    Bool(bool),
    Number(f64),
    Str(&'a str),
    /// Collections only take part in lambdas.
    Collection,
}

impl<'a> From<&'a FieldValue> for Operand<'a> {
    fn from(value: &'a FieldValue) -> Self {
        match value {
            FieldValue::Boolean(b) => Operand::Bool(*b),
            FieldValue::Integer(i) => Operand::Number(*i as f64),
            FieldValue::Float(f) => Operand::Number(*f),
            FieldValue::String(s) => Operand::Str(s),
            FieldValue::StringCollection(_) => Operand::Collection,
        }
    }
}

/// Lambda variable currently in scope.
type Binding<'a> = Option<(&'a str, &'a str)>;

impl FilterExpr {
    pub fn matches(&self, doc: &Document) -> bool {
        self.eval(doc, None)
    }

    fn eval(&self, doc: &Document, binding: Binding<'_>) -> bool {
        match self {
            FilterExpr::Const(b) => *b,
            FilterExpr::Compare { field, op, value } => {
                compare(resolve(doc, field, binding), *op, value)
            }
            FilterExpr::And(a, b) => a.eval(doc, binding) && b.eval(doc, binding),
            FilterExpr::Or(a, b) => a.eval(doc, binding) || b.eval(doc, binding),
            FilterExpr::Not(e) => !e.eval(doc, binding),
            FilterExpr::In { field, values } => match resolve(doc, field, binding) {
                Operand::Str(s) => values.iter().any(|v| v == s),
                _ => false,
            },
            FilterExpr::Any { field, var, body } => {
                let items = collection(doc, field);
                match body {
                    None => !items.is_empty(),
                    Some(body) => items
                        .iter()
                        .any(|item| body.eval(doc, Some((var.as_str(), item.as_str())))),
                }
            }
            FilterExpr::All { field, var, body } => collection(doc, field)
                .iter()
                .all(|item| body.eval(doc, Some((var.as_str(), item.as_str())))),
        }
    }
}

fn resolve<'a>(doc: &'a Document, field: &str, binding: Binding<'a>) -> Operand<'a> {
    match binding {
        Some((var, item)) if var == field => Operand::Str(item),
        _ => doc.get(field).map_or(Operand::Null, Operand::from),
    }
}

fn collection<'a>(doc: &'a Document, field: &str) -> &'a [String] {
    match doc.get(field) {
        Some(FieldValue::StringCollection(items)) => items,
        _ => &[],
    }
}

fn compare(left: Operand<'_>, op: CompareOp, right: &Literal) -> bool {
    let ordering = match (left, right) {
        (Operand::Null, Literal::Null) => Some(Ordering::Equal),
        (Operand::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
        (Operand::Number(a), Literal::Number(b)) => a.partial_cmp(b),
        (Operand::Str(a), Literal::String(b)) => Some(a.cmp(b.as_str())),
        _ => None,
    };
    match op {
        CompareOp::Eq => ordering == Some(Ordering::Equal),
        CompareOp::Ne => ordering != Some(Ordering::Equal),
        // Range operators are undefined for null and booleans
        _ if matches!(right, Literal::Null | Literal::Bool(_)) => false,
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
    }
}
