//! Filter expressions shared by the object-level repository and the
//! statement AST.
//!
//! An [`Expr`] is evaluated against anything implementing [`Row`] and can be
//! rendered as a SQL `WHERE` fragment through its `Display` impl. Evaluation is
//! two-valued: a comparison involving a missing or `NULL` column is false.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Column lookup used when evaluating an [`Expr`].
pub trait Row {
    /// Value of `name`, or `None` when the row has no such column.
    fn column(&self, name: &str) -> Option<Value>;
}

impl Row for BTreeMap<String, Value> {
    fn column(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Row for HashMap<String, Value> {
    fn column(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Reference to a column, optionally qualified by a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{q}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
        }
    }
}

/// Boolean filter expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Matches every row.
    True,
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Value,
    },
    In {
        column: ColumnRef,
        values: Vec<Value>,
    },
    IsNull(ColumnRef),
    /// SQL `LIKE` with `%` and `_` wildcards.
    Like {
        column: ColumnRef,
        pattern: String,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn compare(column: impl Into<ColumnRef>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn gt(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn lt(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn like(column: impl Into<ColumnRef>, pattern: impl Into<String>) -> Self {
        Self::Like {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn is_in(column: impl Into<ColumnRef>, values: Vec<Value>) -> Self {
        Self::In {
            column: column.into(),
            values,
        }
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s and
    /// dropping `True` operands.
    #[must_use]
    pub fn and(self, other: Expr) -> Self {
        let mut terms = Vec::new();
        for expr in [self, other] {
            match expr {
                Self::True => {}
                Self::And(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => Self::True,
            1 => terms.pop().unwrap_or(Self::True),
            _ => Self::And(terms),
        }
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), right) => {
                left.push(right);
                Self::Or(left)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Evaluates the expression against `row`.
    pub fn evaluate(&self, row: &dyn Row) -> bool {
        match self {
            Self::True => true,
            Self::Compare { column, op, value } => match row.column(&column.name) {
                Some(actual) => actual
                    .compare(value)
                    .is_some_and(|ordering| op.accepts(ordering)),
                None => false,
            },
            Self::In { column, values } => row.column(&column.name).is_some_and(|actual| {
                values
                    .iter()
                    .any(|v| actual.compare(v) == Some(Ordering::Equal))
            }),
            Self::IsNull(column) => row.column(&column.name).is_none_or(|v| v.is_null()),
            Self::Like { column, pattern } => row
                .column(&column.name)
                .and_then(|v| v.as_str().map(|s| like_match(s, pattern)))
                .unwrap_or(false),
            Self::And(terms) => terms.iter().all(|t| t.evaluate(row)),
            Self::Or(terms) => terms.iter().any(|t| t.evaluate(row)),
            Self::Not(inner) => !inner.evaluate(row),
        }
    }

    /// Whether any node of the tree constrains a column called `name`.
    #[must_use]
    pub fn references_column(&self, name: &str) -> bool {
        match self {
            Self::True => false,
            Self::Compare { column, .. }
            | Self::In { column, .. }
            | Self::IsNull(column)
            | Self::Like { column, .. } => column.name == name,
            Self::And(terms) | Self::Or(terms) => {
                terms.iter().any(|t| t.references_column(name))
            }
            Self::Not(inner) => inner.references_column(name),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("TRUE"),
            Self::Compare { column, op, value } => {
                write!(f, "{column} {} {value}", op.as_sql())
            }
            Self::In { values, .. } if values.is_empty() => f.write_str("FALSE"),
            Self::In { column, values } => {
                let list: Vec<String> = values.iter().map(Value::to_sql_literal).collect();
                write!(f, "{column} IN ({})", list.join(", "))
            }
            Self::IsNull(column) => write!(f, "{column} IS NULL"),
            Self::Like { column, pattern } => {
                write!(f, "{column} LIKE {}", Value::from(pattern.as_str()))
            }
            Self::And(terms) => write_joined(f, terms, " AND "),
            Self::Or(terms) => write_joined(f, terms, " OR "),
            Self::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Expr], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{term}")?;
    }
    f.write_str(")")
}

/// SQL `LIKE` matching: `%` matches any run, `_` exactly one character.
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    // matches[j] == pattern[..j] matches text[..i] for the current i
    let mut matches = vec![false; pattern.len() + 1];
    matches[0] = true;
    for j in 1..=pattern.len() {
        matches[j] = matches[j - 1] && pattern[j - 1] == '%';
    }
    for &c in &text {
        let mut prev_diag = matches[0];
        matches[0] = false;
        for j in 1..=pattern.len() {
            let current = matches[j];
            matches[j] = match pattern[j - 1] {
                '%' => matches[j - 1] || current,
                '_' => prev_diag,
                p => prev_diag && p == c,
            };
            prev_diag = current;
        }
    }
    matches[pattern.len()]
}
