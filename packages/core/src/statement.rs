//! Structured SQL statements.
//!
//! Statements are built and rewritten as values and rendered to SQL text only
//! at the edge (through `Display`). Text that arrives without structure is
//! carried as [`Statement::Raw`] and can only be classified, not rewritten.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{ColumnRef, Expr};
use crate::types::Value;

/// Top-level verb of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    /// Classifies SQL text by its leading keyword, skipping whitespace,
    /// comments and opening parentheses. A leading `WITH` counts as a select
    /// because a common table expression may front any data statement.
    #[must_use]
    pub fn classify(sql: &str) -> Self {
        let verb = leading_keyword(sql).to_ascii_lowercase();
        match verb.as_str() {
            "select" | "with" => Self::Select,
            "insert" => Self::Insert,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Other,
        }
    }

    /// Whether statements of this kind read or write row data.
    #[must_use]
    pub fn is_data(self) -> bool {
        !matches!(self, Self::Other)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Other => "other",
        }
    }
}

fn leading_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = trimmed.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            rest = trimmed;
            break;
        }
    }
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Table named in a statement, with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    #[must_use]
    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// Column reference qualified by the alias, if there is one.
    #[must_use]
    pub fn column(&self, name: &str) -> ColumnRef {
        match &self.alias {
            Some(alias) => ColumnRef::qualified(alias.clone(), name),
            None => ColumnRef::new(name),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {alias}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub table: TableRef,
    /// Projected columns; empty means `*`.
    pub columns: Vec<ColumnRef>,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    #[must_use]
    pub fn from_table(table: TableRef) -> Self {
        Self {
            table,
            columns: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| ColumnRef::new(*c)).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy {
            column: ColumnRef::new(column),
            direction,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Insert {
    #[must_use]
    pub fn into_table(table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn values(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub table: TableRef,
    pub assignments: Vec<(String, Value)>,
    pub filter: Option<Expr>,
}

impl Update {
    #[must_use]
    pub fn table(table: TableRef) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            filter: None,
        }
    }

    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.assignments.push((column.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub table: TableRef,
    pub filter: Option<Expr>,
}

impl Delete {
    #[must_use]
    pub fn from_table(table: TableRef) -> Self {
        Self {
            table,
            filter: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }
}

/// A statement on its way to a storage engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    /// Unstructured text (schema changes, vendor statements, hand-written SQL).
    Raw(String),
}

impl Statement {
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        match self {
            Self::Select(_) => StatementKind::Select,
            Self::Insert(_) => StatementKind::Insert,
            Self::Update(_) => StatementKind::Update,
            Self::Delete(_) => StatementKind::Delete,
            Self::Raw(sql) => StatementKind::classify(sql),
        }
    }

    /// Primary table, when the statement is structured.
    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Self::Select(s) => Some(&s.table.name),
            Self::Insert(i) => Some(&i.table),
            Self::Update(u) => Some(&u.table.name),
            Self::Delete(d) => Some(&d.table.name),
            Self::Raw(_) => None,
        }
    }
}

impl From<Select> for Statement {
    fn from(s: Select) -> Self {
        Self::Select(s)
    }
}

impl From<Insert> for Statement {
    fn from(i: Insert) -> Self {
        Self::Insert(i)
    }
}

impl From<Update> for Statement {
    fn from(u: Update) -> Self {
        Self::Update(u)
    }
}

impl From<Delete> for Statement {
    fn from(d: Delete) -> Self {
        Self::Delete(d)
    }
}

fn write_filter(f: &mut fmt::Formatter<'_>, filter: Option<&Expr>) -> fmt::Result {
    match filter {
        Some(expr) => write!(f, " WHERE {expr}"),
        None => Ok(()),
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select(s) => {
                let columns = if s.columns.is_empty() {
                    "*".to_string()
                } else {
                    s.columns
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                write!(f, "SELECT {columns} FROM {}", s.table)?;
                write_filter(f, s.filter.as_ref())?;
                if !s.order_by.is_empty() {
                    let order: Vec<String> = s
                        .order_by
                        .iter()
                        .map(|o| match o.direction {
                            SortDirection::Asc => format!("{} ASC", o.column),
                            SortDirection::Desc => format!("{} DESC", o.column),
                        })
                        .collect();
                    write!(f, " ORDER BY {}", order.join(", "))?;
                }
                if let Some(limit) = s.limit {
                    write!(f, " LIMIT {limit}")?;
                }
                if let Some(offset) = s.offset {
                    write!(f, " OFFSET {offset}")?;
                }
                Ok(())
            }
            Self::Insert(i) => {
                let rows: Vec<String> = i
                    .rows
                    .iter()
                    .map(|row| {
                        let values: Vec<String> = row.iter().map(Value::to_sql_literal).collect();
                        format!("({})", values.join(", "))
                    })
                    .collect();
                write!(
                    f,
                    "INSERT INTO {} ({}) VALUES {}",
                    i.table,
                    i.columns.join(", "),
                    rows.join(", ")
                )
            }
            Self::Update(u) => {
                let sets: Vec<String> = u
                    .assignments
                    .iter()
                    .map(|(c, v)| format!("{c} = {v}"))
                    .collect();
                write!(f, "UPDATE {} SET {}", u.table, sets.join(", "))?;
                write_filter(f, u.filter.as_ref())
            }
            Self::Delete(d) => {
                write!(f, "DELETE FROM {}", d.table)?;
                write_filter(f, d.filter.as_ref())
            }
            Self::Raw(sql) => f.write_str(sql),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_leading_verbs() {
        assert_eq!(StatementKind::classify("select * from t"), StatementKind::Select);
        assert_eq!(StatementKind::classify("  INSERT INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(StatementKind::classify("Update t set a = 1"), StatementKind::Update);
        assert_eq!(StatementKind::classify("delete from t"), StatementKind::Delete);
        assert_eq!(StatementKind::classify("CREATE TABLE t (id INT)"), StatementKind::Other);
        assert_eq!(StatementKind::classify(""), StatementKind::Other);
    }

    #[test]
    fn classify_skips_comments_and_parentheses() {
        assert_eq!(
            StatementKind::classify("-- note\n/* hint */ (SELECT 1)"),
            StatementKind::Select
        );
        assert_eq!(
            StatementKind::classify("WITH x AS (SELECT 1) DELETE FROM t"),
            StatementKind::Select
        );
        assert_eq!(StatementKind::classify("/* unterminated"), StatementKind::Other);
    }

    #[test]
    fn renders_select_with_alias_order_and_paging() {
        let stmt: Statement = Select::from_table(TableRef::aliased("projects", "p"))
            .columns(&["id", "name"])
            .filter(Expr::eq("name", "alpha"))
            .order_by("name", SortDirection::Desc)
            .limit(10)
            .offset(20)
            .into();
        assert_eq!(
            stmt.to_string(),
            "SELECT id, name FROM projects AS p WHERE name = 'alpha' ORDER BY name DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn renders_insert_update_delete() {
        let insert: Statement = Insert::into_table("projects", &["id", "name"])
            .values(vec![Value::Int(1), Value::from("a")])
            .values(vec![Value::Int(2), Value::from("b")])
            .into();
        assert_eq!(
            insert.to_string(),
            "INSERT INTO projects (id, name) VALUES (1, 'a'), (2, 'b')"
        );

        let update: Statement = Update::table(TableRef::new("projects"))
            .set("name", "c")
            .filter(Expr::eq("id", 1))
            .into();
        assert_eq!(update.to_string(), "UPDATE projects SET name = 'c' WHERE id = 1");

        let delete: Statement = Delete::from_table(TableRef::new("projects")).into();
        assert_eq!(delete.to_string(), "DELETE FROM projects");
    }

    #[test]
    fn kind_of_raw_statement_uses_classifier() {
        assert_eq!(Statement::Raw("DROP TABLE x".into()).kind(), StatementKind::Other);
        assert_eq!(Statement::Raw("select 1".into()).kind(), StatementKind::Select);
    }
}
