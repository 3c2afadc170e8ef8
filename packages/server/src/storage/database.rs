//! In-memory statement engine.
//!
//! Executes structured [`Statement`]s against tables of [`Record`]s. It is a
//! plain `tower::Service<Statement>` with no notion of tenants; isolation is
//! the job of the layers stacked in front of it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use tenantry_core::{Delete, Insert, Row, Select, Statement, StatementKind, Update};
use tower::Service;

use crate::repository::Sort;
use crate::service::statement::{ExecutionError, QueryOutput, Record};

/// Tables of records held in memory. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<DashMap<String, Vec<Record>>>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unfiltered copy of a table's rows.
    #[must_use]
    pub fn table_rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .get(table)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    /// Executes `statement` synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Unsupported`] for raw data statements and
    /// [`ExecutionError::Invalid`] for inserts whose rows do not match the
    /// column list.
    pub fn execute(&self, statement: Statement) -> Result<QueryOutput, ExecutionError> {
        match statement {
            Statement::Select(select) => Ok(self.select(&select)),
            Statement::Insert(insert) => self.insert(insert),
            Statement::Update(update) => Ok(self.update(&update)),
            Statement::Delete(delete) => Ok(self.delete(&delete)),
            Statement::Raw(sql) => match StatementKind::classify(&sql) {
                StatementKind::Other => Ok(QueryOutput::default()),
                kind => Err(ExecutionError::Unsupported(format!(
                    "raw {} statements are not executed by the memory engine",
                    kind.as_str()
                ))),
            },
        }
    }

    fn select(&self, select: &Select) -> QueryOutput {
        let Some(table) = self.tables.get(&select.table.name) else {
            return QueryOutput::default();
        };
        let mut rows: Vec<Record> = table
            .iter()
            .filter(|row| select.filter.as_ref().is_none_or(|f| f.evaluate(*row)))
            .cloned()
            .collect();
        drop(table);

        if !select.order_by.is_empty() {
            let sort = select
                .order_by
                .iter()
                .fold(Sort::unsorted(), |sort, o| sort.then(&o.column.name, o.direction));
            rows.sort_by(|a, b| sort.compare(a, b));
        }

        let offset = select.offset.map_or(0, |o| usize::try_from(o).unwrap_or(usize::MAX));
        let limit = select.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let rows = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, select))
            .collect();
        QueryOutput::rows(rows)
    }

    fn insert(&self, insert: Insert) -> Result<QueryOutput, ExecutionError> {
        if let Some(bad) = insert.rows.iter().find(|r| r.len() != insert.columns.len()) {
            return Err(ExecutionError::Invalid(format!(
                "insert into {} has {} columns but a row with {} values",
                insert.table,
                insert.columns.len(),
                bad.len()
            )));
        }
        let records: Vec<Record> = insert
            .rows
            .into_iter()
            .map(|values| insert.columns.iter().cloned().zip(values).collect())
            .collect();
        let affected = records.len() as u64;
        self.tables.entry(insert.table).or_default().extend(records);
        Ok(QueryOutput::affected(affected))
    }

    fn update(&self, update: &Update) -> QueryOutput {
        let Some(mut table) = self.tables.get_mut(&update.table.name) else {
            return QueryOutput::affected(0);
        };
        let mut affected = 0;
        for row in table.iter_mut() {
            if update.filter.as_ref().is_none_or(|f| f.evaluate(&*row)) {
                for (column, value) in &update.assignments {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }
        QueryOutput::affected(affected)
    }

    fn delete(&self, delete: &Delete) -> QueryOutput {
        let Some(mut table) = self.tables.get_mut(&delete.table.name) else {
            return QueryOutput::affected(0);
        };
        let before = table.len();
        table.retain(|row| !delete.filter.as_ref().is_none_or(|f| f.evaluate(row)));
        QueryOutput::affected((before - table.len()) as u64)
    }
}

fn project(row: Record, select: &Select) -> Record {
    if select.columns.is_empty() || select.columns.iter().any(|c| c.name == "*") {
        return row;
    }
    select
        .columns
        .iter()
        .filter_map(|c| row.column(&c.name).map(|v| (c.name.clone(), v)))
        .collect()
}

impl Service<Statement> for MemoryDatabase {
    type Response = QueryOutput;
    type Error = ExecutionError;
    type Future = Pin<Box<dyn Future<Output = Result<QueryOutput, ExecutionError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, statement: Statement) -> Self::Future {
        let result = self.execute(statement);
        Box::pin(async move { result })
    }
}
