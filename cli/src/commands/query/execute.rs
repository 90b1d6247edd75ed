use std::error::Error;

use db::{CursorOptions, SqlValue};
use serde::Serialize;

use super::QueryCmd;
use crate::commands::{Execute, Session};

/// Result of the query command execution
#[derive(Debug, Default, Serialize)]
pub struct QueryResult {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<u32>,
}

impl Execute for QueryCmd {
    type Output = QueryResult;

    fn execute(self, session: &Session) -> Result<Self::Output, Box<dyn Error>> {
        let max_rows = self.max_rows.or(session.max_rows);
        let options = match max_rows {
            Some(n) => CursorOptions::new().max_rows(n),
            None => CursorOptions::new(),
        };

        let mut stmt = session.db.prepare(&self.sql)?;
        let mut rows = stmt.query(options)?;
        let columns = rows.column_names()?;

        let mut values = Vec::new();
        while rows.advance()? {
            let row = (1..=columns.len())
                .map(|column| rows.get_object(column))
                .collect::<Result<Vec<_>, _>>()?;
            values.push(row);
        }
        rows.close()?;

        Ok(QueryResult {
            sql: self.sql,
            columns,
            rows: values,
            max_rows,
        })
    }
}
