//! Output formatting for query command results.

use super::execute::QueryResult;
use crate::output::{render_grid, Outputable};

impl Outputable for QueryResult {
    fn to_table(&self) -> String {
        if self.columns.is_empty() {
            return "Statement executed.".to_string();
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();

        let mut lines = vec![render_grid(&self.columns, &cells), String::new()];
        let count = self.rows.len();
        let noun = if count == 1 { "row" } else { "rows" };
        match self.max_rows {
            Some(max) if count as u64 >= u64::from(max) => {
                lines.push(format!("({} {}, limited to {})", count, noun, max));
            }
            _ => lines.push(format!("({} {})", count, noun)),
        }
        lines.join("\n")
    }
}
