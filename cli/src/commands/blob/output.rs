//! Output formatting for blob command results.

use super::execute::BlobResult;
use crate::output::Outputable;

impl Outputable for BlobResult {
    fn to_table(&self) -> String {
        let cell = format!("{}.{} row {}", self.table, self.column, self.rowid);
        let transferred = self.transferred.unwrap_or(0);

        match (self.action.as_str(), &self.path, &self.hex) {
            ("export", Some(path), _) => {
                format!("Exported {} bytes from {} to {}", transferred, cell, path)
            }
            ("export", None, Some(hex)) => {
                format!("{} ({} bytes)\n\n{}", cell, self.length, hex)
            }
            ("import", path, _) => format!(
                "Imported {} bytes from {} into {} at offset {} ({} bytes)",
                transferred,
                path.as_deref().unwrap_or("-"),
                cell,
                self.offset.unwrap_or(0),
                self.length
            ),
            _ => format!("{}: {} bytes", cell, self.length),
        }
    }
}
