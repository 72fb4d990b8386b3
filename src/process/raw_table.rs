/// A CSV file as read from disk, before any coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Row 0 of the file. Read, but only checked against the schema when
    /// strict header matching is on.
    pub headers: Vec<String>,
    /// Each data row, one `String` per cell, in file order.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Data rows before the end-of-data sentinel (first row with an empty
    /// first cell).
    pub fn effective_rows(&self) -> &[Vec<String>] {
        let end = self
            .rows
            .iter()
            .position(|r| r.first().map_or(true, |c| c.is_empty()))
            .unwrap_or(self.rows.len());
        &self.rows[..end]
    }
}
