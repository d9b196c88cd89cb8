use serde::{Deserialize, Serialize};

/// In-memory tabular chunk: named columns and rows of optional cells.
///
/// Empty (whitespace-only) cells are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Create an empty table with the given header
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a table from string cells, normalising row widths
    pub fn from_rows<I, R, S>(columns: Vec<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row.into_iter().map(|cell| Some(cell.into())).collect());
        }
        table
    }

    /// Append a row; short rows are padded, long rows truncated
    pub fn push_row(&mut self, row: Vec<Option<String>>) {
        let mut row: Vec<Option<String>> = row
            .into_iter()
            .map(|cell| cell.filter(|value| !value.trim().is_empty()))
            .collect();
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate rows as name-addressable views
    pub fn rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        self.rows.iter().map(move |values| TableRow {
            table: self,
            values,
        })
    }

    /// Non-empty values of a column, in row order
    pub fn column_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let index = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| index.and_then(|i| row.get(i)).and_then(|c| c.as_deref()))
    }

    /// Keep only the named columns, in the given order.
    ///
    /// Names absent from the table are skipped, never invented.
    pub fn project(&self, columns: &[String]) -> Table {
        let indices: Vec<(String, usize)> = columns
            .iter()
            .filter_map(|name| self.column_index(name).map(|i| (name.clone(), i)))
            .collect();

        Table {
            columns: indices.iter().map(|(name, _)| name.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|(_, i)| row[*i].clone()).collect())
                .collect(),
        }
    }
}

/// Borrowed view of one table row
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    table: &'a Table,
    values: &'a [Option<String>],
}

impl<'a> TableRow<'a> {
    /// Cell value for a column, `None` when the column is absent or the cell empty
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.table
            .column_index(column)
            .and_then(|i| self.values.get(i))
            .and_then(|cell| cell.as_deref())
    }

    /// First non-empty value among several candidate columns
    pub fn get_any(&self, columns: &[&str]) -> Option<&'a str> {
        columns.iter().find_map(|c| self.get(c))
    }
}
